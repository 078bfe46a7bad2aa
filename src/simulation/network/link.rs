use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

use crate::simulation::agents::{AgentEvent, SimulationAgentLogic, StopAction};
use crate::simulation::config;
use crate::simulation::events::{Event, EventsManager};
use crate::simulation::id::Id;
use crate::simulation::network::change_events::NetworkChangeEvent;
use crate::simulation::network::flow_cap::FlowCapacity;
use crate::simulation::network::storage_cap::StorageCap;
use crate::simulation::network::stuck_timer::StuckTimer;
use crate::simulation::network::Link;
use crate::simulation::population::Person;
use crate::simulation::time_queue::Identifiable;
use crate::simulation::vehicles::SimVehicle;

/// Parameters shared by all links of a queue network.
#[derive(Debug, Clone, Copy)]
pub struct LinkParams {
    pub sample_size: f32,
    pub time_step_size: u32,
    pub effective_cell_size: f32,
    pub stuck_threshold: u32,
}

impl LinkParams {
    pub fn new(config: &config::Simulation, effective_cell_size: f32) -> Self {
        LinkParams {
            sample_size: config.sample_size,
            time_step_size: config.time_step_size,
            effective_cell_size,
            stuck_threshold: config.stuck_threshold,
        }
    }
}

/// The state of a link during a simulation run.
///
/// Vehicles which depart on the link are staged in `departing` until the link has storage for them.
/// Vehicles on the link are `driving` until their earliest exit time. Then they move into the
/// `buffer`, as long as the outflow capacity allows, where they wait to cross the downstream node.
#[derive(Debug)]
pub struct QueueLink {
    pub id: Id<Link>,
    pub(super) from: usize,
    pub(super) to: usize,
    length: f64,
    free_speed: f32,
    perm_lanes: f32,
    capacity_h: f32,
    explicit_storage: Option<f32>,
    departing: VecDeque<SimVehicle>,
    driving: BinaryHeap<DrivingEntry>,
    buffer: VecDeque<SimVehicle>,
    buffer_pce: f32,
    last_exit: u32,
    storage_cap: StorageCap,
    flow_cap: FlowCapacity,
    inflow_cap: FlowCapacity,
    stuck_timer: StuckTimer,
}

#[derive(Debug)]
struct DrivingEntry {
    exit: u32,
    driver: Id<Person>,
    vehicle: SimVehicle,
}

impl PartialEq for DrivingEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DrivingEntry {}

impl PartialOrd for DrivingEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DrivingEntry {
    // max heap: the earliest exit comes first, ties go to the larger driver id
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .exit
            .cmp(&self.exit)
            .then_with(|| self.driver.cmp(&other.driver))
    }
}

pub(super) fn driver_id(vehicle: &SimVehicle) -> Id<Person> {
    match vehicle.driver() {
        Some(driver) => driver.id().clone(),
        None => vehicle.id.cast(),
    }
}

fn leg_mode(vehicle: &SimVehicle) -> String {
    vehicle
        .driver()
        .and_then(|d| d.curr_leg())
        .map(|leg| leg.mode.clone())
        .unwrap_or_default()
}

impl QueueLink {
    pub fn from_link(link: &Link, from: usize, to: usize, params: &LinkParams) -> Self {
        let flow_cap = FlowCapacity::new(link.capacity, params.sample_size, params.time_step_size);
        let storage_cap = StorageCap::build(
            link.length,
            link.permlanes,
            flow_cap.per_step(),
            params.sample_size,
            params.effective_cell_size,
            link.storage_capacity,
        );
        QueueLink {
            id: link.id.clone(),
            from,
            to,
            length: link.length,
            free_speed: link.freespeed,
            perm_lanes: link.permlanes,
            capacity_h: link.capacity,
            explicit_storage: link.storage_capacity,
            departing: VecDeque::new(),
            driving: BinaryHeap::new(),
            buffer: VecDeque::new(),
            buffer_pce: 0.,
            last_exit: 0,
            storage_cap,
            inflow_cap: flow_cap.clone(),
            flow_cap,
            stuck_timer: StuckTimer::new(params.stuck_threshold),
        }
    }

    /// A link is active, if either departing, driving or buffer is not empty.
    pub fn is_active(&self) -> bool {
        !self.departing.is_empty() || !self.driving.is_empty() || !self.buffer.is_empty()
    }

    pub fn vehicle_count(&self) -> usize {
        self.departing.len() + self.driving.len() + self.buffer.len()
    }

    /// Vehicles (in PCE) which occupy storage: driving and buffered ones.
    pub fn used_storage(&self) -> f32 {
        self.storage_cap.used()
    }

    pub fn max_storage(&self) -> f32 {
        self.storage_cap.max()
    }

    pub fn free_speed(&self) -> f32 {
        self.free_speed
    }

    pub fn capacity_h(&self) -> f32 {
        self.capacity_h
    }

    pub(super) fn buffer(&self) -> impl Iterator<Item = &SimVehicle> {
        self.buffer.iter()
    }

    pub(super) fn has_buffered_vehicles(&self) -> bool {
        !self.buffer.is_empty()
    }

    pub(super) fn outflow_value(&self) -> f32 {
        self.flow_cap.budget()
    }

    pub(super) fn inflow_value_at(&self, now: u32) -> f32 {
        self.inflow_cap.budget_at(now)
    }

    pub(super) fn capacity_per_second(&self) -> f32 {
        self.flow_cap.per_second()
    }

    pub(super) fn is_storage_available_with(&self, additional: f32) -> bool {
        self.storage_cap.is_available_with(additional)
    }

    pub(super) fn is_head_stuck(&self, now: u32) -> bool {
        self.stuck_timer.is_stuck(now)
    }

    /// Stages a vehicle which departs on this link. It enters the link with the next `move_link`.
    pub(super) fn add_departing_vehicle(&mut self, vehicle: SimVehicle) {
        self.departing.push_back(vehicle);
    }

    /// Takes a vehicle which crossed the upstream node.
    pub(super) fn accept_from_node(&mut self, vehicle: SimVehicle, now: u32) {
        self.inflow_cap.refill(now);
        self.inflow_cap.consume(vehicle.pce);
        self.push_driving(vehicle, now);
    }

    fn push_driving(&mut self, vehicle: SimVehicle, now: u32) {
        let speed = self.free_speed.min(vehicle.max_v) as f64;
        let duration = 1.max((self.length / speed) as u32); // at least 1 second per link
        // vehicles don't overtake each other
        let exit = now.saturating_add(duration).max(self.last_exit);
        self.last_exit = exit;

        self.storage_cap.consume(vehicle.pce);
        self.driving.push(DrivingEntry {
            exit,
            driver: driver_id(&vehicle),
            vehicle,
        });
    }

    /// Removes the first vehicle of the buffer, because it crosses the downstream node.
    pub(super) fn pop_buffer(&mut self) -> Option<SimVehicle> {
        let vehicle = self.buffer.pop_front()?;
        self.buffer_pce = (self.buffer_pce - vehicle.pce).max(0.);
        self.storage_cap.release(vehicle.pce);
        self.flow_cap.consume(vehicle.pce);
        self.stuck_timer.reset();
        Some(vehicle)
    }

    /// Moves vehicles through the link:
    /// 1. Departing vehicles enter the link, while it has storage left.
    /// 2. Vehicles which reached their exit time either arrive, or move into the buffer as long as
    ///    the outflow capacity allows.
    ///
    /// Returns the vehicles whose drivers arrived on this link.
    pub(super) fn move_link(&mut self, now: u32, events: &mut EventsManager) -> Vec<SimVehicle> {
        self.flow_cap.refill(now);

        while self.storage_cap.is_available() {
            let Some(vehicle) = self.departing.pop_front() else {
                break;
            };
            self.push_driving(vehicle, now);
        }

        let arrived = self.move_driving_to_buffer(now, events);

        if !self.buffer.is_empty() {
            self.stuck_timer.start(now);
        }
        arrived
    }

    fn move_driving_to_buffer(&mut self, now: u32, events: &mut EventsManager) -> Vec<SimVehicle> {
        let mut arrived = Vec::new();

        while self.driving.peek().is_some_and(|e| e.exit <= now) {
            let Some(mut entry) = self.driving.pop() else {
                break;
            };

            if Self::handle_transit_stop(&mut entry, now, events) {
                self.driving.push(entry);
                continue;
            }

            let wants_to_arrive = entry
                .vehicle
                .driver()
                .is_none_or(|d| d.is_wanting_to_arrive_on_current_link());
            if wants_to_arrive {
                self.storage_cap.release(entry.vehicle.pce);
                events.publish_event(Event::VehicleLeavesTraffic {
                    time: now,
                    person: entry.driver.clone(),
                    link: self.id.clone(),
                    vehicle: entry.vehicle.id.clone(),
                    network_mode: leg_mode(&entry.vehicle),
                });
                arrived.push(entry.vehicle);
                continue;
            }

            if self.flow_cap.budget() - self.buffer_pce <= 0. {
                self.driving.push(entry);
                break;
            }
            self.buffer_pce += entry.vehicle.pce;
            self.buffer.push_back(entry.vehicle);
        }

        arrived
    }

    /// Lets a transit vehicle serve the stops on this link. Returns true if the vehicle dwells at a
    /// stop and has to stay on the link.
    fn handle_transit_stop(entry: &mut DrivingEntry, now: u32, events: &mut EventsManager) -> bool {
        let vehicle_id = entry.vehicle.id.clone();
        loop {
            let Some(driver) = entry.vehicle.driver_mut() else {
                return false;
            };
            match driver.stop_action() {
                StopAction::None => return false,
                StopAction::Arrive { facility, dwell } => {
                    events.publish_event(Event::VehicleArrivesAtFacility {
                        time: now,
                        vehicle: vehicle_id.clone(),
                        facility,
                    });
                    driver.notify_event(AgentEvent::ArrivedAtStop, now);
                    if dwell > 0 {
                        entry.exit = now.saturating_add(dwell);
                        return true;
                    }
                }
                StopAction::Depart { facility } => {
                    events.publish_event(Event::VehicleDepartsAtFacility {
                        time: now,
                        vehicle: vehicle_id.clone(),
                        facility,
                    });
                    driver.notify_event(AgentEvent::DepartedFromStop, now);
                }
            }
        }
    }

    /// Removes all vehicles from the link and emits a stuck event for each driver. Returns the
    /// number of drivers.
    pub(super) fn clear_vehicles(&mut self, now: u32, events: &mut EventsManager) -> usize {
        let departing = std::mem::take(&mut self.departing);
        let driving = std::mem::take(&mut self.driving).into_sorted_vec();
        let buffer = std::mem::take(&mut self.buffer);

        // into_sorted_vec is ascending by Ord, which puts the first vehicle to leave last
        let vehicles = departing
            .into_iter()
            .chain(driving.into_iter().rev().map(|e| e.vehicle))
            .chain(buffer);

        let mut count = 0;
        for vehicle in vehicles {
            events.publish_event(Event::PersonStuck {
                time: now,
                person: driver_id(&vehicle),
                link: Some(self.id.clone()),
                leg_mode: Some(leg_mode(&vehicle)),
            });
            count += 1;
        }

        self.buffer_pce = 0.;
        self.storage_cap.reset();
        self.stuck_timer.reset();
        count
    }

    /// Applies a change of the link's attributes. Vehicles which are already on the link are not
    /// affected, but may exceed the new storage capacity.
    pub(super) fn apply_change(&mut self, change: &NetworkChangeEvent, params: &LinkParams) {
        if let Some(value) = &change.freespeed {
            self.free_speed = value.apply(self.free_speed);
        }
        if let Some(value) = &change.flow_capacity {
            self.capacity_h = value.apply(self.capacity_h);
            self.flow_cap =
                FlowCapacity::new(self.capacity_h, params.sample_size, params.time_step_size);
            self.inflow_cap = self.flow_cap.clone();
        }
        if let Some(value) = &change.lanes {
            self.perm_lanes = value.apply(self.perm_lanes);
        }
        let storage_cap = StorageCap::build(
            self.length,
            self.perm_lanes,
            self.flow_cap.per_step(),
            params.sample_size,
            params.effective_cell_size,
            self.explicit_storage,
        );
        self.storage_cap.set_max(&storage_cap);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::simulation::config;
    use crate::simulation::events::{Event, EventsManager};
    use crate::simulation::id::Id;
    use crate::simulation::network::link::{LinkParams, QueueLink};
    use crate::simulation::network::LinkBuilder;
    use crate::simulation::pt::TransitStop;
    use crate::test_utils::{create_driving_vehicle, create_transit_vehicle};

    fn params() -> LinkParams {
        LinkParams::new(&config::Simulation::default(), 7.5)
    }

    fn link(length: f64, capacity: f32) -> QueueLink {
        let link = LinkBuilder::default()
            .id("link1")
            .from("n1")
            .to("n2")
            .length(length)
            .capacity(capacity)
            .freespeed(10.)
            .build()
            .unwrap();
        QueueLink::from_link(&link, 0, 1, &params())
    }

    fn recording_events() -> (EventsManager, Rc<RefCell<Vec<Event>>>) {
        let mut events = EventsManager::new();
        let recorded = Rc::new(RefCell::new(Vec::new()));
        let captured = recorded.clone();
        events.on_any(move |e| captured.borrow_mut().push(e.clone()));
        (events, recorded)
    }

    #[test]
    fn storage_consumed_when_entering() {
        let mut link = link(100., 3600.);
        let mut events = EventsManager::new();
        link.add_departing_vehicle(create_driving_vehicle("1", 1.5, &["link1", "link2"]));
        assert_eq!(0., link.used_storage());
        assert!(link.is_active());

        link.move_link(0, &mut events);
        assert_eq!(1.5, link.used_storage());
    }

    #[test]
    fn vehicle_leaves_after_free_flow_time() {
        let mut link = link(100., 3600.);
        let mut events = EventsManager::new();
        link.add_departing_vehicle(create_driving_vehicle("1", 1., &["link1", "link2"]));

        link.move_link(0, &mut events);
        for now in 1..10 {
            link.move_link(now, &mut events);
            assert!(!link.has_buffered_vehicles());
        }
        link.move_link(10, &mut events);
        assert!(link.has_buffered_vehicles());
    }

    #[test]
    fn ties_leave_in_descending_id_order() {
        let mut link = link(100., 36000.);
        let mut events = EventsManager::new();
        link.add_departing_vehicle(create_driving_vehicle("1", 1., &["link1", "link2"]));
        link.add_departing_vehicle(create_driving_vehicle("3", 1., &["link1", "link2"]));
        link.add_departing_vehicle(create_driving_vehicle("2", 1., &["link1", "link2"]));

        link.move_link(0, &mut events);
        link.move_link(10, &mut events);

        let ids: Vec<_> = link.buffer().map(|v| v.id.to_string()).collect();
        assert_eq!(vec!["3", "2", "1"], ids);
    }

    #[test]
    fn no_overtaking() {
        let mut link = link(100., 36000.);
        let mut events = EventsManager::new();
        let mut slow = create_driving_vehicle("slow", 1., &["link1", "link2"]);
        slow.max_v = 5.;
        link.add_departing_vehicle(slow);
        link.move_link(0, &mut events);

        link.add_departing_vehicle(create_driving_vehicle("fast", 1., &["link1", "link2"]));
        link.move_link(1, &mut events);

        // the fast vehicle would leave at 11, but has to wait for the slow one which leaves at 20
        link.move_link(11, &mut events);
        assert!(!link.has_buffered_vehicles());
        link.move_link(20, &mut events);
        let ids: Vec<_> = link.buffer().map(|v| v.id.to_string()).collect();
        assert_eq!(vec!["slow", "fast"], ids);
    }

    #[test]
    fn buffer_limited_by_flow_capacity() {
        // 1 vehicle per second
        let mut link = link(100., 3600.);
        let mut events = EventsManager::new();
        for i in 0..3 {
            let id = i.to_string();
            link.add_departing_vehicle(create_driving_vehicle(&id, 1., &["link1", "link2"]));
        }
        link.move_link(0, &mut events);
        link.move_link(10, &mut events);
        assert_eq!(1, link.buffer().count());

        // nothing crossed the node, so the buffer stays full
        link.move_link(11, &mut events);
        assert_eq!(1, link.buffer().count());

        let first = link.pop_buffer().unwrap();
        assert_eq!("2", first.id.external());
        link.move_link(12, &mut events);
        let ids: Vec<_> = link.buffer().map(|v| v.id.to_string()).collect();
        assert_eq!(vec!["1"], ids);
        assert_eq!(2, link.vehicle_count());
    }

    #[test]
    fn arrival_releases_storage() {
        let mut link = link(100., 3600.);
        let (mut events, recorded) = recording_events();
        link.add_departing_vehicle(create_driving_vehicle("1", 1., &["link1"]));

        link.move_link(0, &mut events);
        assert_eq!(1., link.used_storage());
        let arrived = link.move_link(10, &mut events);

        assert_eq!(1, arrived.len());
        assert_eq!(0., link.used_storage());
        assert!(!link.is_active());
        assert!(matches!(
            recorded.borrow()[0],
            Event::VehicleLeavesTraffic { time: 10, .. }
        ));
    }

    #[test]
    fn pop_buffer_releases_storage() {
        let mut link = link(100., 3600.);
        let mut events = EventsManager::new();
        link.add_departing_vehicle(create_driving_vehicle("1", 1.5, &["link1", "link2"]));
        link.move_link(0, &mut events);
        link.move_link(10, &mut events);

        let vehicle = link.pop_buffer();
        assert!(vehicle.is_some());
        assert_eq!(0., link.used_storage());
        assert!(!link.is_active());
    }

    #[test]
    fn departing_waits_for_storage() {
        // storage of 1 vehicle
        let mut link = link(7.5, 3600.);
        let mut events = EventsManager::new();
        link.add_departing_vehicle(create_driving_vehicle("1", 1., &["link1", "link2"]));
        link.add_departing_vehicle(create_driving_vehicle("2", 1., &["link1", "link2"]));

        link.move_link(0, &mut events);
        assert_eq!(1., link.used_storage());
        assert_eq!(2, link.vehicle_count());
    }

    #[test]
    fn transit_vehicle_dwells_at_stop() {
        let mut link = link(100., 3600.);
        let (mut events, recorded) = recording_events();
        let stops = vec![TransitStop::new("link1", "stop", 5)];
        link.add_departing_vehicle(create_transit_vehicle("bus", &["link1", "link2"], stops));

        link.move_link(0, &mut events);
        link.move_link(10, &mut events);
        assert!(!link.has_buffered_vehicles());
        link.move_link(14, &mut events);
        assert!(!link.has_buffered_vehicles());
        link.move_link(15, &mut events);
        assert!(link.has_buffered_vehicles());

        let recorded = recorded.borrow();
        assert_eq!(
            Event::VehicleArrivesAtFacility {
                time: 10,
                vehicle: Id::create("bus"),
                facility: Id::create("stop")
            },
            recorded[0]
        );
        assert_eq!(
            Event::VehicleDepartsAtFacility {
                time: 15,
                vehicle: Id::create("bus"),
                facility: Id::create("stop")
            },
            recorded[1]
        );
    }

    #[test]
    fn clear_vehicles() {
        let mut link = link(100., 3600.);
        let (mut events, recorded) = recording_events();
        link.add_departing_vehicle(create_driving_vehicle("1", 1., &["link1", "link2"]));
        link.move_link(0, &mut events);
        link.add_departing_vehicle(create_driving_vehicle("2", 1., &["link1", "link2"]));

        assert_eq!(2, link.clear_vehicles(5, &mut events));
        assert!(!link.is_active());
        assert_eq!(0., link.used_storage());
        assert_eq!(2, recorded.borrow().len());
        assert!(matches!(
            &recorded.borrow()[0],
            Event::PersonStuck { time: 5, person, .. } if person.external() == "2"
        ));
    }
}
