use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::simulation::agents::{SimulationAgent, SimulationAgentLogic, SimulationAgentState};
use crate::simulation::config::{self, NonNetworkLegs};
use crate::simulation::engines::activity_engine::ActivityEngine;
use crate::simulation::engines::teleportation_engine::TeleportationEngine;
use crate::simulation::error::{ConfigError, SimResult, SimulationError};
use crate::simulation::events::{Event, EventsManager};
use crate::simulation::id::Id;
use crate::simulation::network::change_events::ChangeEventQueue;
use crate::simulation::network::parallel::NodeMover;
use crate::simulation::network::queue_network::QueueNetwork;
use crate::simulation::network::{Link, Network};
use crate::simulation::scenario::Scenario;
use crate::simulation::time_queue::Identifiable;
use crate::simulation::vehicles::garage::Garage;
use crate::simulation::vehicles::{SimVehicle, Vehicle, Vehicles};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationState {
    Idle,
    Prepared,
    Running,
    Cleanup,
}

impl SimulationState {
    fn name(&self) -> &'static str {
        match self {
            SimulationState::Idle => "Idle",
            SimulationState::Prepared => "Prepared",
            SimulationState::Running => "Running",
            SimulationState::Cleanup => "Cleanup",
        }
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationStats {
    pub start_time: u32,
    pub end_time: u32,
    pub lost_agents: usize,
    pub teleported_vehicles: usize,
}

/// Runs the queue simulation of one iteration. The simulation owns the events manager, through
/// which all events are published synchronously.
///
/// A simulation moves through `Idle -> Prepared -> Running -> Cleanup -> Idle`. [Simulation::run]
/// covers running and cleanup.
pub struct Simulation {
    events: EventsManager,
    state: SimulationState,
    run: Option<SimulationRun>,
    lost_agents: usize,
}

/// Everything that lives for one run only.
struct SimulationRun {
    config: config::Simulation,
    network: Arc<Network>,
    queue_network: QueueNetwork,
    node_mover: NodeMover,
    garage: Garage,
    activity_engine: ActivityEngine,
    teleportation_engine: TeleportationEngine,
    change_events: ChangeEventQueue,
    start_time: u32,
    now: u32,
    next_progress_log: u32,
    living: usize,
}

impl Simulation {
    pub fn new(events: EventsManager) -> Self {
        Simulation {
            events,
            state: SimulationState::Idle,
            run: None,
            lost_agents: 0,
        }
    }

    pub fn state(&self) -> SimulationState {
        self.state
    }

    pub fn events_mut(&mut self) -> &mut EventsManager {
        &mut self.events
    }

    pub fn into_events(self) -> EventsManager {
        self.events
    }

    /// Agents which have not finished their plan yet.
    pub fn living_agents(&self) -> usize {
        self.run.as_ref().map_or(0, |r| r.living)
    }

    /// Agents which were removed as stuck by the last run.
    pub fn lost_agents(&self) -> usize {
        self.lost_agents
    }

    /// The start time of the prepared run.
    pub fn start_time(&self) -> Option<u32> {
        self.run.as_ref().map(|r| r.start_time)
    }

    fn expect_state(&self, expected: SimulationState) -> SimResult<()> {
        if self.state != expected {
            return Err(SimulationError::InvalidState {
                expected: expected.name(),
                actual: self.state.name(),
            });
        }
        Ok(())
    }

    /// Creates agents, parks their vehicles and schedules the end of their first activity.
    #[instrument(level = "debug", skip(self, scenario))]
    pub fn prepare(&mut self, scenario: &Scenario) -> SimResult<()> {
        self.expect_state(SimulationState::Idle)?;
        if scenario.population.is_empty() && scenario.transit_schedule.is_empty() {
            return Err(ConfigError::EmptyPopulation.into());
        }
        if !self.events.has_subscribers() {
            return Err(ConfigError::MissingEventsSink.into());
        }
        scenario.validate()?;

        let config = scenario.config.simulation();
        let node_mover = NodeMover::new(scenario.config.computational_setup().threads)?;
        let queue_network = QueueNetwork::from_network(&scenario.network, &config);
        let change_events =
            ChangeEventQueue::new(scenario.change_events.clone(), &scenario.network)?;

        let mut garage = Garage::new();
        let mut activity_engine = ActivityEngine::new();
        let mut living = 0;

        for person in scenario.population.persons() {
            let agent = SimulationAgent::new_plan_based(person.clone());
            for leg in person.plan.legs.iter().filter(|l| config.main_modes.contains(&l.mode)) {
                let vehicle = leg.vehicle.clone().unwrap_or_else(|| person.id.cast());
                if let Some(start) = leg.route.as_ref().and_then(|r| r.start_link()) {
                    park_initially(&mut garage, &scenario.vehicles, &vehicle, start)?;
                }
            }
            // agents with a single activity have nothing to do
            if agent.state() == SimulationAgentState::Activity {
                activity_engine.add_initial(agent, config.start_time);
                living += 1;
            }
        }
        for driver in scenario.transit_schedule.drivers() {
            if let Some(start) = driver.links.first() {
                park_initially(&mut garage, &scenario.vehicles, &driver.vehicle, start)?;
            }
            activity_engine.add_initial(
                SimulationAgent::new_transit_driver(driver.clone()),
                config.start_time,
            );
            living += 1;
        }

        let earliest = activity_engine.next_end().unwrap_or(config.start_time);
        let mut start_time = config.start_time.max(earliest);
        if config.end_time > 0 {
            start_time = start_time.min(config.end_time);
        }
        info!(
            "Prepared simulation with {living} agents and {} parked vehicles. Start time {start_time}.",
            garage.len()
        );

        self.run = Some(SimulationRun {
            config,
            network: scenario.network.clone(),
            queue_network,
            node_mover,
            garage,
            activity_engine,
            teleportation_engine: TeleportationEngine::new(),
            change_events,
            start_time,
            now: start_time,
            next_progress_log: start_time,
            living,
        });
        self.lost_agents = 0;
        self.state = SimulationState::Prepared;
        Ok(())
    }

    /// Runs the prepared simulation until all agents are done or the end time is reached. Agents
    /// which are not done by then are removed as stuck.
    ///
    /// The events manager is finished and the simulation is back in `Idle` afterwards, also if the
    /// run failed.
    pub fn run(&mut self) -> SimResult<SimulationStats> {
        self.expect_state(SimulationState::Prepared)?;
        let Some(mut run) = self.run.take() else {
            return Err(SimulationError::InvalidState {
                expected: SimulationState::Prepared.name(),
                actual: self.state.name(),
            });
        };
        self.state = SimulationState::Running;
        info!("Starting simulation at {}.", run.start_time);

        let result = run.run_steps(&mut self.events).map(|()| {
            self.state = SimulationState::Cleanup;
            run.cleanup(&mut self.events)
        });
        self.events.finish();
        self.state = SimulationState::Idle;

        let lost_agents = match (result, self.events.take_failure()) {
            (Err(e), _) => {
                warn!("Simulation failed at {}: {e}", run.now);
                return Err(e);
            }
            (Ok(_), Some(failure)) => return Err(SimulationError::Subscriber(failure)),
            (Ok(lost_agents), None) => lost_agents,
        };
        self.lost_agents = lost_agents;
        info!("Simulation finished at {}. {lost_agents} agents were lost.", run.now);

        Ok(SimulationStats {
            start_time: run.start_time,
            end_time: run.now,
            lost_agents,
            teleported_vehicles: run.garage.teleported_vehicles(),
        })
    }
}

fn park_initially(
    garage: &mut Garage,
    vehicles: &Vehicles,
    id: &Id<Vehicle>,
    link: &Id<Link>,
) -> SimResult<()> {
    if !garage.is_parked(id) {
        garage.park(vehicles.create_sim_vehicle(id)?, link.clone());
    }
    Ok(())
}

fn check_subscribers(events: &mut EventsManager) -> SimResult<()> {
    match events.take_failure() {
        Some(failure) => Err(SimulationError::Subscriber(failure)),
        None => Ok(()),
    }
}

impl SimulationRun {
    fn run_steps(&mut self, events: &mut EventsManager) -> SimResult<()> {
        let end_time = self.config.end_time;
        while self.living > 0 && (end_time == 0 || self.now < end_time) {
            self.do_step(events)?;
            match self.now.checked_add(self.config.time_step_size) {
                Some(next) => self.now = next,
                None => break,
            }
        }
        Ok(())
    }

    /// One step of the simulation. The order of the phases matters: arrivals free agents before
    /// departures read them, and departures can use capacity which the node moves of this step free.
    #[instrument(level = "trace", skip(self, events), fields(now = self.now))]
    fn do_step(&mut self, events: &mut EventsManager) -> SimResult<()> {
        let now = self.now;

        for change in self.change_events.pop(now) {
            self.queue_network.apply_change_event(change);
        }

        for agent in self.teleportation_engine.do_step(now, events) {
            let link = arrival_link(&agent);
            self.arrive(agent, link, now, events);
        }
        check_subscribers(events)?;

        for agent in self.activity_engine.do_step(now, events) {
            self.depart(agent, now, events)?;
        }
        check_subscribers(events)?;

        self.queue_network
            .move_nodes(now, &self.node_mover, events)?;
        let arrived = self.queue_network.move_links(now, events);
        for vehicle in arrived {
            self.arrive_with_vehicle(vehicle, now, events);
        }
        check_subscribers(events)?;

        if now >= self.next_progress_log {
            self.next_progress_log = next_full_hour(now);
            info!(
                "#{} living: {}, active links: {}, active nodes: {}, on network: {}, teleported: {}",
                format_time(now),
                self.living,
                self.queue_network.active_links().len(),
                self.queue_network.active_nodes().len(),
                self.queue_network.vehicle_count(),
                self.teleportation_engine.len(),
            );
        }
        Ok(())
    }

    fn depart(
        &mut self,
        mut agent: SimulationAgent,
        now: u32,
        events: &mut EventsManager,
    ) -> SimResult<()> {
        let act_link = agent.curr_act().map(|act| act.link.clone());
        agent.advance_plan();
        let Some(leg) = agent.curr_leg() else {
            return Err(ConfigError::InvalidPlan {
                person: agent.id().to_string(),
                reason: "an activity is not followed by a leg".to_string(),
            }
            .into());
        };
        let mode = leg.mode.clone();
        let trav_time = leg.trav_time;
        let vehicle_id = leg.vehicle.clone().unwrap_or_else(|| agent.id().cast());
        let route = leg.route.clone();
        let Some(link) = route
            .as_ref()
            .and_then(|r| r.start_link())
            .cloned()
            .or(act_link)
        else {
            return Err(ConfigError::InvalidPlan {
                person: agent.id().to_string(),
                reason: "leg has no departure link".to_string(),
            }
            .into());
        };

        if let Some((line, transit_route)) = agent.transit_line() {
            events.publish_event(Event::TransitDriverStarts {
                time: now,
                driver: agent.id().clone(),
                vehicle: vehicle_id.clone(),
                line: line.to_string(),
                route: transit_route.to_string(),
            });
        }
        events.publish_event(Event::PersonDeparture {
            time: now,
            person: agent.id().clone(),
            link: link.clone(),
            leg_mode: mode.clone(),
        });

        if !agent.drives_on_network(&self.config.main_modes) {
            let trav_time = match (trav_time, self.config.non_network_legs) {
                (Some(t), _) => t,
                (None, NonNetworkLegs::Error) => {
                    return Err(SimulationError::MissingTravelTime {
                        person: agent.id().to_string(),
                    });
                }
                (None, NonNetworkLegs::Tolerate) => {
                    warn!(
                        "Leg of agent {} with mode {mode} has no travel time. It arrives immediately.",
                        agent.id()
                    );
                    0
                }
            };
            let distance = route.map_or(0., |r| r.distance(&self.network));
            self.teleportation_engine
                .receive_agent(agent, distance, now.saturating_add(trav_time));
            return Ok(());
        }

        let Some(mut vehicle) =
            self.garage
                .unpark(&vehicle_id, &link, self.config.teleport_vehicles)
        else {
            return Err(SimulationError::VehicleNotAvailable {
                vehicle: vehicle_id.to_string(),
                person: agent.id().to_string(),
                link: link.to_string(),
            });
        };
        events.publish_event(Event::PersonEntersVehicle {
            time: now,
            person: agent.id().clone(),
            vehicle: vehicle_id,
        });

        // a route which ends on its start link needs no network
        if !agent.is_transit_driver() && agent.is_wanting_to_arrive_on_current_link() {
            events.publish_event(Event::PersonLeavesVehicle {
                time: now,
                person: agent.id().clone(),
                vehicle: vehicle.id.clone(),
            });
            self.garage.park(vehicle, link.clone());
            self.arrive(agent, link, now, events);
            return Ok(());
        }

        let link_index = self
            .queue_network
            .link_index(&link)
            .ok_or_else(|| ConfigError::UnknownLink(link.to_string()))?;
        vehicle.driver = Some(agent);
        self.queue_network
            .add_departing_vehicle(vehicle, link_index, now, events);
        Ok(())
    }

    fn arrive_with_vehicle(&mut self, mut vehicle: SimVehicle, now: u32, events: &mut EventsManager) {
        let Some(agent) = vehicle.driver.take() else {
            return;
        };
        let link = agent
            .curr_link_id()
            .cloned()
            .unwrap_or_else(|| arrival_link(&agent));
        events.publish_event(Event::PersonLeavesVehicle {
            time: now,
            person: agent.id().clone(),
            vehicle: vehicle.id.clone(),
        });
        self.garage.park(vehicle, link.clone());
        self.arrive(agent, link, now, events);
    }

    fn arrive(
        &mut self,
        mut agent: SimulationAgent,
        link: Id<Link>,
        now: u32,
        events: &mut EventsManager,
    ) {
        let mode = agent
            .curr_leg()
            .map(|leg| leg.mode.clone())
            .unwrap_or_default();
        events.publish_event(Event::PersonArrival {
            time: now,
            person: agent.id().clone(),
            link,
            leg_mode: mode,
        });

        agent.advance_plan();
        if agent.state() == SimulationAgentState::Activity {
            self.activity_engine.receive_agent(agent, now, events);
            return;
        }
        // the last activity lasts until the end of the simulation
        if let Some(act) = agent.curr_act() {
            events.publish_event(Event::ActivityStart {
                time: now,
                person: agent.id().clone(),
                link: act.link.clone(),
                act_type: act.act_type.clone(),
            });
        }
        self.living -= 1;
    }

    /// Removes all remaining agents as stuck and returns their number.
    fn cleanup(&mut self, events: &mut EventsManager) -> usize {
        let now = self.now;
        let mut lost = self.queue_network.clear_vehicles(now, events);

        for agent in self.teleportation_engine.drain() {
            events.publish_event(Event::PersonStuck {
                time: now,
                person: agent.id().clone(),
                link: agent.curr_link_id().cloned(),
                leg_mode: agent.curr_leg().map(|leg| leg.mode.clone()),
            });
            lost += 1;
        }
        for agent in self.activity_engine.drain() {
            events.publish_event(Event::PersonStuck {
                time: now,
                person: agent.id().clone(),
                link: agent.curr_act().map(|act| act.link.clone()),
                leg_mode: None,
            });
            lost += 1;
        }

        self.living = 0;
        lost
    }
}

/// Where a teleported agent arrives: at the end of its route, or else at its next activity.
fn arrival_link(agent: &SimulationAgent) -> Id<Link> {
    agent
        .curr_leg()
        .and_then(|leg| leg.route.as_ref())
        .and_then(|route| route.end_link())
        .or_else(|| agent.next_act().map(|act| &act.link))
        .cloned()
        .unwrap_or_else(|| Id::create(""))
}

/// The first full hour after `now`. Progress is logged at the first step reaching it, whatever the
/// step size and start time are.
fn next_full_hour(now: u32) -> u32 {
    (now / 3600 + 1).saturating_mul(3600)
}

fn format_time(now: u32) -> String {
    format!("{:02}:{:02}:{:02}", now / 3600, (now % 3600) / 60, now % 60)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Arc;

    use crate::simulation::config::{Config, NonNetworkLegs, Simulation as SimulationConfig};
    use crate::simulation::error::{ConfigError, SimulationError};
    use crate::simulation::events::{Event, EventsManager};
    use crate::simulation::population::{Activity, Person, Plan, Population};
    use crate::simulation::scenario::Scenario;
    use crate::simulation::simulation::{Simulation, SimulationState, format_time, next_full_hour};
    use crate::test_utils::{
        create_car_person, create_car_scenario, create_config, create_line_network,
        create_teleported_person, create_vehicles,
    };

    fn recording() -> (EventsManager, Rc<RefCell<Vec<Event>>>) {
        let mut events = EventsManager::new();
        let recorded = Rc::new(RefCell::new(Vec::new()));
        let captured = recorded.clone();
        events.on_any(move |e| captured.borrow_mut().push(e.clone()));
        (events, recorded)
    }

    fn teleport_scenario(person: Person, non_network_legs: NonNetworkLegs) -> Scenario {
        let mut config = Config::default();
        config.set_simulation(SimulationConfig {
            non_network_legs,
            ..SimulationConfig::default()
        });
        let mut population = Population::new();
        population.add_person(person);
        Scenario::new(
            Arc::new(create_line_network(2)),
            population,
            create_vehicles(&[]),
            Arc::new(config),
        )
    }

    #[test]
    fn requires_events_sink() {
        let scenario = create_car_scenario(
            create_line_network(2),
            vec![create_car_person("p", 0, &["link1", "link2"])],
            create_config(100),
        );
        let mut sim = Simulation::new(EventsManager::new());
        assert!(matches!(
            sim.prepare(&scenario),
            Err(SimulationError::Config(ConfigError::MissingEventsSink))
        ));
    }

    #[test]
    fn requires_population() {
        let scenario = create_car_scenario(create_line_network(2), vec![], create_config(100));
        let (events, _) = recording();
        let mut sim = Simulation::new(events);
        assert!(matches!(
            sim.prepare(&scenario),
            Err(SimulationError::Config(ConfigError::EmptyPopulation))
        ));
    }

    #[test]
    fn zero_time_step_is_rejected() {
        let mut config = create_config(100);
        config.set_simulation(SimulationConfig {
            time_step_size: 0,
            ..config.simulation()
        });
        let scenario = create_car_scenario(
            create_line_network(2),
            vec![create_car_person("p", 0, &["link1", "link2"])],
            config,
        );
        let (events, _) = recording();
        let mut sim = Simulation::new(events);
        assert!(matches!(
            sim.prepare(&scenario),
            Err(SimulationError::Config(ConfigError::NotPositive {
                key: "simulation.time_step_size"
            }))
        ));
        assert_eq!(SimulationState::Idle, sim.state());
    }

    #[test]
    fn run_requires_prepare() {
        let (events, _) = recording();
        let mut sim = Simulation::new(events);
        assert!(matches!(
            sim.run(),
            Err(SimulationError::InvalidState { expected: "Prepared", actual: "Idle" })
        ));
    }

    #[test]
    fn starts_at_first_departure() {
        let scenario = create_car_scenario(
            create_line_network(2),
            vec![
                create_car_person("a", 300, &["link1", "link2"]),
                create_car_person("b", 200, &["link1", "link2"]),
            ],
            create_config(0),
        );
        let (events, recorded) = recording();
        let mut sim = Simulation::new(events);
        sim.prepare(&scenario).unwrap();
        assert_eq!(SimulationState::Prepared, sim.state());
        assert_eq!(Some(200), sim.start_time());
        assert_eq!(2, sim.living_agents());

        let stats = sim.run().unwrap();
        assert_eq!(SimulationState::Idle, sim.state());
        assert_eq!(0, stats.lost_agents);
        assert_eq!(0, sim.living_agents());
        assert_eq!(200, recorded.borrow()[0].time());
    }

    #[test]
    fn car_trip_events() {
        let scenario = create_car_scenario(
            create_line_network(2),
            vec![create_car_person("p", 0, &["link1", "link2"])],
            create_config(0),
        );
        let (events, recorded) = recording();
        let mut sim = Simulation::new(events);
        sim.prepare(&scenario).unwrap();
        sim.run().unwrap();

        let types: Vec<_> = recorded.borrow().iter().map(|e| e.type_()).collect();
        assert_eq!(
            vec![
                "actend",
                "departure",
                "PersonEntersVehicle",
                "vehicle enters traffic",
                "left link",
                "entered link",
                "vehicle leaves traffic",
                "PersonLeavesVehicle",
                "arrival",
                "actstart"
            ],
            types
        );
        // 10s on link1, one step to cross the node, 10s on link2
        assert_eq!(21, recorded.borrow().last().unwrap().time());
    }

    #[test]
    fn same_link_route_arrives_immediately() {
        let scenario = create_car_scenario(
            create_line_network(2),
            vec![create_car_person("p", 5, &["link1"])],
            create_config(0),
        );
        let (events, recorded) = recording();
        let mut sim = Simulation::new(events);
        sim.prepare(&scenario).unwrap();
        sim.run().unwrap();

        let recorded = recorded.borrow();
        assert!(recorded.iter().all(|e| e.time() == 5));
        assert!(!recorded.iter().any(|e| e.type_() == "vehicle enters traffic"));
        assert!(matches!(recorded.last(), Some(Event::ActivityStart { .. })));
    }

    #[test]
    fn missing_travel_time_is_an_error() {
        let person = create_teleported_person("p", "walk", 0, None);
        let scenario = teleport_scenario(person, NonNetworkLegs::Error);
        let (events, _) = recording();
        let mut sim = Simulation::new(events);
        sim.prepare(&scenario).unwrap();
        assert!(matches!(
            sim.run(),
            Err(SimulationError::MissingTravelTime { person }) if person == "p"
        ));
    }

    #[test]
    fn missing_travel_time_is_tolerated() {
        let person = create_teleported_person("p", "walk", 7, None);
        let scenario = teleport_scenario(person, NonNetworkLegs::Tolerate);
        let (events, recorded) = recording();
        let mut sim = Simulation::new(events);
        sim.prepare(&scenario).unwrap();
        sim.run().unwrap();
        assert!(recorded
            .borrow()
            .iter()
            .any(|e| matches!(e, Event::PersonArrival { time: 7, .. })));
    }

    #[test]
    fn single_activity_is_done() {
        let mut plan = Plan::new();
        plan.add_act(Activity::new("home", "link1", None, None));
        let mut population = Population::new();
        population.add_person(Person::new("p", plan));
        let scenario = Scenario::new(
            Arc::new(create_line_network(1)),
            population,
            create_vehicles(&[]),
            Arc::new(create_config(100)),
        );
        let (events, recorded) = recording();
        let mut sim = Simulation::new(events);
        sim.prepare(&scenario).unwrap();
        assert_eq!(0, sim.living_agents());
        let stats = sim.run().unwrap();
        assert_eq!(0, stats.lost_agents);
        assert!(recorded.borrow().is_empty());
    }

    #[test]
    fn failing_subscriber_aborts() {
        let scenario = create_car_scenario(
            create_line_network(2),
            vec![create_car_person("p", 0, &["link1", "link2"])],
            create_config(0),
        );
        let mut events = EventsManager::new();
        events.on_any_fallible(|e| match e {
            Event::LinkEnter { .. } => Err("disk full"),
            _ => Ok(()),
        });
        let finished = Rc::new(RefCell::new(0));
        let captured = finished.clone();
        events.on_finish(move || *captured.borrow_mut() += 1);

        let mut sim = Simulation::new(events);
        sim.prepare(&scenario).unwrap();
        assert!(matches!(
            sim.run(),
            Err(SimulationError::Subscriber(msg)) if msg == "disk full"
        ));
        // output is closed and the simulation can be prepared again
        assert_eq!(1, *finished.borrow());
        assert_eq!(SimulationState::Idle, sim.state());
        assert_eq!(0, sim.living_agents());
        sim.prepare(&scenario).unwrap();
        assert_eq!(SimulationState::Prepared, sim.state());
    }

    #[test]
    fn failing_step_finishes_events() {
        let person = create_teleported_person("p", "walk", 0, None);
        let scenario = teleport_scenario(person, NonNetworkLegs::Error);
        let (mut events, _) = recording();
        let finished = Rc::new(RefCell::new(false));
        let captured = finished.clone();
        events.on_finish(move || *captured.borrow_mut() = true);

        let mut sim = Simulation::new(events);
        sim.prepare(&scenario).unwrap();
        assert!(matches!(
            sim.run(),
            Err(SimulationError::MissingTravelTime { .. })
        ));
        assert!(*finished.borrow());
        assert_eq!(SimulationState::Idle, sim.state());
    }

    #[test]
    fn time_format() {
        assert_eq!("01:01:05", format_time(3665));
    }

    #[test]
    fn progress_is_logged_every_hour_with_odd_steps() {
        let mut next = 100;
        let mut logged = Vec::new();
        for now in (100..7300).step_by(7) {
            if now >= next {
                next = next_full_hour(now);
                logged.push(now);
            }
        }
        assert_eq!(vec![100, 3600, 7205], logged);
        assert_eq!(u32::MAX, next_full_hour(u32::MAX - 1));
    }
}
