use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ahash::HashMap;
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::simulation::config::{AggregationPolicy, TravelTimeCalculatorConfig};
use crate::simulation::error::{ConfigResult, TravelTimeError};
use crate::simulation::events::{Event, EventsManager};
use crate::simulation::id::Id;
use crate::simulation::network::{Link, Network};
use crate::simulation::population::Person;
use crate::simulation::travel_time::data::TravelTimeData;
use crate::simulation::vehicles::Vehicle;

/// The travel times of one link or pair of links. Observations mark the record as dirty; the next
/// query consolidates it.
#[derive(Debug)]
struct TravelTimeRecord {
    data: Mutex<TravelTimeData>,
    dirty: AtomicBool,
}

impl TravelTimeRecord {
    fn new(data: TravelTimeData) -> Self {
        TravelTimeRecord {
            data: Mutex::new(data),
            dirty: AtomicBool::new(false),
        }
    }

    fn add(&self, time: u32, travel_time: f64) {
        let mut data = self.data.lock();
        data.add_travel_time(time, travel_time);
        self.dirty.store(true, Ordering::Release);
    }

    fn add_stuck(&self, time: u32, travel_time: f64) {
        let mut data = self.data.lock();
        data.add_stuck_travel_time(time, travel_time);
        self.dirty.store(true, Ordering::Release);
    }

    fn travel_time(&self, time: u32) -> f64 {
        let mut data = self.data.lock();
        if self.dirty.swap(false, Ordering::AcqRel) {
            data.consolidate();
        }
        data.travel_time(time)
    }
}

/// Collects link travel times from the events of a run, binned by time of day.
///
/// The calculator is shared: events are handled through `&self`, so that routers on other threads
/// can query travel times through the same [Arc]. Each link and link pair has its own lock.
#[derive(Debug)]
pub struct TravelTimeCalculator {
    config: TravelTimeCalculatorConfig,
    num_slots: usize,
    free_flow: HashMap<Id<Link>, f64>,
    link_data: DashMap<Id<Link>, Arc<TravelTimeRecord>>,
    link_to_link_data: DashMap<(Id<Link>, Id<Link>), Arc<TravelTimeRecord>>,
    pending_enters: DashMap<Id<Person>, (Id<Link>, u32)>,
    transit_drivers: DashMap<Id<Vehicle>, Id<Person>>,
    filtered_agents: DashSet<Id<Person>>,
}

impl TravelTimeCalculator {
    pub fn new(network: &Network, config: TravelTimeCalculatorConfig) -> ConfigResult<Self> {
        config.validate()?;
        let bin_size = config.bin_size;
        let num_slots = (config.max_time / bin_size) as usize + 1;
        let free_flow = network
            .links()
            .iter()
            .map(|link| (link.id.clone(), link.free_speed_travel_time()))
            .collect();
        info!(
            "Travel time calculator with {num_slots} bins of {bin_size}s. Link travel times: {}, link to link travel times: {}.",
            config.calculate_link_travel_times, config.calculate_link_to_link_travel_times
        );
        Ok(TravelTimeCalculator {
            config,
            num_slots,
            free_flow,
            link_data: DashMap::new(),
            link_to_link_data: DashMap::new(),
            pending_enters: DashMap::new(),
            transit_drivers: DashMap::new(),
            filtered_agents: DashSet::new(),
        })
    }

    pub fn config(&self) -> &TravelTimeCalculatorConfig {
        &self.config
    }

    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    /// Subscribes the calculator to all events of `events`. Errors of the handler are reported as
    /// subscriber failures of the events manager.
    pub fn register(self: &Arc<Self>, events: &mut EventsManager) {
        let calculator = self.clone();
        events.on_any_fallible(move |e| calculator.handle_event(e));
    }

    pub fn handle_event(&self, event: &Event) -> Result<(), TravelTimeError> {
        match event {
            Event::LinkEnter {
                time, link, driver, ..
            } => self.handle_link_enter(*time, link, driver),
            Event::LinkLeave {
                time, link, driver, ..
            } => self.handle_link_leave(*time, link, driver),
            Event::PersonDeparture {
                person, leg_mode, ..
            } => {
                if self.config.filter_modes && !self.config.analyzed_modes.contains(leg_mode) {
                    self.filtered_agents.insert(person.clone());
                }
                Ok(())
            }
            Event::PersonArrival { person, .. } => {
                self.pending_enters.remove(person);
                self.filtered_agents.remove(person);
                Ok(())
            }
            Event::TransitDriverStarts {
                driver, vehicle, ..
            } => {
                self.transit_drivers.insert(vehicle.clone(), driver.clone());
                Ok(())
            }
            Event::VehicleArrivesAtFacility { vehicle, .. } => {
                // the dwell time at a stop is no travel time
                let driver = self.transit_drivers.get(vehicle).map(|d| d.value().clone());
                if let Some(driver) = driver {
                    self.pending_enters.remove(&driver);
                }
                Ok(())
            }
            Event::PersonStuck { time, person, .. } => self.handle_stuck(*time, person),
            _ => Ok(()),
        }
    }

    fn handle_link_enter(
        &self,
        time: u32,
        link: &Id<Link>,
        driver: &Id<Person>,
    ) -> Result<(), TravelTimeError> {
        if self.filtered_agents.contains(driver) {
            return Ok(());
        }
        let previous = self
            .pending_enters
            .insert(driver.clone(), (link.clone(), time));
        if self.config.calculate_link_to_link_travel_times {
            if let Some((prev_link, prev_time)) = previous {
                let record = self.link_to_link_record(&prev_link, link)?;
                record.add(
                    self.observation_time(prev_time, time),
                    time.saturating_sub(prev_time) as f64,
                );
            }
        }
        Ok(())
    }

    fn handle_link_leave(
        &self,
        time: u32,
        link: &Id<Link>,
        driver: &Id<Person>,
    ) -> Result<(), TravelTimeError> {
        if !self.config.calculate_link_travel_times {
            return Ok(());
        }
        // the enter stays pending, link to link travel times need it on the next enter
        let enter_time = match self.pending_enters.get(driver) {
            Some(entry) if &entry.value().0 == link => entry.value().1,
            _ => return Ok(()),
        };
        let record = self.link_record(link)?;
        record.add(
            self.observation_time(enter_time, time),
            time.saturating_sub(enter_time) as f64,
        );
        Ok(())
    }

    fn handle_stuck(&self, time: u32, person: &Id<Person>) -> Result<(), TravelTimeError> {
        self.filtered_agents.remove(person);
        // agents stuck outside of a link have no turning move to record
        let Some((_, (link, enter_time))) = self.pending_enters.remove(person) else {
            return Ok(());
        };
        let record = self.link_record(&link)?;
        record.add_stuck(
            self.observation_time(enter_time, time),
            time.saturating_sub(enter_time) as f64,
        );
        if self.config.calculate_link_to_link_travel_times {
            return Err(TravelTimeError::StuckWithLinkToLink);
        }
        Ok(())
    }

    /// The time whose bin an observation is stored in.
    fn observation_time(&self, enter_time: u32, leave_time: u32) -> u32 {
        match self.config.aggregation {
            AggregationPolicy::Optimistic => enter_time,
            AggregationPolicy::Pessimistic => leave_time,
        }
    }

    fn free_flow(&self, link: &Id<Link>) -> Result<f64, TravelTimeError> {
        self.free_flow
            .get(link)
            .copied()
            .ok_or_else(|| TravelTimeError::UnknownLink(link.to_string()))
    }

    fn new_record(&self, free_flow: f64) -> Arc<TravelTimeRecord> {
        Arc::new(TravelTimeRecord::new(TravelTimeData::new(
            free_flow,
            self.config.bin_size,
            self.num_slots,
        )))
    }

    fn link_record(&self, link: &Id<Link>) -> Result<Arc<TravelTimeRecord>, TravelTimeError> {
        if let Some(record) = self.link_data.get(link) {
            return Ok(record.value().clone());
        }
        let free_flow = self.free_flow(link)?;
        Ok(self
            .link_data
            .entry(link.clone())
            .or_insert_with(|| self.new_record(free_flow))
            .value()
            .clone())
    }

    fn link_to_link_record(
        &self,
        from: &Id<Link>,
        to: &Id<Link>,
    ) -> Result<Arc<TravelTimeRecord>, TravelTimeError> {
        let key = (from.clone(), to.clone());
        if let Some(record) = self.link_to_link_data.get(&key) {
            return Ok(record.value().clone());
        }
        let free_flow = self.free_flow(from)?;
        self.free_flow(to)?;
        Ok(self
            .link_to_link_data
            .entry(key)
            .or_insert_with(|| self.new_record(free_flow))
            .value()
            .clone())
    }

    /// The consolidated travel time of `link` for a vehicle entering at `time`. Links without
    /// observations report their free flow travel time.
    pub fn link_travel_time(&self, link: &Id<Link>, time: u32) -> Result<f64, TravelTimeError> {
        if !self.config.calculate_link_travel_times {
            return Err(TravelTimeError::LinkTravelTimesDisabled);
        }
        let free_flow = self.free_flow(link)?;
        let record = self.link_data.get(link).map(|r| r.value().clone());
        Ok(record.map_or(free_flow, |r| r.travel_time(time)))
    }

    /// The consolidated travel time from entering `from` until entering `to`.
    pub fn link_to_link_travel_time(
        &self,
        from: &Id<Link>,
        to: &Id<Link>,
        time: u32,
    ) -> Result<f64, TravelTimeError> {
        if !self.config.calculate_link_to_link_travel_times {
            return Err(TravelTimeError::LinkToLinkTravelTimesDisabled);
        }
        let free_flow = self.free_flow(from)?;
        self.free_flow(to)?;
        let record = self
            .link_to_link_data
            .get(&(from.clone(), to.clone()))
            .map(|r| r.value().clone());
        Ok(record.map_or(free_flow, |r| r.travel_time(time)))
    }

    /// Forgets everything collected so far. Called before each iteration.
    pub fn reset(&self, iteration: u32) {
        debug!(
            "Resetting travel times of {} links for iteration {iteration}.",
            self.link_data.len()
        );
        self.link_data.clear();
        self.link_to_link_data.clear();
        self.pending_enters.clear();
        self.transit_drivers.clear();
        self.filtered_agents.clear();
    }
}
