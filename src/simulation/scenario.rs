use std::sync::Arc;

use tracing::info;

use crate::simulation::config::Config;
use crate::simulation::error::ConfigResult;
use crate::simulation::network::Network;
use crate::simulation::network::change_events::NetworkChangeEvent;
use crate::simulation::population::Population;
use crate::simulation::pt::TransitSchedule;
use crate::simulation::vehicles::Vehicles;

/// The scenario contains everything a simulation run reads while it is prepared. It is not changed
/// by a run, so that several iterations can run on the same scenario.
#[derive(Debug)]
pub struct Scenario {
    // shared with the travel time calculator
    pub network: Arc<Network>,
    pub population: Population,
    pub vehicles: Vehicles,
    pub transit_schedule: TransitSchedule,
    pub change_events: Vec<NetworkChangeEvent>,
    pub config: Arc<Config>,
}

impl Scenario {
    pub fn new(
        network: Arc<Network>,
        population: Population,
        vehicles: Vehicles,
        config: Arc<Config>,
    ) -> Self {
        Scenario {
            network,
            population,
            vehicles,
            transit_schedule: TransitSchedule::new(),
            change_events: Vec::new(),
            config,
        }
    }

    pub fn with_transit_schedule(mut self, transit_schedule: TransitSchedule) -> Self {
        self.transit_schedule = transit_schedule;
        self
    }

    pub fn with_change_events(mut self, change_events: Vec<NetworkChangeEvent>) -> Self {
        self.change_events = change_events;
        self
    }

    /// Checks that plans and transit routes only reference parts of the network.
    pub fn validate(&self) -> ConfigResult<()> {
        let simulation = self.config.simulation();
        simulation.validate()?;
        let main_modes = simulation.main_modes;
        for person in self.population.persons() {
            person.validate(&self.network, &main_modes)?;
        }
        for driver in self.transit_schedule.drivers() {
            driver.validate(&self.network)?;
        }
        info!(
            "Scenario with {} links, {} persons, {} vehicles and {} transit drivers is valid.",
            self.network.links().len(),
            self.population.len(),
            self.vehicles.vehicles().len(),
            self.transit_schedule.drivers().len()
        );
        Ok(())
    }
}
