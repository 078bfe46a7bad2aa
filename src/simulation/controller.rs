use std::fs;
use std::sync::Arc;

use derive_builder::Builder;
use tracing::info;

use crate::simulation::config::{WriteEvents, write_config};
use crate::simulation::error::{ConfigError, ConfigResult, SimResult};
use crate::simulation::events::EventsManager;
use crate::simulation::events::xml_writer::XmlEventsWriter;
use crate::simulation::scenario::Scenario;
use crate::simulation::simulation::{Simulation, SimulationStats};
use crate::simulation::travel_time::TravelTimeCalculator;

/// Registers additional subscribers on the events manager of an iteration. The second argument is
/// the iteration.
pub type OnIterationFn = dyn Fn(&mut EventsManager, u32);

/// Runs the configured number of iterations on one scenario. All iterations share one travel time
/// calculator, which is reset before each iteration.
#[derive(Builder)]
#[builder(pattern = "owned", build_fn(skip))]
pub struct LocalController {
    scenario: Scenario,
    #[builder(setter(custom))]
    events_subscribers: Vec<Box<OnIterationFn>>,
}

impl LocalControllerBuilder {
    pub fn add_events_subscriber<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut EventsManager, u32) + 'static,
    {
        self.events_subscribers
            .get_or_insert_with(Vec::new)
            .push(Box::new(f));
        self
    }

    pub fn build(self) -> ConfigResult<LocalController> {
        let scenario = self
            .scenario
            .ok_or_else(|| ConfigError::Builder("scenario is required".to_string()))?;
        Ok(LocalController {
            scenario,
            events_subscribers: self.events_subscribers.unwrap_or_default(),
        })
    }
}

impl LocalController {
    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// Runs all iterations. Returns the travel time calculator holding the travel times of the last
    /// iteration.
    pub fn run(self) -> SimResult<Arc<TravelTimeCalculator>> {
        let config = self.scenario.config.clone();
        let output = config.output();
        let output_dir = config.output_dir();
        fs::create_dir_all(&output_dir)?;

        let calculator = Arc::new(TravelTimeCalculator::new(
            &self.scenario.network,
            config.travel_time(),
        )?);

        for iteration in 0..output.iterations.max(1) {
            info!("=========== Start Iteration {iteration} ===========");
            calculator.reset(iteration);

            let mut events = EventsManager::new();
            calculator.register(&mut events);
            if output.write_events == WriteEvents::Xml {
                let path = output_dir.join(format!("output_events_{iteration}.xml.gz"));
                XmlEventsWriter::register(&path, &mut events)?;
            }
            for subscriber in &self.events_subscribers {
                subscriber(&mut events, iteration);
            }

            let stats = self.run_iteration(events)?;
            info!(
                "Iteration {iteration} ran from {} to {}. Lost agents: {}, teleported vehicles: {}.",
                stats.start_time, stats.end_time, stats.lost_agents, stats.teleported_vehicles
            );
            info!("=========== End Iteration {iteration} ===========");
        }

        info!("Writing output files:");
        info!("    ... Config ...");
        write_config(&config, &output_dir)?;
        Ok(calculator)
    }

    fn run_iteration(&self, events: EventsManager) -> SimResult<SimulationStats> {
        let mut simulation = Simulation::new(events);
        simulation.prepare(&self.scenario)?;
        simulation.run()
    }
}
