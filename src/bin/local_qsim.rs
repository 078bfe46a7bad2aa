use std::sync::Arc;

use clap::Parser;
use itertools::Itertools;
use rust_queue_sim::simulation::config::{CommandLineArgs, Config};
use rust_queue_sim::simulation::controller::LocalControllerBuilder;
use rust_queue_sim::simulation::error::{ConfigError, ConfigResult, SimResult};
use rust_queue_sim::simulation::id::Id;
use rust_queue_sim::simulation::logging::init_logging;
use rust_queue_sim::simulation::network::{LinkBuilder, Network, Node};
use rust_queue_sim::simulation::population::{Activity, Leg, Person, Plan, Population, Route};
use rust_queue_sim::simulation::pt::{TransitDriver, TransitSchedule, TransitStop};
use rust_queue_sim::simulation::scenario::Scenario;
use rust_queue_sim::simulation::vehicles::{Vehicle, VehicleType, Vehicles};
use tracing::info;

const CORRIDOR_LINKS: usize = 10;
const COMMUTERS: usize = 600;

fn main() -> SimResult<()> {
    let args = CommandLineArgs::parse();
    let config = Config::try_from(args.clone())?;
    let _guards = init_logging(&config);
    info!("Started with args: {:?}", args);

    let scenario = create_corridor_scenario(Arc::new(config))?;
    let controller = LocalControllerBuilder::default()
        .scenario(scenario)
        .build()?;
    let travel_times = controller.run()?;

    // the bottleneck in the middle of the corridor shows up in the morning peak
    let bottleneck = Id::create(&format!("link{}", CORRIDOR_LINKS / 2));
    let peak = (6..10)
        .map(|hour| {
            travel_times
                .link_travel_time(&bottleneck, hour * 3600)
                .map(|tt| format!("{hour}:00 {tt:.1}s"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    info!("Travel times on {bottleneck}: {}", peak.iter().join(", "));
    Ok(())
}

/// A corridor of links with a bottleneck in the middle. Commuters drive through it in the morning,
/// some walk, and a bus serves two stops.
fn create_corridor_scenario(config: Arc<Config>) -> ConfigResult<Scenario> {
    let mut network = Network::new();
    for i in 0..=CORRIDOR_LINKS {
        network.add_node(Node::new(Id::create(&format!("node{i}")), i as f64 * 500., 0.));
    }
    for i in 1..=CORRIDOR_LINKS {
        let capacity = if i == CORRIDOR_LINKS / 2 { 900. } else { 3600. };
        let link = LinkBuilder::default()
            .id(format!("link{i}").as_str())
            .from(format!("node{}", i - 1).as_str())
            .to(format!("node{i}").as_str())
            .length(500.)
            .freespeed(13.89)
            .capacity(capacity)
            .permlanes(2.)
            .build()
            .map_err(|e| ConfigError::Builder(e.to_string()))?;
        network.add_link(link)?;
    }

    let route: Vec<String> = (1..=CORRIDOR_LINKS).map(|i| format!("link{i}")).collect();
    let route: Vec<&str> = route.iter().map(|l| l.as_str()).collect();
    let first = route[0];
    let last = route[route.len() - 1];

    let mut population = Population::new();
    let mut vehicles = Vehicles::new();
    vehicles.add_type(VehicleType::new("car", 36.1, 1.));
    vehicles.add_type(VehicleType::new("bus", 22.2, 3.));

    for i in 0..COMMUTERS {
        let id = format!("commuter{i}");
        // departures spread over two hours from 6:00
        let departure = 6 * 3600 + (i as u32 * 7200) / COMMUTERS as u32;
        let mut plan = Plan::new();
        plan.add_act(Activity::new("home", first, Some(departure), None));
        if i % 10 == 0 {
            plan.add_leg(Leg::new(
                "walk",
                Some(3600),
                Some(Route::Generic {
                    start_link: Id::create(first),
                    end_link: Id::create(last),
                    distance: 5000.,
                }),
            ));
        } else {
            plan.add_leg(Leg::new("car", None, Some(Route::network(&route))));
            vehicles.add_vehicle(Vehicle::new(&id, "car"))?;
        }
        plan.add_act(Activity::new("work", last, None, Some(8 * 3600)));
        population.add_person(Person::new(&id, plan));
    }

    let mut transit_schedule = TransitSchedule::new();
    for (i, departure) in [6 * 3600, 7 * 3600, 8 * 3600].into_iter().enumerate() {
        let vehicle = format!("bus{i}");
        vehicles.add_vehicle(Vehicle::new(&vehicle, "bus"))?;
        transit_schedule.add_driver(TransitDriver {
            id: Id::create(&format!("pt_{vehicle}")),
            vehicle: Id::create(&vehicle),
            departure,
            line: "corridor".to_string(),
            route: "eastbound".to_string(),
            links: route.iter().map(|l| Id::create(l)).collect(),
            stops: vec![
                TransitStop::new("link3", "stop_west", 30),
                TransitStop::new("link8", "stop_east", 30),
            ],
        });
    }

    Ok(
        Scenario::new(Arc::new(network), population, vehicles, config)
            .with_transit_schedule(transit_schedule),
    )
}
