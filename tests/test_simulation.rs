use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use assert_approx_eq::assert_approx_eq;
use rust_queue_sim::simulation::config::{Config, Output, Simulation as SimulationConfig, WriteEvents};
use rust_queue_sim::simulation::controller::LocalControllerBuilder;
use rust_queue_sim::simulation::error::{ConfigError, SimulationError};
use rust_queue_sim::simulation::events::{Event, EventsManager};
use rust_queue_sim::simulation::id::Id;
use rust_queue_sim::simulation::population::{Activity, Leg, Person, Plan, Population, Route};
use rust_queue_sim::simulation::pt::{TransitSchedule, TransitStop};
use rust_queue_sim::simulation::scenario::Scenario;
use rust_queue_sim::simulation::simulation::Simulation;
use rust_queue_sim::test_utils::{
    create_car_person, create_car_scenario, create_config, create_line_network,
    create_teleported_person, create_transit_driver, create_vehicles,
};

fn recording() -> (EventsManager, Rc<RefCell<Vec<Event>>>) {
    let mut events = EventsManager::new();
    let recorded = Rc::new(RefCell::new(Vec::new()));
    let captured = recorded.clone();
    events.on_any(move |e| captured.borrow_mut().push(e.clone()));
    (events, recorded)
}

fn run(scenario: &Scenario) -> (Result<usize, SimulationError>, Vec<Event>) {
    let (events, recorded) = recording();
    let mut sim = Simulation::new(events);
    let result = sim
        .prepare(scenario)
        .and_then(|_| sim.run())
        .map(|stats| stats.lost_agents);
    let events = recorded.borrow().clone();
    (result, events)
}

#[test]
fn teleported_leg_arrives_after_travel_time() {
    let scenario = create_car_scenario(
        create_line_network(2),
        vec![create_teleported_person("walker", "walk", 0, Some(50))],
        create_config(0),
    );
    let (result, events) = run(&scenario);
    assert_eq!(0, result.unwrap());

    let types: Vec<_> = events.iter().map(|e| (e.time(), e.type_())).collect();
    assert_eq!(
        vec![
            (0, "actend"),
            (0, "departure"),
            (50, "travelled"),
            (50, "arrival"),
            (50, "actstart")
        ],
        types
    );
    assert!(matches!(
        &events[2],
        Event::Travelled { distance, mode, .. } if *distance == 150. && mode == "walk"
    ));
}

#[test]
fn agents_on_links_are_stuck_at_end_time() {
    let route = ["link1", "link2", "link3"];
    let scenario = create_car_scenario(
        create_line_network(3),
        vec![
            create_car_person("1", 0, &route),
            create_car_person("2", 0, &route),
            create_car_person("3", 0, &route),
        ],
        create_config(15),
    );
    let (events, recorded) = recording();
    let mut sim = Simulation::new(events);
    sim.prepare(&scenario).unwrap();
    let stats = sim.run().unwrap();

    assert_eq!(3, stats.lost_agents);
    assert_eq!(15, stats.end_time);
    assert_eq!(0, sim.living_agents());
    let stuck: Vec<_> = recorded
        .borrow()
        .iter()
        .filter(|e| matches!(e, Event::PersonStuck { .. }))
        .map(|e| e.time())
        .collect();
    assert_eq!(vec![15, 15, 15], stuck);
}

#[test]
fn waiting_agents_are_stuck_without_mode() {
    let scenario = create_car_scenario(
        create_line_network(2),
        vec![create_car_person("late", 500, &["link1", "link2"])],
        create_config(100),
    );
    let (result, events) = run(&scenario);
    assert_eq!(1, result.unwrap());
    assert_eq!(
        vec![Event::PersonStuck {
            time: 100,
            person: Id::create("late"),
            link: Some(Id::create("link1")),
            leg_mode: None,
        }],
        events
    );
}

/// Drives link1 to link2, walks to link3 and then wants to use the car again on link3.
fn car_left_behind(teleport_vehicles: bool) -> Scenario {
    let mut plan = Plan::new();
    plan.add_act(Activity::new("home", "link1", Some(0), None));
    plan.add_leg(Leg::new("car", None, Some(Route::network(&["link1", "link2"]))));
    plan.add_act(Activity::new("work", "link2", Some(100), None));
    plan.add_leg(Leg::new(
        "walk",
        Some(10),
        Some(Route::Generic {
            start_link: Id::create("link2"),
            end_link: Id::create("link3"),
            distance: 100.,
        }),
    ));
    plan.add_act(Activity::new("shop", "link3", Some(200), None));
    plan.add_leg(Leg::new("car", None, Some(Route::network(&["link3"]))));
    plan.add_act(Activity::new("home", "link3", None, None));

    let mut config = Config::default();
    config.set_simulation(SimulationConfig {
        teleport_vehicles,
        ..SimulationConfig::default()
    });
    let mut population = Population::new();
    population.add_person(Person::new("p", plan));
    Scenario::new(
        Arc::new(create_line_network(3)),
        population,
        create_vehicles(&["p"]),
        Arc::new(config),
    )
}

#[test]
fn vehicle_not_available() {
    let (result, _) = run(&car_left_behind(false));
    assert!(matches!(
        result,
        Err(SimulationError::VehicleNotAvailable { vehicle, person, link })
            if vehicle == "p" && person == "p" && link == "link3"
    ));
}

#[test]
fn vehicle_is_teleported() {
    let scenario = car_left_behind(true);
    let (events, _) = recording();
    let mut sim = Simulation::new(events);
    sim.prepare(&scenario).unwrap();
    let stats = sim.run().unwrap();
    assert_eq!(1, stats.teleported_vehicles);
    assert_eq!(0, stats.lost_agents);
}

#[test]
fn transit_vehicle_serves_stops() {
    let mut schedule = TransitSchedule::new();
    schedule.add_driver(create_transit_driver(
        "bus1",
        10,
        &["link1", "link2", "link3"],
        vec![TransitStop::new("link2", "stop", 5)],
    ));
    let scenario = Scenario::new(
        Arc::new(create_line_network(3)),
        Population::new(),
        create_vehicles(&["bus1"]),
        Arc::new(create_config(0)),
    )
    .with_transit_schedule(schedule);

    let (result, events) = run(&scenario);
    assert_eq!(0, result.unwrap());

    assert!(matches!(
        &events[0],
        Event::TransitDriverStarts { time: 10, driver, line, .. }
            if driver.external() == "pt_bus1" && line == "line1"
    ));
    let at_stop: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            Event::VehicleArrivesAtFacility { time, .. } => Some(("arrives", *time)),
            Event::VehicleDepartsAtFacility { time, .. } => Some(("departs", *time)),
            _ => None,
        })
        .collect();
    assert_eq!(2, at_stop.len());
    assert_eq!("arrives", at_stop[0].0);
    assert_eq!("departs", at_stop[1].0);
    assert_eq!(5, at_stop[1].1 - at_stop[0].1);
    assert!(matches!(events.last(), Some(Event::PersonArrival { leg_mode, .. }) if leg_mode == "pt"));
}

#[test]
fn empty_population() {
    let scenario = create_car_scenario(create_line_network(1), vec![], create_config(0));
    let controller = LocalControllerBuilder::default()
        .scenario(scenario)
        .build()
        .unwrap();
    assert!(matches!(
        controller.run(),
        Err(SimulationError::Config(ConfigError::EmptyPopulation))
    ));
}

#[test]
fn controller_runs_iterations() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = create_config(0);
    config.set_output(Output {
        output_dir: dir.path().to_path_buf(),
        write_events: WriteEvents::Xml,
        iterations: 2,
        ..Output::default()
    });
    let route = ["link1", "link2", "link3"];
    let scenario = create_car_scenario(
        create_line_network(3),
        vec![create_car_person("1", 0, &route), create_car_person("2", 60, &route)],
        config,
    );

    let iterations = Rc::new(RefCell::new(Vec::new()));
    let seen = iterations.clone();
    let controller = LocalControllerBuilder::default()
        .scenario(scenario)
        .add_events_subscriber(move |_, iteration| seen.borrow_mut().push(iteration))
        .build()
        .unwrap();
    let travel_times = controller.run().unwrap();

    assert_eq!(vec![0, 1], *iterations.borrow());
    // 10s driving and one step to cross the node. The calculator was reset, so the first iteration
    // is not counted twice.
    assert_approx_eq!(11., travel_times.link_travel_time(&Id::create("link2"), 0).unwrap());
    for file in ["output_events_0.xml.gz", "output_events_1.xml.gz", "output_config.yml"] {
        assert!(dir.path().join(file).exists(), "{file} is missing");
    }
}
