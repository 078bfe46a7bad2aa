use std::cell::RefCell;
use std::rc::Rc;

use rust_queue_sim::simulation::config::ComputationalSetup;
use rust_queue_sim::simulation::events::EventsManager;
use rust_queue_sim::simulation::population::Person;
use rust_queue_sim::simulation::simulation::Simulation;
use rust_queue_sim::test_utils::{
    create_car_person, create_car_scenario, create_config, create_grid_network,
    create_line_network, create_teleported_person,
};

/// Commuters from all rows of a grid merge into the same column.
fn persons() -> Vec<Person> {
    let mut persons = Vec::new();
    for row in 0..5 {
        let mut route: Vec<String> = (0..4).map(|c| format!("h{row}_{c}")).collect();
        route.extend((row..4).map(|r| format!("v4_{r}")));
        let route: Vec<&str> = route.iter().map(|s| s.as_str()).collect();
        for i in 0..20 {
            persons.push(create_car_person(&format!("car_{row}_{i}"), i * 3, &route));
        }
    }
    persons
}

fn run(threads: u32) -> Vec<String> {
    let mut config = create_config(0);
    config.set_computational_setup(ComputationalSetup { threads });
    let scenario = create_car_scenario(create_grid_network(6), persons(), config);

    let mut events = EventsManager::new();
    let recorded = Rc::new(RefCell::new(Vec::new()));
    let captured = recorded.clone();
    events.on_any(move |e| captured.borrow_mut().push(e.to_string()));

    let mut sim = Simulation::new(events);
    sim.prepare(&scenario).unwrap();
    let stats = sim.run().unwrap();
    assert_eq!(0, stats.lost_agents);
    recorded.take()
}

#[test]
fn two_runs_are_identical() {
    let first = run(1);
    let second = run(1);
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn thread_count_does_not_change_events() {
    let serial = run(1);
    for threads in [2, 4] {
        assert_eq!(serial, run(threads), "{threads} threads");
    }
}

#[test]
fn teleported_legs_are_deterministic() {
    let run_walkers = || {
        let persons = (0..10)
            .map(|i| create_teleported_person(&format!("walker{i}"), "walk", i % 3, Some(50)))
            .collect();
        let scenario = create_car_scenario(
            create_line_network(2),
            persons,
            create_config(0),
        );
        let mut events = EventsManager::new();
        let recorded = Rc::new(RefCell::new(Vec::new()));
        let captured = recorded.clone();
        events.on_any(move |e| captured.borrow_mut().push(e.to_string()));
        let mut sim = Simulation::new(events);
        sim.prepare(&scenario).unwrap();
        sim.run().unwrap();
        recorded.take()
    };
    assert_eq!(run_walkers(), run_walkers());
}
