use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use rust_queue_sim::simulation::config;
use rust_queue_sim::simulation::events::{Event, EventsManager};
use rust_queue_sim::simulation::id::Id;
use rust_queue_sim::simulation::network::parallel::NodeMover;
use rust_queue_sim::simulation::network::queue_network::QueueNetwork;
use rust_queue_sim::simulation::network::{LinkBuilder, Network, Node};
use rust_queue_sim::simulation::population::Population;
use rust_queue_sim::simulation::scenario::Scenario;
use rust_queue_sim::simulation::simulation::Simulation;
use rust_queue_sim::test_utils::{
    create_car_person, create_config, create_driving_vehicle, create_grid_network, create_vehicles,
};

/// link1 is a regular link, link2 holds a single vehicle.
fn network_with_small_link() -> Network {
    let mut network = Network::new();
    for i in 0..3 {
        network.add_node(Node::new(Id::create(&format!("node{i}")), i as f64 * 100., 0.));
    }
    let link1 = LinkBuilder::default()
        .id("link1")
        .from("node0")
        .to("node1")
        .length(100.)
        .freespeed(10.)
        .build()
        .unwrap();
    let link2 = LinkBuilder::default()
        .id("link2")
        .from("node1")
        .to("node2")
        .length(100.)
        .freespeed(10.)
        .storage_capacity(1.)
        .build()
        .unwrap();
    network.add_link(link1).unwrap();
    network.add_link(link2).unwrap();
    network
}

#[test]
fn second_vehicle_waits_for_storage() {
    let mut population = Population::new();
    for id in ["1", "2"] {
        population.add_person(create_car_person(id, 0, &["link1", "link2"]));
    }
    let scenario = Scenario::new(
        Arc::new(network_with_small_link()),
        population,
        create_vehicles(&["1", "2"]),
        Arc::new(create_config(0)),
    );

    let mut events = EventsManager::new();
    let entered = Rc::new(RefCell::new(Vec::new()));
    let captured = entered.clone();
    events.on_any(move |e| {
        if let Event::LinkEnter { time, link, driver, .. } = e {
            if link.external() == "link2" {
                captured.borrow_mut().push((*time, driver.to_string()));
            }
        }
    });

    let mut sim = Simulation::new(events);
    sim.prepare(&scenario).unwrap();
    let stats = sim.run().unwrap();
    assert_eq!(0, stats.lost_agents);

    // the larger id leaves link1 first. The other vehicle waits until the first one arrived at 21,
    // and crosses the node in the next step
    assert_eq!(
        vec![(11, "2".to_string()), (22, "1".to_string())],
        *entered.borrow()
    );
}

#[test]
fn storage_is_never_exceeded() {
    let network = create_grid_network(4);
    let mut network = QueueNetwork::from_network(&network, &config::Simulation::default());
    let mut events = EventsManager::new();
    let arrivals = Rc::new(RefCell::new(0));
    let counted = arrivals.clone();
    events.on_any(move |e| {
        if let Event::VehicleLeavesTraffic { .. } = e {
            *counted.borrow_mut() += 1;
        }
    });

    // all rows squeeze into the last column
    let mut total = 0;
    for row in 0..4 {
        let mut route: Vec<String> = (0..3).map(|c| format!("h{row}_{c}")).collect();
        route.extend((row..3).map(|r| format!("v3_{r}")));
        let route: Vec<&str> = route.iter().map(|s| s.as_str()).collect();
        let link = network.link_index(&route[0].into()).unwrap();
        for i in 0..30 {
            let vehicle = create_driving_vehicle(&format!("{row}_{i}"), 1., &route);
            network.add_departing_vehicle(vehicle, link, 0, &mut events);
            total += 1;
        }
    }

    for now in 0..2000 {
        network.move_nodes(now, &NodeMover::Serial, &mut events).unwrap();
        assert_link_invariants(&network, now);
        network.move_links(now, &mut events);
        assert_link_invariants(&network, now);
        assert_eq!(total, network.vehicle_count() + *arrivals.borrow());
    }
    assert_eq!(total, *arrivals.borrow());
}

fn assert_link_invariants(network: &QueueNetwork, now: u32) {
    for (index, link) in network.links().iter().enumerate() {
        assert!(
            link.used_storage() <= link.max_storage() + 1e-6,
            "link {} over storage at {now}",
            link.id
        );
        assert_eq!(
            link.is_active(),
            network.is_link_active(index),
            "link {} at {now}",
            link.id
        );
    }
}
