use std::sync::Arc;

use crate::simulation::agents::{SimulationAgent, SimulationAgentLogic};
use crate::simulation::config::{Config, Simulation};
use crate::simulation::id::Id;
use crate::simulation::network::{LinkBuilder, Network, Node};
use crate::simulation::population::{Activity, Leg, Person, Plan, Population, Route};
use crate::simulation::pt::{TransitDriver, TransitStop};
use crate::simulation::scenario::Scenario;
use crate::simulation::vehicles::{SimVehicle, Vehicle, VehicleType, Vehicles};

/// Creates a chain of `n` links. Link `i` leads from node `i-1` to node `i`. All links are 100m long,
/// with a free speed of 10m/s and a capacity of 3600 veh/h.
pub fn create_line_network(n: usize) -> Network {
    let mut network = Network::new();
    for i in 0..=n {
        network.add_node(Node::new(Id::create(&format!("node{i}")), i as f64 * 100., 0.));
    }
    for i in 1..=n {
        add_link(
            &mut network,
            &format!("link{i}"),
            &format!("node{}", i - 1),
            &format!("node{i}"),
        );
    }
    network
}

/// Creates a grid of `n` x `n` nodes, named `n{row}_{col}`. Horizontal links `h{row}_{col}` lead
/// from column `col` to `col+1`, vertical links `v{col}_{row}` from row `row` to `row+1`. Links are
/// like the ones of [create_line_network].
pub fn create_grid_network(n: usize) -> Network {
    let mut network = Network::new();
    for row in 0..n {
        for col in 0..n {
            network.add_node(Node::new(
                Id::create(&format!("n{row}_{col}")),
                col as f64 * 100.,
                row as f64 * 100.,
            ));
        }
    }
    for row in 0..n {
        for col in 0..n - 1 {
            add_link(
                &mut network,
                &format!("h{row}_{col}"),
                &format!("n{row}_{col}"),
                &format!("n{row}_{}", col + 1),
            );
        }
    }
    for col in 0..n {
        for row in 0..n - 1 {
            add_link(
                &mut network,
                &format!("v{col}_{row}"),
                &format!("n{row}_{col}"),
                &format!("n{}_{col}", row + 1),
            );
        }
    }
    network
}

fn add_link(network: &mut Network, id: &str, from: &str, to: &str) {
    let link = LinkBuilder::default()
        .id(id)
        .from(from)
        .to(to)
        .length(100.)
        .freespeed(10.)
        .capacity(3600.)
        .build()
        .unwrap();
    network.add_link(link).unwrap();
}

/// A person who drives `route` by car, leaving home at `end_time`.
pub fn create_car_person(id: &str, end_time: u32, route: &[&str]) -> Person {
    let mut plan = Plan::new();
    plan.add_act(Activity::new("home", route[0], Some(end_time), None));
    plan.add_leg(Leg::new("car", None, Some(Route::network(route))));
    plan.add_act(Activity::new("work", route[route.len() - 1], None, None));
    Person::new(id, plan)
}

/// A person with a leg which is not simulated on the network.
pub fn create_teleported_person(id: &str, mode: &str, end_time: u32, trav_time: Option<u32>) -> Person {
    let mut plan = Plan::new();
    plan.add_act(Activity::new("home", "link1", Some(end_time), None));
    plan.add_leg(Leg::new(
        mode,
        trav_time,
        Some(Route::Generic {
            start_link: Id::create("link1"),
            end_link: Id::create("link2"),
            distance: 150.,
        }),
    ));
    plan.add_act(Activity::new("work", "link2", None, None));
    Person::new(id, plan)
}

/// One car per id. Cars have a max velocity of 100m/s and a pce of 1.
pub fn create_vehicles(ids: &[&str]) -> Vehicles {
    let mut vehicles = Vehicles::new();
    vehicles.add_type(VehicleType::new("car", 100., 1.));
    for id in ids {
        vehicles.add_vehicle(Vehicle::new(id, "car")).unwrap();
    }
    vehicles
}

/// A scenario in which every person drives a car with its own id.
pub fn create_car_scenario(network: Network, persons: Vec<Person>, config: Config) -> Scenario {
    let ids: Vec<String> = persons.iter().map(|p| p.id.to_string()).collect();
    let ids: Vec<&str> = ids.iter().map(|s| s.as_str()).collect();
    let mut population = Population::new();
    for person in persons {
        population.add_person(person);
    }
    Scenario::new(Arc::new(network), population, create_vehicles(&ids), Arc::new(config))
}

pub fn create_config(end_time: u32) -> Config {
    let mut config = Config::default();
    config.set_simulation(Simulation {
        end_time,
        ..Simulation::default()
    });
    config
}

/// A vehicle with a car driver on its leg. Driver and vehicle share the id.
pub fn create_driving_vehicle(id: &str, pce: f32, route: &[&str]) -> SimVehicle {
    let mut agent = SimulationAgent::new_plan_based(create_car_person(id, 0, route));
    agent.advance_plan();
    SimVehicle {
        id: Id::create(id),
        max_v: 100.,
        pce,
        driver: Some(agent),
    }
}

/// A bus whose driver `pt_{id}` already drives its route.
pub fn create_transit_vehicle(id: &str, route: &[&str], stops: Vec<TransitStop>) -> SimVehicle {
    let mut agent = SimulationAgent::new_transit_driver(create_transit_driver(id, 0, route, stops));
    agent.advance_plan();
    SimVehicle {
        id: Id::create(id),
        max_v: 100.,
        pce: 1.,
        driver: Some(agent),
    }
}

pub fn create_transit_driver(
    vehicle: &str,
    departure: u32,
    route: &[&str],
    stops: Vec<TransitStop>,
) -> TransitDriver {
    TransitDriver {
        id: Id::create(&format!("pt_{vehicle}")),
        vehicle: Id::create(vehicle),
        departure,
        line: "line1".to_string(),
        route: "route1".to_string(),
        links: route.iter().map(|l| Id::create(l)).collect(),
        stops,
    }
}
