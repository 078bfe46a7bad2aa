pub mod agents;
pub mod config;
pub mod controller;
pub mod engines;
pub mod error;
pub mod events;
pub mod id;
pub mod logging;
pub mod network;
pub mod population;
pub mod pt;
pub mod scenario;
#[allow(clippy::module_inception)]
pub mod simulation;
pub mod time_queue;
pub mod travel_time;
pub mod vehicles;
