use std::path::PathBuf;

use thiserror::Error;

/// Errors which abort a run before it starts, or a config lookup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid value {value:?} for config key {key:?}")]
    InvalidOverride { key: String, value: String },
    #[error("config key {key:?} must be positive")]
    NotPositive { key: &'static str },
    #[error("the population is empty, there is nothing to simulate")]
    EmptyPopulation,
    #[error("no events sink is attached to the simulation")]
    MissingEventsSink,
    #[error("node {0} is not part of the network")]
    UnknownNode(String),
    #[error("link {0} is not part of the network")]
    UnknownLink(String),
    #[error("link {0} was added twice")]
    DuplicateLink(String),
    #[error("vehicle {0} is not part of the vehicles container")]
    UnknownVehicle(String),
    #[error("vehicle type {0} is not part of the vehicles container")]
    UnknownVehicleType(String),
    #[error("plan of person {person} is invalid: {reason}")]
    InvalidPlan { person: String, reason: String },
    #[error("failed to build {0}")]
    Builder(String),
}

/// Errors of the travel time calculator. Queries of disabled statistics are configuration errors
/// of the caller and are never answered with a default value.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TravelTimeError {
    #[error("No link travel time is available if calculation is switched off by config option!")]
    LinkTravelTimesDisabled,
    #[error(
        "No link to link travel time is available if calculation is switched off by config option!"
    )]
    LinkToLinkTravelTimesDisabled,
    #[error(
        "Using the stuck feature with turning move travel times is not available. As the next link of a stuck agent is not known the turning move travel time cannot be calculated!"
    )]
    StuckWithLinkToLink,
    #[error("link {0} is unknown to the travel time calculator")]
    UnknownLink(String),
}

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    TravelTime(#[from] TravelTimeError),
    #[error("simulation is in state {actual:?}, but {expected:?} is required")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("vehicle {vehicle} not available for agent {person} on link {link}")]
    VehicleNotAvailable {
        vehicle: String,
        person: String,
        link: String,
    },
    #[error("leg of agent {person} is not simulated on the network and has no travel time")]
    MissingTravelTime { person: String },
    #[error("vehicle {vehicle} on link {link} wants to move to {next}, which does not start at the link's to node")]
    RouteInconsistent {
        vehicle: String,
        link: String,
        next: String,
    },
    #[error("events subscriber failed: {0}")]
    Subscriber(String),
    #[error("node mover worker failed: {0}")]
    WorkerFailed(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
pub type SimResult<T> = Result<T, SimulationError>;
