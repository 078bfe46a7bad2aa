use crate::simulation::error::{ConfigError, ConfigResult};
use crate::simulation::id::Id;
use crate::simulation::network::{Link, Network};
use crate::simulation::population::Person;
use crate::simulation::vehicles::Vehicle;

/// Marker type for the ids of transit stops.
#[derive(Debug)]
pub struct TransitStopFacility;

/// The transit drivers of a scenario. Each driver runs one departure of a transit route.
#[derive(Debug, Default, Clone)]
pub struct TransitSchedule {
    drivers: Vec<TransitDriver>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitDriver {
    pub id: Id<Person>,
    pub vehicle: Id<Vehicle>,
    pub departure: u32,
    pub line: String,
    pub route: String,
    pub links: Vec<Id<Link>>,
    /// Stops in the order they are served. Each stop lies on a link of the route.
    pub stops: Vec<TransitStop>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitStop {
    pub link: Id<Link>,
    pub facility: Id<TransitStopFacility>,
    pub dwell: u32,
}

impl TransitSchedule {
    pub fn new() -> Self {
        TransitSchedule::default()
    }

    pub fn add_driver(&mut self, driver: TransitDriver) {
        self.drivers.push(driver);
    }

    pub fn drivers(&self) -> &[TransitDriver] {
        &self.drivers
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}

impl TransitDriver {
    pub fn validate(&self, network: &Network) -> ConfigResult<()> {
        if self.links.is_empty() {
            return Err(ConfigError::InvalidPlan {
                person: self.id.to_string(),
                reason: "transit route has no links".to_string(),
            });
        }
        if let Some(unknown) = self.links.iter().find(|l| network.get_link(l).is_none()) {
            return Err(ConfigError::UnknownLink(unknown.to_string()));
        }

        // stops must be served in route order
        let mut route_index = 0;
        for stop in &self.stops {
            match self.links[route_index..].iter().position(|l| *l == stop.link) {
                Some(pos) => route_index += pos,
                None => {
                    return Err(ConfigError::InvalidPlan {
                        person: self.id.to_string(),
                        reason: format!("stop {} is not on the route", stop.facility),
                    });
                }
            }
        }
        Ok(())
    }
}

impl TransitStop {
    pub fn new(link: &str, facility: &str, dwell: u32) -> Self {
        TransitStop {
            link: Id::create(link),
            facility: Id::create(facility),
            dwell,
        }
    }
}
