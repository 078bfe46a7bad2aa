use ahash::HashMap;
use tracing::warn;

use crate::simulation::id::Id;
use crate::simulation::network::Link;
use crate::simulation::vehicles::{SimVehicle, Vehicle};

const MAX_TELEPORT_WARNINGS: usize = 9;

/// Holds the vehicles which are not driving, together with the link they are parked on.
#[derive(Debug, Default)]
pub struct Garage {
    parked: HashMap<Id<Vehicle>, (Id<Link>, SimVehicle)>,
    teleported: usize,
}

impl Garage {
    pub fn new() -> Self {
        Garage::default()
    }

    /// Parks a vehicle on a link. The vehicle must not have a driver anymore.
    pub fn park(&mut self, mut vehicle: SimVehicle, link: Id<Link>) {
        vehicle.driver = None;
        self.parked.insert(vehicle.id.clone(), (link, vehicle));
    }

    pub fn is_parked(&self, id: &Id<Vehicle>) -> bool {
        self.parked.contains_key(id)
    }

    pub fn parked_on(&self, id: &Id<Vehicle>) -> Option<&Id<Link>> {
        self.parked.get(id).map(|(link, _)| link)
    }

    /// Takes a vehicle out of the garage to depart on `link`. A vehicle parked on another link is only
    /// handed out if `teleport` is set, in which case the vehicle is moved to `link`. Returns None if
    /// the vehicle is not available.
    pub fn unpark(&mut self, id: &Id<Vehicle>, link: &Id<Link>, teleport: bool) -> Option<SimVehicle> {
        let parked_on = self.parked_on(id)?.clone();
        if &parked_on != link {
            if !teleport {
                return None;
            }
            self.teleported += 1;
            if self.teleported <= MAX_TELEPORT_WARNINGS {
                warn!(
                    "Vehicle {id} is parked on link {parked_on}, but is needed on link {link}. It is teleported."
                );
                if self.teleported == MAX_TELEPORT_WARNINGS {
                    warn!("No more occurrences of teleported vehicles will be reported.");
                }
            }
        }
        self.parked.remove(id).map(|(_, vehicle)| vehicle)
    }

    pub fn teleported_vehicles(&self) -> usize {
        self.teleported
    }

    pub fn len(&self) -> usize {
        self.parked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parked.is_empty()
    }
}
