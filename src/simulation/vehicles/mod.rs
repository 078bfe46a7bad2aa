pub mod garage;

use ahash::HashMap;

use crate::simulation::agents::SimulationAgent;
use crate::simulation::error::{ConfigError, ConfigResult};
use crate::simulation::id::Id;

#[derive(Debug, Clone, PartialEq)]
pub struct VehicleType {
    pub id: Id<VehicleType>,
    /// maximum velocity in m/s
    pub max_v: f32,
    /// passenger car equivalents
    pub pce: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vehicle {
    pub id: Id<Vehicle>,
    pub veh_type: Id<VehicleType>,
}

/// Vehicle definitions of a scenario.
#[derive(Debug, Default, Clone)]
pub struct Vehicles {
    types: HashMap<Id<VehicleType>, VehicleType>,
    vehicles: Vec<Vehicle>,
    index: HashMap<Id<Vehicle>, usize>,
}

impl Vehicles {
    pub fn new() -> Self {
        Vehicles::default()
    }

    pub fn add_type(&mut self, veh_type: VehicleType) {
        self.types.insert(veh_type.id.clone(), veh_type);
    }

    pub fn add_vehicle(&mut self, vehicle: Vehicle) -> ConfigResult<()> {
        if !self.types.contains_key(&vehicle.veh_type) {
            return Err(ConfigError::UnknownVehicleType(vehicle.veh_type.to_string()));
        }
        match self.index.get(&vehicle.id) {
            Some(i) => self.vehicles[*i] = vehicle,
            None => {
                self.index.insert(vehicle.id.clone(), self.vehicles.len());
                self.vehicles.push(vehicle);
            }
        }
        Ok(())
    }

    pub fn get(&self, id: &Id<Vehicle>) -> Option<&Vehicle> {
        self.index.get(id).map(|i| &self.vehicles[*i])
    }

    pub fn get_type(&self, id: &Id<VehicleType>) -> Option<&VehicleType> {
        self.types.get(id)
    }

    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    /// Creates the runtime representation of a vehicle.
    pub fn create_sim_vehicle(&self, id: &Id<Vehicle>) -> ConfigResult<SimVehicle> {
        let vehicle = self
            .get(id)
            .ok_or_else(|| ConfigError::UnknownVehicle(id.to_string()))?;
        let veh_type = self
            .get_type(&vehicle.veh_type)
            .ok_or_else(|| ConfigError::UnknownVehicleType(vehicle.veh_type.to_string()))?;
        Ok(SimVehicle {
            id: vehicle.id.clone(),
            max_v: veh_type.max_v,
            pce: veh_type.pce,
            driver: None,
        })
    }
}

impl VehicleType {
    pub fn new(id: &str, max_v: f32, pce: f32) -> Self {
        VehicleType {
            id: Id::create(id),
            max_v,
            pce,
        }
    }
}

impl Vehicle {
    pub fn new(id: &str, veh_type: &str) -> Self {
        Vehicle {
            id: Id::create(id),
            veh_type: Id::create(veh_type),
        }
    }
}

/// A vehicle while it takes part in the simulation. It owns its driver while it is on the network.
#[derive(Debug)]
pub struct SimVehicle {
    pub id: Id<Vehicle>,
    pub max_v: f32,
    pub pce: f32,
    pub driver: Option<SimulationAgent>,
}

impl SimVehicle {
    pub fn driver(&self) -> Option<&SimulationAgent> {
        self.driver.as_ref()
    }

    pub fn driver_mut(&mut self) -> Option<&mut SimulationAgent> {
        self.driver.as_mut()
    }
}
