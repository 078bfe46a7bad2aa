pub mod activity_engine;
pub mod teleportation_engine;
