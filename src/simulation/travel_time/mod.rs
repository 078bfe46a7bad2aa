pub mod calculator;
pub mod data;

pub use calculator::TravelTimeCalculator;
