pub mod agent;
pub mod agent_logic;

use std::fmt::Debug;

pub use agent::SimulationAgent;

use crate::simulation::id::Id;
use crate::simulation::network::Link;
use crate::simulation::population::{Activity, Leg, Person};
use crate::simulation::pt::TransitStopFacility;
use crate::simulation::time_queue::Identifiable;

/// The capabilities the simulation needs from an agent. Agents are moved across threads with the
/// vehicles they drive, and the network is read from several threads while node moves are decided.
pub trait SimulationAgentLogic: Identifiable<Person> + Send + Sync {
    /// The current activity. None if the agent is on a leg or has no activities, like transit drivers.
    fn curr_act(&self) -> Option<&Activity>;
    fn curr_leg(&self) -> Option<&Leg>;
    /// The activity after the current plan element.
    fn next_act(&self) -> Option<&Activity>;
    /// Moves to the next plan element. Returns false if the plan has no element left.
    fn advance_plan(&mut self) -> bool;
    fn state(&self) -> SimulationAgentState;

    fn is_wanting_to_arrive_on_current_link(&self) -> bool {
        self.peek_next_link_id().is_none()
    }
    fn curr_link_id(&self) -> Option<&Id<Link>>;
    fn peek_next_link_id(&self) -> Option<&Id<Link>>;
    /// The time at which the agent ends its current activity, if it started at `now`.
    fn wakeup_time(&self, now: u32) -> u32;
    fn notify_event(&mut self, event: AgentEvent, now: u32);

    /// What the agent wants to do at a transit stop on its current link.
    fn stop_action(&self) -> StopAction {
        StopAction::None
    }

    /// Line and route id, if the agent drives a transit vehicle.
    fn transit_line(&self) -> Option<(&str, &str)> {
        None
    }
}

/// Things which happen to an agent while it is on the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentEvent {
    LeftLink,
    ArrivedAtStop,
    DepartedFromStop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StopAction {
    None,
    Arrive {
        facility: Id<TransitStopFacility>,
        dwell: u32,
    },
    Depart {
        facility: Id<TransitStopFacility>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationAgentState {
    Activity,
    Leg,
    /// The plan is completely executed.
    Done,
}

impl Debug for dyn SimulationAgentLogic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Simulation Agent Logic for agent with id {}",
            self.id().external()
        )
    }
}
