use crate::simulation::agents::agent_logic::{PlanBasedSimulationLogic, TransitDriverLogic};
use crate::simulation::agents::{AgentEvent, SimulationAgentLogic, SimulationAgentState, StopAction};
use crate::simulation::id::Id;
use crate::simulation::network::Link;
use crate::simulation::population::{Activity, Leg, Person};
use crate::simulation::pt::TransitDriver;
use crate::simulation::time_queue::Identifiable;

#[derive(Debug)]
pub struct SimulationAgent {
    logic: Box<dyn SimulationAgentLogic>,
}

impl PartialEq for SimulationAgent {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl SimulationAgent {
    pub fn new_plan_based(person: Person) -> Self {
        Self {
            logic: Box::new(PlanBasedSimulationLogic::new(person)),
        }
    }

    pub fn new_transit_driver(driver: TransitDriver) -> Self {
        Self {
            logic: Box::new(TransitDriverLogic::new(driver)),
        }
    }

    pub fn is_transit_driver(&self) -> bool {
        self.logic.transit_line().is_some()
    }

    /// Whether the current leg is driven on the network. Transit drivers always drive.
    pub fn drives_on_network(&self, main_modes: &[String]) -> bool {
        self.is_transit_driver()
            || self
                .curr_leg()
                .is_some_and(|leg| main_modes.contains(&leg.mode))
    }
}

impl Identifiable<Person> for SimulationAgent {
    fn id(&self) -> &Id<Person> {
        self.logic.id()
    }
}

impl SimulationAgentLogic for SimulationAgent {
    fn curr_act(&self) -> Option<&Activity> {
        self.logic.curr_act()
    }
    fn curr_leg(&self) -> Option<&Leg> {
        self.logic.curr_leg()
    }
    fn next_act(&self) -> Option<&Activity> {
        self.logic.next_act()
    }
    fn advance_plan(&mut self) -> bool {
        self.logic.advance_plan()
    }
    fn state(&self) -> SimulationAgentState {
        self.logic.state()
    }
    fn is_wanting_to_arrive_on_current_link(&self) -> bool {
        self.logic.is_wanting_to_arrive_on_current_link()
    }
    fn curr_link_id(&self) -> Option<&Id<Link>> {
        self.logic.curr_link_id()
    }
    fn peek_next_link_id(&self) -> Option<&Id<Link>> {
        self.logic.peek_next_link_id()
    }
    fn wakeup_time(&self, now: u32) -> u32 {
        self.logic.wakeup_time(now)
    }
    fn notify_event(&mut self, event: AgentEvent, now: u32) {
        self.logic.notify_event(event, now)
    }
    fn stop_action(&self) -> StopAction {
        self.logic.stop_action()
    }
    fn transit_line(&self) -> Option<(&str, &str)> {
        self.logic.transit_line()
    }
}
