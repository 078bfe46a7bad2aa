use crate::simulation::agents::{AgentEvent, SimulationAgentLogic, SimulationAgentState, StopAction};
use crate::simulation::id::Id;
use crate::simulation::network::Link;
use crate::simulation::population::{Activity, Leg, Person, Route};
use crate::simulation::pt::TransitDriver;
use crate::simulation::time_queue::Identifiable;

/// An agent which executes the selected plan of a person.
#[derive(Debug, PartialEq, Clone)]
pub struct PlanBasedSimulationLogic {
    person: Person,
    curr_plan_element: usize,
    curr_route_element: usize,
}

impl PlanBasedSimulationLogic {
    pub fn new(person: Person) -> Self {
        Self {
            person,
            curr_plan_element: 0,
            curr_route_element: 0,
        }
    }

    fn total_elements(&self) -> usize {
        self.person.plan.acts.len() + self.person.plan.legs.len()
    }

    fn curr_route(&self) -> Option<&Route> {
        self.curr_leg().and_then(|leg| leg.route.as_ref())
    }
}

impl Identifiable<Person> for PlanBasedSimulationLogic {
    fn id(&self) -> &Id<Person> {
        &self.person.id
    }
}

impl SimulationAgentLogic for PlanBasedSimulationLogic {
    fn curr_act(&self) -> Option<&Activity> {
        // position index: 0      | 1
        // activities:     a0 (0) | a1 (2)
        // legs:           l0 (1) | l1 (3)
        if self.curr_plan_element % 2 == 0 {
            self.person.plan.acts.get(self.curr_plan_element / 2)
        } else {
            None
        }
    }

    fn curr_leg(&self) -> Option<&Leg> {
        if self.curr_plan_element % 2 == 1 {
            self.person.plan.legs.get(self.curr_plan_element / 2)
        } else {
            None
        }
    }

    fn next_act(&self) -> Option<&Activity> {
        self.person.plan.acts.get(self.curr_plan_element / 2 + 1)
    }

    fn advance_plan(&mut self) -> bool {
        if self.curr_plan_element + 1 >= self.total_elements() {
            return false;
        }
        self.curr_plan_element += 1;
        self.curr_route_element = 0;
        true
    }

    fn state(&self) -> SimulationAgentState {
        if self.curr_plan_element % 2 == 1 {
            SimulationAgentState::Leg
        } else if self.curr_plan_element + 1 >= self.total_elements() {
            SimulationAgentState::Done
        } else {
            SimulationAgentState::Activity
        }
    }

    fn curr_link_id(&self) -> Option<&Id<Link>> {
        match self.curr_route()? {
            Route::Network { links } => links.get(self.curr_route_element),
            Route::Generic {
                start_link,
                end_link,
                ..
            } => match self.curr_route_element {
                0 => Some(start_link),
                _ => Some(end_link),
            },
        }
    }

    fn peek_next_link_id(&self) -> Option<&Id<Link>> {
        match self.curr_route()? {
            Route::Network { links } => links.get(self.curr_route_element + 1),
            Route::Generic { .. } => None,
        }
    }

    fn wakeup_time(&self, now: u32) -> u32 {
        match self.state() {
            SimulationAgentState::Activity => self
                .curr_act()
                .map(|act| act.cmp_end_time(now))
                .unwrap_or(u32::MAX),
            _ => u32::MAX,
        }
    }

    fn notify_event(&mut self, event: AgentEvent, _now: u32) {
        if event == AgentEvent::LeftLink {
            self.curr_route_element += 1;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriverPhase {
    Waiting,
    Driving,
    Done,
}

/// Drives one departure of a transit route. The driver has no activities. It serves its stops in
/// order: when the vehicle is ready to leave a stop link, it dwells at the stop first.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitDriverLogic {
    driver: TransitDriver,
    leg: Leg,
    phase: DriverPhase,
    curr_route_element: usize,
    next_stop: usize,
    at_stop: bool,
}

impl TransitDriverLogic {
    pub const MODE: &'static str = "pt";

    pub fn new(driver: TransitDriver) -> Self {
        let leg = Leg {
            mode: Self::MODE.to_string(),
            trav_time: None,
            route: Some(Route::Network {
                links: driver.links.clone(),
            }),
            vehicle: Some(driver.vehicle.clone()),
        };
        TransitDriverLogic {
            driver,
            leg,
            phase: DriverPhase::Waiting,
            curr_route_element: 0,
            next_stop: 0,
            at_stop: false,
        }
    }
}

impl Identifiable<Person> for TransitDriverLogic {
    fn id(&self) -> &Id<Person> {
        &self.driver.id
    }
}

impl SimulationAgentLogic for TransitDriverLogic {
    fn curr_act(&self) -> Option<&Activity> {
        None
    }

    fn curr_leg(&self) -> Option<&Leg> {
        (self.phase == DriverPhase::Driving).then_some(&self.leg)
    }

    fn next_act(&self) -> Option<&Activity> {
        None
    }

    fn advance_plan(&mut self) -> bool {
        self.phase = match self.phase {
            DriverPhase::Waiting => DriverPhase::Driving,
            DriverPhase::Driving => DriverPhase::Done,
            DriverPhase::Done => return false,
        };
        true
    }

    fn state(&self) -> SimulationAgentState {
        match self.phase {
            DriverPhase::Waiting => SimulationAgentState::Activity,
            DriverPhase::Driving => SimulationAgentState::Leg,
            DriverPhase::Done => SimulationAgentState::Done,
        }
    }

    fn curr_link_id(&self) -> Option<&Id<Link>> {
        match self.phase {
            DriverPhase::Driving => self.driver.links.get(self.curr_route_element),
            _ => None,
        }
    }

    fn peek_next_link_id(&self) -> Option<&Id<Link>> {
        match self.phase {
            DriverPhase::Driving => self.driver.links.get(self.curr_route_element + 1),
            _ => None,
        }
    }

    fn wakeup_time(&self, _now: u32) -> u32 {
        match self.phase {
            DriverPhase::Waiting => self.driver.departure,
            _ => u32::MAX,
        }
    }

    fn notify_event(&mut self, event: AgentEvent, _now: u32) {
        match event {
            AgentEvent::LeftLink => self.curr_route_element += 1,
            AgentEvent::ArrivedAtStop => self.at_stop = true,
            AgentEvent::DepartedFromStop => {
                self.at_stop = false;
                self.next_stop += 1;
            }
        }
    }

    fn stop_action(&self) -> StopAction {
        let Some(stop) = self.driver.stops.get(self.next_stop) else {
            return StopAction::None;
        };
        if self.curr_link_id() != Some(&stop.link) {
            return StopAction::None;
        }
        if self.at_stop {
            StopAction::Depart {
                facility: stop.facility.clone(),
            }
        } else {
            StopAction::Arrive {
                facility: stop.facility.clone(),
                dwell: stop.dwell,
            }
        }
    }

    fn transit_line(&self) -> Option<(&str, &str)> {
        Some((&self.driver.line, &self.driver.route))
    }
}
