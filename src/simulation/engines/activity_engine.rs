use tracing::instrument;

use crate::simulation::agents::{SimulationAgent, SimulationAgentLogic};
use crate::simulation::events::{Event, EventsManager};
use crate::simulation::population::Person;
use crate::simulation::time_queue::{Identifiable, TimeQueue};

/// Holds the agents which perform an activity, ordered by the time they end it.
#[derive(Default)]
pub struct ActivityEngine {
    asleep_q: TimeQueue<SimulationAgent, Person>,
}

impl ActivityEngine {
    pub fn new() -> Self {
        ActivityEngine::default()
    }

    /// Adds an agent with its first activity. No start event is emitted for the first activity.
    pub fn add_initial(&mut self, agent: SimulationAgent, now: u32) {
        let end = agent.wakeup_time(now);
        self.asleep_q.add(agent, end);
    }

    /// Starts the current activity of an agent which just arrived.
    pub fn receive_agent(&mut self, agent: SimulationAgent, now: u32, events: &mut EventsManager) {
        if let Some(act) = agent.curr_act() {
            events.publish_event(Event::ActivityStart {
                time: now,
                person: agent.id().clone(),
                link: act.link.clone(),
                act_type: act.act_type.clone(),
            });
        }
        self.add_initial(agent, now);
    }

    /// Returns the agents whose activity ends at or before `now`. The agents are still on their
    /// activity; the caller moves them on to their next leg.
    #[instrument(level = "trace", skip(self, events))]
    pub fn do_step(&mut self, now: u32, events: &mut EventsManager) -> Vec<SimulationAgent> {
        let agents = self.asleep_q.pop(now);
        for agent in &agents {
            if let Some(act) = agent.curr_act() {
                events.publish_event(Event::ActivityEnd {
                    time: now,
                    person: agent.id().clone(),
                    link: act.link.clone(),
                    act_type: act.act_type.clone(),
                });
            }
        }
        agents
    }

    /// The earliest time at which an activity ends.
    pub fn next_end(&self) -> Option<u32> {
        self.asleep_q.next_time()
    }

    pub fn len(&self) -> usize {
        self.asleep_q.len()
    }

    pub fn is_empty(&self) -> bool {
        self.asleep_q.is_empty()
    }

    /// Removes all agents, e.g. at the end of a simulation.
    pub fn drain(&mut self) -> Vec<SimulationAgent> {
        self.asleep_q.drain()
    }
}
