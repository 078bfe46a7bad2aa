use tracing::instrument;

use crate::simulation::agents::{SimulationAgent, SimulationAgentLogic};
use crate::simulation::events::{Event, EventsManager};
use crate::simulation::id::Id;
use crate::simulation::population::Person;
use crate::simulation::time_queue::{Identifiable, TimeQueue};

struct TeleportedAgent {
    agent: SimulationAgent,
    distance: f64,
}

impl Identifiable<Person> for TeleportedAgent {
    fn id(&self) -> &Id<Person> {
        self.agent.id()
    }
}

/// Moves agents on legs which are not simulated on the network straight to their arrival time.
/// Agents arriving at the same time are released in descending id order.
#[derive(Default)]
pub struct TeleportationEngine {
    queue: TimeQueue<TeleportedAgent, Person>,
}

impl TeleportationEngine {
    pub fn new() -> Self {
        TeleportationEngine::default()
    }

    pub fn receive_agent(&mut self, agent: SimulationAgent, distance: f64, arrival: u32) {
        self.queue.add(TeleportedAgent { agent, distance }, arrival);
    }

    /// Returns the agents arriving at or before `now`, each after a travelled event.
    #[instrument(level = "trace", skip(self, events))]
    pub fn do_step(&mut self, now: u32, events: &mut EventsManager) -> Vec<SimulationAgent> {
        let arrived = self.queue.pop(now);
        let mut agents = Vec::with_capacity(arrived.len());
        for TeleportedAgent { agent, distance } in arrived {
            let mode = agent
                .curr_leg()
                .map(|leg| leg.mode.clone())
                .unwrap_or_default();
            events.publish_event(Event::Travelled {
                time: now,
                person: agent.id().clone(),
                distance,
                mode,
            });
            agents.push(agent);
        }
        agents
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn drain(&mut self) -> Vec<SimulationAgent> {
        self.queue.drain().into_iter().map(|t| t.agent).collect()
    }
}
