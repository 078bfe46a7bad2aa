use ahash::HashMap;
use nohash_hasher::IntSet;
use tracing::instrument;

use crate::simulation::agents::{AgentEvent, SimulationAgentLogic};
use crate::simulation::config;
use crate::simulation::error::SimResult;
use crate::simulation::events::{Event, EventsManager};
use crate::simulation::id::Id;
use crate::simulation::network::change_events::NetworkChangeEvent;
use crate::simulation::network::link::{LinkParams, QueueLink, driver_id};
use crate::simulation::network::node::{NodeMoves, QueueNode};
use crate::simulation::network::parallel::NodeMover;
use crate::simulation::network::{Link, Network};
use crate::simulation::vehicles::SimVehicle;

/// Links and nodes, ordered in insertion order. Only the sets of active links and nodes are touched
/// in a simulation step.
#[derive(Debug, Default)]
struct ActiveSet {
    order: Vec<usize>,
    members: IntSet<usize>,
}

impl ActiveSet {
    fn activate(&mut self, index: usize) {
        if self.members.insert(index) {
            self.order.push(index);
        }
    }

    fn retain(&mut self, mut keep: impl FnMut(usize) -> bool) {
        let members = &mut self.members;
        self.order.retain(|i| {
            let k = keep(*i);
            if !k {
                members.remove(i);
            }
            k
        });
    }

    fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }
}

/// The state of the network during a simulation run.
#[derive(Debug)]
pub struct QueueNetwork {
    links: Vec<QueueLink>,
    nodes: Vec<QueueNode>,
    link_index: HashMap<Id<Link>, usize>,
    active_links: ActiveSet,
    active_nodes: ActiveSet,
    params: LinkParams,
    seed: u64,
}

impl QueueNetwork {
    pub fn from_network(network: &Network, config: &config::Simulation) -> Self {
        let params = LinkParams::new(config, network.effective_cell_size);
        let mut link_index = HashMap::default();
        let mut links = Vec::with_capacity(network.links().len());
        for link in network.links() {
            // links are only added to a network if their nodes exist
            let from = network.node_index(&link.from).unwrap_or_default();
            let to = network.node_index(&link.to).unwrap_or_default();
            link_index.insert(link.id.clone(), links.len());
            links.push(QueueLink::from_link(link, from, to, &params));
        }

        let resolve = |ids: &[Id<Link>]| -> Vec<usize> {
            ids.iter().filter_map(|id| link_index.get(id).copied()).collect()
        };
        let nodes = network
            .nodes()
            .iter()
            .map(|n| QueueNode {
                id: n.id.clone(),
                in_links: resolve(&n.in_links),
                out_links: resolve(&n.out_links),
            })
            .collect();

        QueueNetwork {
            links,
            nodes,
            link_index,
            active_links: ActiveSet::default(),
            active_nodes: ActiveSet::default(),
            params,
            seed: config.seed,
        }
    }

    pub fn link_index(&self, id: &Id<Link>) -> Option<usize> {
        self.link_index.get(id).copied()
    }

    pub fn link(&self, index: usize) -> &QueueLink {
        &self.links[index]
    }

    pub fn links(&self) -> &[QueueLink] {
        &self.links
    }

    pub fn nodes(&self) -> &[QueueNode] {
        &self.nodes
    }

    pub fn active_links(&self) -> &[usize] {
        &self.active_links.order
    }

    pub fn active_nodes(&self) -> &[usize] {
        &self.active_nodes.order
    }

    pub fn is_link_active(&self, index: usize) -> bool {
        self.active_links.members.contains(&index)
    }

    pub fn is_node_active(&self, index: usize) -> bool {
        self.active_nodes.members.contains(&index)
    }

    /// Number of vehicles on all links.
    pub fn vehicle_count(&self) -> usize {
        self.active_links
            .order
            .iter()
            .map(|i| self.links[*i].vehicle_count())
            .sum()
    }

    /// Puts a vehicle onto the link on which its driver departs. The vehicle enters the link with the
    /// next link move.
    pub fn add_departing_vehicle(
        &mut self,
        vehicle: SimVehicle,
        link: usize,
        now: u32,
        events: &mut EventsManager,
    ) {
        let mode = vehicle
            .driver()
            .and_then(|d| d.curr_leg())
            .map(|leg| leg.mode.clone())
            .unwrap_or_default();
        events.publish_event(Event::VehicleEntersTraffic {
            time: now,
            person: driver_id(&vehicle),
            link: self.links[link].id.clone(),
            vehicle: vehicle.id.clone(),
            network_mode: mode,
        });
        self.links[link].add_departing_vehicle(vehicle);
        self.active_links.activate(link);
    }

    /// Decides the moves of one node. See [QueueNode::decide].
    pub fn decide_node(&self, node: usize, now: u32) -> SimResult<NodeMoves> {
        self.nodes[node].decide(node, &self.links, &self.link_index, now, self.seed)
    }

    /// Moves vehicles across all active nodes. The moves are decided by the node mover, which may
    /// use several threads. The decisions are applied afterwards on this thread, in the order of the
    /// active nodes. If deciding fails, the network is left unchanged.
    #[instrument(level = "trace", skip(self, mover, events))]
    pub fn move_nodes(
        &mut self,
        now: u32,
        mover: &NodeMover,
        events: &mut EventsManager,
    ) -> SimResult<()> {
        let decisions = mover.decide(self, now)?;
        self.apply_node_moves(decisions, now, events);
        Ok(())
    }

    pub fn apply_node_moves(
        &mut self,
        decisions: Vec<NodeMoves>,
        now: u32,
        events: &mut EventsManager,
    ) {
        let mut emptied = false;
        for decision in decisions {
            for mv in decision.moves {
                let Some(mut vehicle) = self.links[mv.from_link].pop_buffer() else {
                    continue;
                };
                let driver = driver_id(&vehicle);
                events.publish_event(Event::LinkLeave {
                    time: now,
                    link: self.links[mv.from_link].id.clone(),
                    vehicle: vehicle.id.clone(),
                    driver: driver.clone(),
                });
                if let Some(agent) = vehicle.driver_mut() {
                    agent.notify_event(AgentEvent::LeftLink, now);
                }
                events.publish_event(Event::LinkEnter {
                    time: now,
                    link: self.links[mv.to_link].id.clone(),
                    vehicle: vehicle.id.clone(),
                    driver,
                });
                self.links[mv.to_link].accept_from_node(vehicle, now);
                self.active_links.activate(mv.to_link);
                emptied |= !self.links[mv.from_link].is_active();
            }
        }

        let links = &self.links;
        if emptied {
            self.active_links.retain(|l| links[l].is_active());
        }
        let nodes = &self.nodes;
        self.active_nodes.retain(|n| {
            nodes[n]
                .in_links
                .iter()
                .any(|l| links[*l].has_buffered_vehicles())
        });
    }

    /// Moves vehicles along all active links. Links without vehicles are deactivated; nodes in front
    /// of a non-empty buffer are activated. Returns the vehicles whose drivers arrived.
    #[instrument(level = "trace", skip(self, events))]
    pub fn move_links(&mut self, now: u32, events: &mut EventsManager) -> Vec<SimVehicle> {
        let mut arrived = Vec::new();
        for &index in &self.active_links.order {
            let link = &mut self.links[index];
            arrived.append(&mut link.move_link(now, events));
            if link.has_buffered_vehicles() {
                self.active_nodes.activate(link.to);
            }
        }

        let links = &self.links;
        self.active_links.retain(|l| links[l].is_active());
        arrived
    }

    /// Removes all vehicles from the network. Each driver gets a stuck event. Returns the number of
    /// drivers.
    pub fn clear_vehicles(&mut self, now: u32, events: &mut EventsManager) -> usize {
        let mut stuck = 0;
        for &index in &self.active_links.order {
            stuck += self.links[index].clear_vehicles(now, events);
        }
        self.active_links.clear();
        self.active_nodes.clear();
        stuck
    }

    pub fn apply_change_event(&mut self, change: &NetworkChangeEvent) {
        for id in &change.links {
            if let Some(index) = self.link_index(id) {
                self.links[index].apply_change(change, &self.params);
            }
        }
    }
}
