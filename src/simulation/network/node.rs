use ahash::HashMap;
use nohash_hasher::IntMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::simulation::agents::SimulationAgentLogic;
use crate::simulation::error::{SimResult, SimulationError};
use crate::simulation::id::Id;
use crate::simulation::network::link::QueueLink;
use crate::simulation::network::{Link, Node};

/// Intersection of a queue network. Links are referenced by their index in the queue network.
#[derive(Debug)]
pub struct QueueNode {
    pub id: Id<Node>,
    pub in_links: Vec<usize>,
    pub out_links: Vec<usize>,
}

/// The vehicles which cross a node in one step, in the order in which they cross.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeMoves {
    pub node: usize,
    pub moves: Vec<VehicleMove>,
}

/// A vehicle at the head of `from_link`'s buffer moves onto `to_link`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VehicleMove {
    pub from_link: usize,
    pub to_link: usize,
}

/// Out-link capacity which earlier moves of the same node and step already claimed.
#[derive(Default)]
struct Claimed {
    storage: f32,
    inflow: f32,
}

impl QueueNode {
    /// Decides which buffered vehicles cross the node at `now`. This only reads the network, so that
    /// nodes can be decided in parallel. The result is applied with
    /// [QueueNetwork::apply_node_moves](super::queue_network::QueueNetwork::apply_node_moves).
    ///
    /// In-links are visited in a random order weighted by their flow capacity. The random generator
    /// is seeded from `seed`, the node index and `now`, so the order does not depend on which thread
    /// decides the node.
    pub(super) fn decide(
        &self,
        index: usize,
        links: &[QueueLink],
        link_index: &HashMap<Id<Link>, usize>,
        now: u32,
        seed: u64,
    ) -> SimResult<NodeMoves> {
        let mut candidates: Vec<(usize, f32)> = self
            .in_links
            .iter()
            .filter(|l| links[**l].has_buffered_vehicles())
            .map(|l| (*l, links[*l].capacity_per_second()))
            .collect();

        let mut rng = StdRng::seed_from_u64(node_seed(seed, index, now));
        let mut claimed: IntMap<usize, Claimed> = IntMap::default();
        let mut moves = Vec::new();

        while !candidates.is_empty() {
            let pos = select_weighted(&candidates, &mut rng);
            let (in_link, _) = candidates.remove(pos);
            self.decide_in_link(index, in_link, links, link_index, now, &mut claimed, &mut moves)?;
        }

        Ok(NodeMoves { node: index, moves })
    }

    /// Takes vehicles from the buffer of an in-link in FIFO order, while the in-link has outflow
    /// capacity left. The first vehicle which does not fit onto its next link blocks all vehicles
    /// behind it. A vehicle which is stuck in front of the node moves regardless of the out-link.
    #[allow(clippy::too_many_arguments)]
    fn decide_in_link(
        &self,
        index: usize,
        in_link: usize,
        links: &[QueueLink],
        link_index: &HashMap<Id<Link>, usize>,
        now: u32,
        claimed: &mut IntMap<usize, Claimed>,
        moves: &mut Vec<VehicleMove>,
    ) -> SimResult<()> {
        let link = &links[in_link];
        let mut outflow = link.outflow_value();
        let mut head_stuck = link.is_head_stuck(now);

        for vehicle in link.buffer() {
            if outflow <= 1e-10 {
                break;
            }

            let next = vehicle.driver().and_then(|d| d.peek_next_link_id());
            let out_link = next
                .and_then(|id| link_index.get(id))
                .copied()
                .filter(|out| links[*out].from == index)
                .ok_or_else(|| SimulationError::RouteInconsistent {
                    vehicle: vehicle.id.to_string(),
                    link: link.id.to_string(),
                    next: next.map_or("none".to_string(), |id| id.to_string()),
                })?;

            let claim = claimed.entry(out_link).or_default();
            let target = &links[out_link];
            let fits = target.is_storage_available_with(claim.storage)
                && target.inflow_value_at(now) - claim.inflow > 1e-10;
            if !fits && !head_stuck {
                break;
            }

            claim.storage += vehicle.pce;
            claim.inflow += vehicle.pce;
            outflow -= vehicle.pce;
            head_stuck = false;
            moves.push(VehicleMove {
                from_link: in_link,
                to_link: out_link,
            });
        }
        Ok(())
    }
}

fn node_seed(seed: u64, node: usize, now: u32) -> u64 {
    seed.wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (node as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9)
        ^ (now as u64).wrapping_mul(0x94D0_49BB_1331_11EB)
}

/// Draws the position of a candidate with a probability proportional to its weight.
fn select_weighted(candidates: &[(usize, f32)], rng: &mut StdRng) -> usize {
    let sum: f32 = candidates.iter().map(|(_, w)| w).sum();
    if sum <= 0. {
        return 0;
    }
    let draw = rng.random::<f32>() * sum;
    let mut acc = 0.;
    for (pos, (_, weight)) in candidates.iter().enumerate() {
        acc += weight;
        if draw < acc {
            return pos;
        }
    }
    candidates.len() - 1
}
