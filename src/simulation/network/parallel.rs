use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{info, instrument};

use crate::simulation::error::{SimResult, SimulationError};
use crate::simulation::network::node::NodeMoves;
use crate::simulation::network::queue_network::QueueNetwork;

/// Decides the node moves of a step. Deciding only reads the network. The decisions are applied by
/// the simulation thread afterwards, so the outcome is the same for every thread count.
#[derive(Debug)]
pub enum NodeMover {
    Serial,
    Parallel(ParallelNodeMover),
}

impl NodeMover {
    pub fn new(threads: u32) -> SimResult<Self> {
        if threads <= 1 {
            return Ok(NodeMover::Serial);
        }
        Ok(NodeMover::Parallel(ParallelNodeMover::new(threads as usize)?))
    }

    pub fn decide(&self, network: &QueueNetwork, now: u32) -> SimResult<Vec<NodeMoves>> {
        match self {
            NodeMover::Serial => decide_nodes(network, network.active_nodes(), now),
            NodeMover::Parallel(mover) => mover.decide(network, now),
        }
    }
}

/// Owns a fixed pool of workers. Every step, the active nodes are split into one contiguous chunk
/// per worker.
#[derive(Debug)]
pub struct ParallelNodeMover {
    pool: ThreadPool,
    workers: usize,
}

impl ParallelNodeMover {
    pub fn new(workers: usize) -> SimResult<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("node-mover-{i}"))
            .build()
            .map_err(|e| SimulationError::WorkerFailed(e.to_string()))?;
        info!("Moving nodes with {workers} worker threads.");
        Ok(ParallelNodeMover { pool, workers })
    }

    /// Returns the decisions in the order of the active nodes. If one worker fails, the first error
    /// in node order is returned and no decision is handed out. A panicking worker is reported as
    /// [SimulationError::WorkerFailed].
    #[instrument(level = "trace", skip(self, network))]
    pub fn decide(&self, network: &QueueNetwork, now: u32) -> SimResult<Vec<NodeMoves>> {
        self.decide_chunked(network, network.active_nodes(), now)
    }

    fn decide_chunked(
        &self,
        network: &QueueNetwork,
        nodes: &[usize],
        now: u32,
    ) -> SimResult<Vec<NodeMoves>> {
        if nodes.is_empty() {
            return Ok(Vec::new());
        }
        let chunk_size = nodes.len().div_ceil(self.workers);

        let results: Vec<SimResult<Vec<NodeMoves>>> = self.pool.install(|| {
            nodes
                .par_chunks(chunk_size)
                .map(|chunk| {
                    panic::catch_unwind(AssertUnwindSafe(|| decide_nodes(network, chunk, now)))
                        .unwrap_or_else(|payload| {
                            Err(SimulationError::WorkerFailed(panic_message(payload)))
                        })
                })
                .collect()
        });

        let mut decisions = Vec::with_capacity(nodes.len());
        for result in results {
            decisions.extend(result?);
        }
        Ok(decisions)
    }
}

fn decide_nodes(network: &QueueNetwork, nodes: &[usize], now: u32) -> SimResult<Vec<NodeMoves>> {
    nodes
        .iter()
        .map(|node| network.decide_node(*node, now))
        .collect()
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::simulation::config;
    use crate::simulation::error::SimulationError;
    use crate::simulation::events::EventsManager;
    use crate::simulation::network::parallel::{NodeMover, ParallelNodeMover, panic_message};
    use crate::simulation::network::queue_network::QueueNetwork;
    use crate::test_utils::{create_driving_vehicle, create_grid_network};

    fn run(mover: &NodeMover) -> Vec<String> {
        let network = create_grid_network(5);
        let mut network = QueueNetwork::from_network(&network, &config::Simulation::default());
        let mut events = EventsManager::new();
        let recorded = Rc::new(RefCell::new(Vec::new()));
        let captured = recorded.clone();
        events.on_any(move |e| captured.borrow_mut().push(e.to_string()));

        // every row drives to the last column and then down, so that rows merge at its nodes
        for row in 0..5 {
            let mut route: Vec<String> = (0..3).map(|c| format!("h{row}_{c}")).collect();
            route.extend((row..4).map(|r| format!("v3_{r}")));
            let route: Vec<&str> = route.iter().map(|s| s.as_str()).collect();
            let link = network.link_index(&route[0].into()).unwrap();
            for i in 0..5 {
                let vehicle = create_driving_vehicle(&format!("{row}_{i}"), 1., &route);
                network.add_departing_vehicle(vehicle, link, 0, &mut events);
            }
        }

        for now in 0..300 {
            network.move_nodes(now, mover, &mut events).unwrap();
            network.move_links(now, &mut events);
        }
        assert_eq!(0, network.vehicle_count());
        recorded.take()
    }

    #[test]
    fn parallel_equals_serial() {
        let serial = run(&NodeMover::Serial);
        let parallel = run(&NodeMover::new(3).unwrap());
        assert!(!serial.is_empty());
        assert_eq!(serial, parallel);
    }

    #[test]
    fn one_thread_is_serial() {
        assert!(matches!(NodeMover::new(1), Ok(NodeMover::Serial)));
        assert!(matches!(NodeMover::new(0), Ok(NodeMover::Serial)));
    }

    #[test]
    fn worker_error_is_returned() {
        let network = create_grid_network(2);
        let mut network = QueueNetwork::from_network(&network, &config::Simulation::default());
        let mut events = EventsManager::new();
        // h0_0 ends at node 0_1, v0_0 starts at node 0_0
        let vehicle = create_driving_vehicle("1", 1., &["h0_0", "v0_0"]);
        let link = network.link_index(&"h0_0".into()).unwrap();
        network.add_departing_vehicle(vehicle, link, 0, &mut events);

        let mover = NodeMover::new(2).unwrap();
        let mut result = Ok(());
        for now in 0..50 {
            result = network.move_nodes(now, &mover, &mut events);
            if result.is_err() {
                break;
            }
            network.move_links(now, &mut events);
        }
        assert!(matches!(
            result,
            Err(SimulationError::RouteInconsistent { .. })
        ));
        assert_eq!(1, network.vehicle_count());
    }

    #[test]
    fn panic_messages() {
        assert_eq!("boom", panic_message(Box::new("boom")));
        assert_eq!("bang", panic_message(Box::new("bang".to_string())));
        assert_eq!("worker panicked", panic_message(Box::new(7)));
    }

    #[test]
    fn worker_panic_is_reported() {
        let network = create_grid_network(2);
        let network = QueueNetwork::from_network(&network, &config::Simulation::default());
        let mover = ParallelNodeMover::new(2).unwrap();

        // the second chunk holds a node which does not exist and panics while indexing
        let result = mover.decide_chunked(&network, &[0, usize::MAX], 0);
        match result {
            Err(SimulationError::WorkerFailed(msg)) => assert!(msg.contains("out of bounds"), "{msg}"),
            other => panic!("expected a failed worker, got {other:?}"),
        }

        // the pool survives the panic
        assert!(mover.decide(&network, 0).unwrap().is_empty());
    }
}
