pub mod change_events;
pub mod flow_cap;
pub mod link;
pub mod node;
pub mod parallel;
pub mod queue_network;
pub mod storage_cap;
pub mod stuck_timer;

use ahash::HashMap;
use derive_builder::Builder;

use crate::simulation::error::{ConfigError, ConfigResult};
use crate::simulation::id::Id;

/// The network as it is handed to the simulation. It is only read while the simulation is prepared
/// and by the travel time calculator. The mutable state of links and nodes during a run lives in
/// [queue_network::QueueNetwork].
#[derive(Debug)]
pub struct Network {
    nodes: Vec<Node>,
    links: Vec<Link>,
    node_index: HashMap<Id<Node>, usize>,
    link_index: HashMap<Id<Link>, usize>,
    pub effective_cell_size: f32,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: Id<Node>,
    pub x: f64,
    pub y: f64,
    pub in_links: Vec<Id<Link>>,
    pub out_links: Vec<Id<Link>>,
}

#[derive(Debug, Clone, Builder)]
pub struct Link {
    #[builder(setter(into))]
    pub id: Id<Link>,
    #[builder(setter(into))]
    pub from: Id<Node>,
    #[builder(setter(into))]
    pub to: Id<Node>,
    #[builder(default = "1.")]
    pub length: f64,
    /// flow capacity in vehicles per hour
    #[builder(default = "3600.")]
    pub capacity: f32,
    /// free speed in m/s
    #[builder(default = "1.")]
    pub freespeed: f32,
    #[builder(default = "1.")]
    pub permlanes: f32,
    /// Explicit storage capacity in vehicles. If not set, it is derived from length and lanes.
    #[builder(default, setter(strip_option))]
    pub storage_capacity: Option<f32>,
}

impl Default for Network {
    fn default() -> Self {
        Network::new()
    }
}

impl Network {
    pub fn new() -> Self {
        Network {
            nodes: Vec::new(),
            links: Vec::new(),
            node_index: HashMap::default(),
            link_index: HashMap::default(),
            effective_cell_size: 7.5,
        }
    }

    pub fn add_node(&mut self, node: Node) {
        // adding a node twice keeps the first one, so that already wired links stay valid.
        if self.node_index.contains_key(&node.id) {
            return;
        }
        self.node_index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
    }

    /// Adds a link and wires it up with its from and to nodes. Both nodes must be part of the network
    /// already.
    pub fn add_link(&mut self, link: Link) -> ConfigResult<()> {
        if self.link_index.contains_key(&link.id) {
            return Err(ConfigError::DuplicateLink(link.id.to_string()));
        }
        let from = self.node_index_or_err(&link.from)?;
        let to = self.node_index_or_err(&link.to)?;

        self.nodes[from].out_links.push(link.id.clone());
        self.nodes[to].in_links.push(link.id.clone());
        self.link_index.insert(link.id.clone(), self.links.len());
        self.links.push(link);
        Ok(())
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn get_link(&self, id: &Id<Link>) -> Option<&Link> {
        self.link_index.get(id).map(|i| &self.links[*i])
    }

    pub fn get_node(&self, id: &Id<Node>) -> Option<&Node> {
        self.node_index.get(id).map(|i| &self.nodes[*i])
    }

    pub fn link_index(&self, id: &Id<Link>) -> Option<usize> {
        self.link_index.get(id).copied()
    }

    pub fn node_index(&self, id: &Id<Node>) -> Option<usize> {
        self.node_index.get(id).copied()
    }

    fn node_index_or_err(&self, id: &Id<Node>) -> ConfigResult<usize> {
        self.node_index(id)
            .ok_or_else(|| ConfigError::UnknownNode(id.to_string()))
    }
}

impl Node {
    pub fn new(id: Id<Node>, x: f64, y: f64) -> Self {
        Node {
            id,
            x,
            y,
            in_links: Vec::new(),
            out_links: Vec::new(),
        }
    }
}

impl Link {
    /// Free speed travel time in seconds as used by the travel time calculator.
    pub fn free_speed_travel_time(&self) -> f64 {
        self.length / self.freespeed as f64
    }
}

#[cfg(test)]
mod tests {
    use super::{LinkBuilder, Network, Node};
    use crate::simulation::error::ConfigError;
    use crate::simulation::id::Id;

    fn two_nodes() -> Network {
        let mut network = Network::new();
        network.add_node(Node::new(Id::create("n1"), 0., 0.));
        network.add_node(Node::new(Id::create("n2"), 100., 0.));
        network
    }

    #[test]
    fn add_link_wires_nodes() {
        let mut network = two_nodes();
        let link = LinkBuilder::default()
            .id("l1")
            .from("n1")
            .to("n2")
            .length(100.)
            .build()
            .unwrap();
        network.add_link(link).unwrap();

        let from = network.get_node(&Id::create("n1")).unwrap();
        assert_eq!(vec![Id::create("l1")], from.out_links);
        let to = network.get_node(&Id::create("n2")).unwrap();
        assert_eq!(vec![Id::create("l1")], to.in_links);
        assert_eq!(Some(0), network.link_index(&Id::create("l1")));
    }

    #[test]
    fn builder_defaults() {
        let link = LinkBuilder::default()
            .id("l1")
            .from("n1")
            .to("n2")
            .build()
            .unwrap();
        assert_eq!(1., link.length);
        assert_eq!(3600., link.capacity);
        assert_eq!(1., link.freespeed);
        assert_eq!(1., link.permlanes);
        assert_eq!(None, link.storage_capacity);
    }

    #[test]
    fn unknown_node() {
        let mut network = two_nodes();
        let link = LinkBuilder::default()
            .id("l1")
            .from("n1")
            .to("n3")
            .build()
            .unwrap();
        let result = network.add_link(link);
        assert!(matches!(result, Err(ConfigError::UnknownNode(id)) if id == "n3"));
    }

    #[test]
    fn duplicate_link() {
        let mut network = two_nodes();
        let link = LinkBuilder::default()
            .id("l1")
            .from("n1")
            .to("n2")
            .build()
            .unwrap();
        network.add_link(link.clone()).unwrap();
        assert!(matches!(
            network.add_link(link),
            Err(ConfigError::DuplicateLink(_))
        ));
    }
}
