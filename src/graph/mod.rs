//! The compiled, immutable runtime model of a flow.
//!
//! A [`Graph`] is produced by the [`Compiler`](crate::compiler::Compiler) and never changes
//! afterwards. Nodes are addressed by their position ([`NodeIndex`]) inside the graph; a
//! [`NodeRef`] pairs that index with the owning graph so tokens can point into nested
//! sub-graphs.

mod port;

pub use port::*;

use crate::node::NodeLogic;
use ahash::AHashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub type NodeIndex = usize;

static NEXT_GRAPH_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a compiled graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphId(u64);

impl GraphId {
    fn next() -> Self {
        GraphId(NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Identity of a node across every graph in a compiled program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeKey {
    pub graph: GraphId,
    pub node: NodeIndex,
}

/// Identity of a single output port value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutputKey {
    pub node: NodeKey,
    pub port: String,
}

impl OutputKey {
    pub fn new(node: NodeKey, port: &str) -> Self {
        Self {
            node,
            port: port.to_string(),
        }
    }
}

/// How the executor treats a node, independent of what its logic does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NodeRole {
    #[default]
    Regular,
    /// Calls a nested graph; control continues at the nested graph's entry node.
    SubgraphCall,
    /// The designated entry of a graph used as a sub-flow.
    SubgraphEntry,
    /// Returns control to the calling node of the enclosing graph.
    SubgraphExit,
}

/// A node in a compiled graph.
pub struct Node {
    pub id: String,
    pub node_type: String,
    pub label: Option<String>,
    pub role: NodeRole,
    pub ports: Vec<PortSpec>,
    /// The graph invoked by a `SubgraphCall` node.
    pub subgraph: Option<Arc<Graph>>,
    pub(crate) logic: Arc<dyn NodeLogic>,
}

impl Node {
    pub fn port(&self, name: &str, direction: PortDirection) -> Option<&PortSpec> {
        self.ports
            .iter()
            .find(|p| p.name == name && p.direction == direction)
    }

    pub fn data_inputs(&self) -> impl Iterator<Item = &PortSpec> {
        self.ports.iter().filter(|p| p.is_data() && p.is_input())
    }

    pub fn data_outputs(&self) -> impl Iterator<Item = &PortSpec> {
        self.ports.iter().filter(|p| p.is_data() && p.is_output())
    }

    pub fn execution_inputs(&self) -> impl Iterator<Item = &PortSpec> {
        self.ports.iter().filter(|p| p.is_execution() && p.is_input())
    }

    pub fn execution_outputs(&self) -> impl Iterator<Item = &PortSpec> {
        self.ports.iter().filter(|p| p.is_execution() && p.is_output())
    }

    /// A node without execution ports is a pure data node, evaluated on demand.
    pub fn is_data_node(&self) -> bool {
        !self.ports.iter().any(PortSpec::is_execution)
    }

    /// Human-readable name used in logs and traces.
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("node_type", &self.node_type)
            .field("role", &self.role)
            .field("ports", &self.ports.len())
            .field("subgraph", &self.subgraph.as_ref().map(|g| g.name()))
            .finish()
    }
}

/// A directed edge from an output port to an input port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub from: NodeIndex,
    pub from_port: String,
    pub to: NodeIndex,
    pub to_port: String,
}

/// An immutable, validated node graph.
#[derive(Debug)]
pub struct Graph {
    id: GraphId,
    name: String,
    nodes: Vec<Node>,
    connections: Vec<Connection>,
    by_id: AHashMap<String, NodeIndex>,
    outgoing: AHashMap<(NodeIndex, String), Vec<usize>>,
    incoming: AHashMap<(NodeIndex, String), Vec<usize>>,
}

impl Graph {
    pub(crate) fn new(name: String, nodes: Vec<Node>, connections: Vec<Connection>) -> Self {
        let by_id = nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (node.id.clone(), index))
            .collect();

        let mut outgoing: AHashMap<(NodeIndex, String), Vec<usize>> = AHashMap::new();
        let mut incoming: AHashMap<(NodeIndex, String), Vec<usize>> = AHashMap::new();
        for (index, conn) in connections.iter().enumerate() {
            outgoing
                .entry((conn.from, conn.from_port.clone()))
                .or_default()
                .push(index);
            incoming
                .entry((conn.to, conn.to_port.clone()))
                .or_default()
                .push(index);
        }

        Self {
            id: GraphId::next(),
            name,
            nodes,
            connections,
            by_id,
            outgoing,
            incoming,
        }
    }

    pub fn id(&self) -> GraphId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// # Panics
    ///
    /// Panics if `index` does not belong to this graph.
    pub fn node(&self, index: NodeIndex) -> &Node {
        &self.nodes[index]
    }

    pub fn node_by_id(&self, id: &str) -> Option<NodeIndex> {
        self.by_id.get(id).copied()
    }

    /// Connections leaving the given output port, in authoring order.
    pub fn outgoing<'a>(
        &'a self,
        node: NodeIndex,
        port: &str,
    ) -> impl Iterator<Item = &'a Connection> + use<'a> {
        self.lookup(&self.outgoing, node, port)
    }

    /// Connections arriving at the given input port, in authoring order.
    pub fn incoming<'a>(
        &'a self,
        node: NodeIndex,
        port: &str,
    ) -> impl Iterator<Item = &'a Connection> + use<'a> {
        self.lookup(&self.incoming, node, port)
    }

    fn lookup<'a>(
        &'a self,
        index: &'a AHashMap<(NodeIndex, String), Vec<usize>>,
        node: NodeIndex,
        port: &str,
    ) -> impl Iterator<Item = &'a Connection> + use<'a> {
        index
            .get(&(node, port.to_string()))
            .into_iter()
            .flatten()
            .map(|&i| &self.connections[i])
    }

    /// Nodes that expose an execution output but have no connected execution input.
    pub fn entry_nodes(&self) -> Vec<NodeIndex> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(index, node)| {
                node.execution_outputs().next().is_some()
                    && node
                        .execution_inputs()
                        .all(|port| self.incoming(*index, &port.name).next().is_none())
            })
            .map(|(index, _)| index)
            .collect()
    }

    /// The designated entry node used when this graph is called as a sub-flow.
    pub fn subgraph_entry(&self) -> Option<NodeIndex> {
        self.nodes
            .iter()
            .position(|node| node.role == NodeRole::SubgraphEntry)
    }

    pub fn subgraph_exits(&self) -> impl Iterator<Item = &Node> {
        self.nodes
            .iter()
            .filter(|node| node.role == NodeRole::SubgraphExit)
    }
}

/// A node inside a specific graph, cheap to clone.
#[derive(Clone)]
pub struct NodeRef {
    graph: Arc<Graph>,
    index: NodeIndex,
}

impl NodeRef {
    pub fn new(graph: Arc<Graph>, index: NodeIndex) -> Self {
        Self { graph, index }
    }

    pub fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }

    pub fn index(&self) -> NodeIndex {
        self.index
    }

    pub fn node(&self) -> &Node {
        self.graph.node(self.index)
    }

    pub fn key(&self) -> NodeKey {
        NodeKey {
            graph: self.graph.id(),
            node: self.index,
        }
    }

    pub fn same_graph(&self, other: &NodeRef) -> bool {
        Arc::ptr_eq(&self.graph, &other.graph)
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        self.same_graph(other) && self.index == other.index
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.graph.name(), self.node().id)
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.graph.name(), self.node().display_name())
    }
}
