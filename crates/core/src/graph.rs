//! Graph data structures for project dependency analysis
//!
//! Uses `petgraph::StableGraph` so node and edge indices stay valid for the
//! whole analysis session. Nodes and edges are only ever added (during the
//! build phase); the aggregation phase mutates edge `cost` and `in_cycle`
//! in place through atomics while the graph itself is shared read-only
//! between worker threads.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};

/// Cost every edge starts with
pub const INITIAL_COST: u64 = 1;

/// Position and size assigned by an external layout
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A node in the dependency graph representing one project
///
/// Identity is the (case-sensitive) project name.
#[derive(Debug)]
pub struct Node {
    name: String,
    /// Layout slot owned by the renderer; never read by the analysis
    bounds: RwLock<Option<Bounds>>,
}

impl Node {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bounds: RwLock::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last bounds written by the renderer, if any
    pub fn bounds(&self) -> Option<Bounds> {
        *self.bounds.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the renderer's layout for this node
    ///
    /// Must only be called once cost aggregation has completed.
    pub fn set_bounds(&self, bounds: Bounds) {
        *self.bounds.write().unwrap_or_else(PoisonError::into_inner) = Some(bounds);
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// A directed "depends on" relation between two projects
///
/// `cost` only ever grows and `in_cycle` only ever goes from `false` to
/// `true`; both are updated atomically so concurrent aggregation tasks can
/// share one graph without locks.
#[derive(Debug)]
pub struct Edge {
    source: NodeIndex,
    target: NodeIndex,
    cost: AtomicU64,
    in_cycle: AtomicBool,
}

impl Edge {
    fn new(source: NodeIndex, target: NodeIndex) -> Self {
        Self {
            source,
            target,
            cost: AtomicU64::new(INITIAL_COST),
            in_cycle: AtomicBool::new(false),
        }
    }

    pub fn source(&self) -> NodeIndex {
        self.source
    }

    pub fn target(&self) -> NodeIndex {
        self.target
    }

    /// Current (live) cost
    pub fn cost(&self) -> u64 {
        self.cost.load(Ordering::SeqCst)
    }

    /// Raise the cost to `cost` if it is higher; returns the previous value
    pub fn raise_cost(&self, cost: u64) -> u64 {
        self.cost.fetch_max(cost, Ordering::SeqCst)
    }

    pub fn in_cycle(&self) -> bool {
        self.in_cycle.load(Ordering::SeqCst)
    }

    /// Flag the edge as part of a cycle; returns `true` if it was not yet flagged
    pub fn mark_in_cycle(&self) -> bool {
        !self.in_cycle.swap(true, Ordering::SeqCst)
    }
}

/// The dependency graph
///
/// Nodes and edges are deduplicated: asking for an existing node name or an
/// existing `(source, target)` pair returns the index created the first time.
/// Iteration follows insertion order.
#[derive(Debug, Default)]
pub struct Graph {
    /// The underlying stable graph (private to enforce encapsulation)
    inner: StableGraph<Node, Edge>,
    node_ids: HashMap<String, NodeIndex>,
    edge_ids: HashMap<(NodeIndex, NodeIndex), EdgeIndex>,
    root: Option<NodeIndex>,
}

impl Graph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the node called `name`
    pub fn add_node(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.node_ids.get(name) {
            return idx;
        }
        let idx = self.inner.add_node(Node::new(name));
        self.node_ids.insert(name.to_string(), idx);
        idx
    }

    /// Get or create the edge `source -> target`
    ///
    /// Also registers the edge in the outgoing set of `source` and the
    /// incoming set of `target`.
    pub fn connect(&mut self, source: NodeIndex, target: NodeIndex) -> EdgeIndex {
        if let Some(&idx) = self.edge_ids.get(&(source, target)) {
            return idx;
        }
        let idx = self.inner.add_edge(source, target, Edge::new(source, target));
        self.edge_ids.insert((source, target), idx);
        idx
    }

    /// Get or create the edge between two projects by name, creating the
    /// nodes as needed
    pub fn add_edge(&mut self, source: &str, target: &str) -> EdgeIndex {
        let source = self.add_node(source);
        let target = self.add_node(target);
        self.connect(source, target)
    }

    /// Mark `node` as the project the graph was built from
    pub fn set_root(&mut self, node: NodeIndex) {
        self.root = Some(node);
    }

    pub fn root(&self) -> Option<NodeIndex> {
        self.root
    }

    /// Get a node by index
    pub fn node_weight(&self, index: NodeIndex) -> Option<&Node> {
        self.inner.node_weight(index)
    }

    /// Get an edge by index
    pub fn edge_weight(&self, index: EdgeIndex) -> Option<&Edge> {
        self.inner.edge_weight(index)
    }

    /// Get the number of nodes in the graph
    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    /// Get the number of edges in the graph
    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// Iterate over all nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.inner.node_weights()
    }

    /// Iterate over all edges in insertion order
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.inner.edge_weights()
    }

    /// Get all node indices in insertion order
    pub fn node_indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.inner.node_indices()
    }

    /// Get all edge indices in insertion order
    pub fn edge_indices(&self) -> impl Iterator<Item = EdgeIndex> + '_ {
        self.inner.edge_indices()
    }

    /// Find a node by project name in O(1)
    pub fn find_node(&self, name: &str) -> Option<NodeIndex> {
        self.node_ids.get(name).copied()
    }

    /// Find the edge `source -> target` in O(1)
    pub fn find_edge(&self, source: NodeIndex, target: NodeIndex) -> Option<EdgeIndex> {
        self.edge_ids.get(&(source, target)).copied()
    }

    /// Edges leaving `node`
    pub fn outgoing(&self, node: NodeIndex) -> impl Iterator<Item = EdgeIndex> + '_ {
        self.inner
            .edges_directed(node, Direction::Outgoing)
            .map(|e| e.id())
    }

    /// Edges entering `node`
    pub fn incoming(&self, node: NodeIndex) -> impl Iterator<Item = EdgeIndex> + '_ {
        self.inner
            .edges_directed(node, Direction::Incoming)
            .map(|e| e.id())
    }

    /// Total degree (incoming + outgoing) of `node`
    pub fn degree(&self, node: NodeIndex) -> usize {
        self.outgoing(node).count() + self.incoming(node).count()
    }

    /// Name of the node at `index`, or an empty string for foreign indices
    pub fn node_name(&self, index: NodeIndex) -> &str {
        self.inner.node_weight(index).map_or("", Node::name)
    }

    /// Render an edge as `source->target` for logs and error messages
    pub fn describe_edge(&self, index: EdgeIndex) -> String {
        match self.inner.edge_weight(index) {
            Some(edge) => format!(
                "{}->{}",
                self.node_name(edge.source),
                self.node_name(edge.target)
            ),
            None => format!("#{}", index.index()),
        }
    }

    /// Render a path as `[a->b, b->c]`
    pub fn describe_path(&self, path: &[EdgeIndex]) -> String {
        let parts: Vec<String> = path.iter().map(|&e| self.describe_edge(e)).collect();
        format!("[{}]", parts.join(", "))
    }
}

/// Panics if `index` does not belong to this graph
impl std::ops::Index<NodeIndex> for Graph {
    type Output = Node;

    fn index(&self, index: NodeIndex) -> &Node {
        &self.inner[index]
    }
}

/// Panics if `index` does not belong to this graph
impl std::ops::Index<EdgeIndex> for Graph {
    type Output = Edge;

    fn index(&self, index: EdgeIndex) -> &Edge {
        &self.inner[index]
    }
}
