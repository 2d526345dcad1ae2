//! Read-only queries over an analyzed graph
//!
//! These are the views a renderer needs once aggregation is done: which
//! edges to draw, how to style them, and a serializable snapshot of the
//! whole graph.

use petgraph::stable_graph::EdgeIndex;
use serde::{Deserialize, Serialize};

use crate::graph::{Bounds, Edge, Graph, INITIAL_COST};

/// How a renderer should treat an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeClass {
    /// Part of a circular dependency
    Cycle,
    /// A longer indirect path exists between the endpoints
    Transitive,
    /// The only route between its endpoints
    Direct,
}

impl EdgeClass {
    pub fn of(edge: &Edge) -> Self {
        if edge.in_cycle() {
            EdgeClass::Cycle
        } else if edge.cost() > INITIAL_COST {
            EdgeClass::Transitive
        } else {
            EdgeClass::Direct
        }
    }
}

/// Edges kept when hiding connections whose cost exceeds `max_cost`
///
/// Cycle edges are always kept so circular dependencies stay visible.
pub fn visible_edges(graph: &Graph, max_cost: u64) -> Vec<EdgeIndex> {
    graph
        .edge_indices()
        .filter(|&e| {
            let edge = &graph[e];
            edge.in_cycle() || edge.cost() <= max_cost
        })
        .collect()
}

/// Edges handed to a layout algorithm as relationships: the complement of
/// [`visible_edges`]
pub fn layout_edges(graph: &Graph, max_cost: u64) -> Vec<EdgeIndex> {
    graph
        .edge_indices()
        .filter(|&e| {
            let edge = &graph[e];
            !edge.in_cycle() && edge.cost() > max_cost
        })
        .collect()
}

/// Minimum and maximum total degree over all nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DegreeStats {
    pub min: usize,
    pub max: usize,
}

/// Degree extremes of `graph`; both are zero for an empty graph
pub fn degree_stats(graph: &Graph) -> DegreeStats {
    let mut degrees = graph.node_indices().map(|n| graph.degree(n));
    let Some(first) = degrees.next() else {
        return DegreeStats::default();
    };
    degrees.fold(DegreeStats { min: first, max: first }, |stats, d| DegreeStats {
        min: stats.min.min(d),
        max: stats.max.max(d),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeSnapshot {
    pub source: String,
    pub target: String,
    pub cost: u64,
    pub in_cycle: bool,
    pub class: EdgeClass,
}

/// Serializable copy of a graph, in insertion order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub root: Option<String>,
    pub nodes: Vec<NodeSnapshot>,
    pub edges: Vec<EdgeSnapshot>,
}

impl GraphSnapshot {
    pub fn capture(graph: &Graph) -> Self {
        let nodes = graph
            .nodes()
            .map(|node| NodeSnapshot {
                name: node.name().to_string(),
                bounds: node.bounds(),
            })
            .collect();

        let edges = graph
            .edges()
            .map(|edge| EdgeSnapshot {
                source: graph.node_name(edge.source()).to_string(),
                target: graph.node_name(edge.target()).to_string(),
                cost: edge.cost(),
                in_cycle: edge.in_cycle(),
                class: EdgeClass::of(edge),
            })
            .collect();

        Self {
            root: graph.root().map(|r| graph.node_name(r).to_string()),
            nodes,
            edges,
        }
    }
}
