//! Enumeration of every simple path between two nodes
//!
//! The search is a depth-first walk over *edges* driven by an explicit
//! [`FrameStack`](crate::stack::FrameStack). A [`Frame`] stands in for one recursive call: the node
//! reached, the edges taken to get there, and the nodes visited on the way
//! (used only for cycle membership tests). Frames own their path buffers;
//! branching clones the prefix so siblings never share state.
//!
//! # Cycle detection
//!
//! Cycle detection is part of the walk. When an edge leads back to the
//! origin, back to the node being expanded, or to any node already on the
//! current path, the offending edges are flagged with
//! [`Edge::mark_in_cycle`](crate::graph::Edge::mark_in_cycle) and the branch
//! is pruned. Flags live on the shared graph: every later search (including
//! concurrent ones) skips flagged edges, so results depend on what other
//! searches found first.
//!
//! A path that reaches the destination is recorded and not extended as a
//! result. Its tail is still walked as a *probe*: probe frames never record
//! paths, they only look for the way back to the origin. Without them a
//! cycle running through both endpoints (`a -> b -> c -> a` searched from
//! `a` to `b`) would never be seen, because every branch stops at the
//! destination before it can close the loop.

use petgraph::stable_graph::{EdgeIndex, NodeIndex};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::AnalysisError;
use crate::graph::Graph;
use crate::progress::Progress;
use crate::stack::StackKind;

/// Ordered edges from a source node to a destination node
pub type EdgePath = Vec<EdgeIndex>;

/// Explicit-stack replacement for one recursive call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Node reached by `path`
    pub node: NodeIndex,
    /// Edges taken from the origin to `node`
    pub path: EdgePath,
    /// Nodes of `path` in order, origin first; empty for the initial frame
    pub visited: Vec<NodeIndex>,
    /// Set once the path went through the destination
    #[serde(default)]
    pub probe: bool,
}

impl Frame {
    fn origin(node: NodeIndex) -> Self {
        Self {
            node,
            path: Vec::new(),
            visited: Vec::new(),
            probe: false,
        }
    }
}

/// Finds every simple path between two nodes of a [`Graph`]
pub struct PathEnumerator<'g> {
    graph: &'g Graph,
    stack: StackKind,
}

impl<'g> PathEnumerator<'g> {
    /// Enumerator keeping its frames in memory
    pub fn new(graph: &'g Graph) -> Self {
        Self::with_stack(graph, StackKind::Memory)
    }

    pub fn with_stack(graph: &'g Graph, stack: StackKind) -> Self {
        Self { graph, stack }
    }

    /// All simple paths from `src` to `dst` avoiding cycle-flagged edges
    ///
    /// Returns an empty list when `src == dst`. Every returned path starts
    /// at `src`, ends at `dst`, visits no node twice and had no flagged
    /// edge when it was recorded. Branches whose prefix gets flagged while
    /// they wait on the stack are dropped.
    ///
    /// # Errors
    /// - [`AnalysisError::Cancelled`], polled before every edge expansion
    /// - [`AnalysisError::Stack`] when a frame cannot be stored or restored
    pub fn enumerate(
        &self,
        src: NodeIndex,
        dst: NodeIndex,
        progress: &Progress,
    ) -> Result<Vec<EdgePath>, AnalysisError> {
        let mut found = Vec::new();
        if src == dst {
            return Ok(found);
        }

        let graph = self.graph;
        let mut stack = self.stack.open::<Frame>()?;
        stack.push(Frame::origin(src))?;

        while !stack.is_empty() {
            let frame = stack.pop()?;
            if self.touches_cycle(&frame.path) {
                continue;
            }

            for edge_index in graph.outgoing(frame.node) {
                progress.check()?;

                let edge = &graph[edge_index];
                if edge.in_cycle() {
                    continue;
                }

                let target = edge.target();
                let mut path = frame.path.clone();
                path.push(edge_index);

                if target == src || target == frame.node {
                    self.mark_cycle(&path, &path);
                    continue;
                }

                let mut visited = frame.visited.clone();
                if visited.is_empty() {
                    visited.push(edge.source());
                    visited.push(target);
                } else if let Some(start) = visited.iter().position(|&n| n == target) {
                    // visited[i] is where path[i] starts, so the loop is path[start..]
                    self.mark_cycle(&path[start..], &path);
                    continue;
                } else {
                    visited.push(target);
                }

                if target == dst {
                    if self.touches_cycle(&path) {
                        continue;
                    }
                    found.push(path.clone());
                    stack.push(Frame {
                        node: target,
                        path,
                        visited,
                        probe: true,
                    })?;
                    continue;
                }

                stack.push(Frame {
                    node: target,
                    path,
                    visited,
                    probe: frame.probe,
                })?;
            }
        }

        Ok(found)
    }

    /// [`PathEnumerator::enumerate`] between two projects given by name
    ///
    /// # Errors
    /// [`AnalysisError::UnknownNode`] when either name is not in the graph,
    /// otherwise as [`PathEnumerator::enumerate`].
    pub fn enumerate_named(
        &self,
        src: &str,
        dst: &str,
        progress: &Progress,
    ) -> Result<Vec<EdgePath>, AnalysisError> {
        let lookup = |name: &str| {
            self.graph
                .find_node(name)
                .ok_or_else(|| AnalysisError::UnknownNode(name.to_string()))
        };
        self.enumerate(lookup(src)?, lookup(dst)?, progress)
    }

    /// Whether any edge of `path` has been flagged since it was extended
    fn touches_cycle(&self, path: &[EdgeIndex]) -> bool {
        path.iter().any(|&e| self.graph[e].in_cycle())
    }

    fn mark_cycle(&self, cycle: &[EdgeIndex], path: &[EdgeIndex]) {
        for &edge in cycle {
            self.graph[edge].mark_in_cycle();
        }
        warn!(
            cycle = %self.graph.describe_path(cycle),
            path = %self.graph.describe_path(path),
            "cycle found"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(graph: &Graph, paths: &[EdgePath]) -> Vec<String> {
        let mut out: Vec<String> = paths.iter().map(|p| graph.describe_path(p)).collect();
        out.sort();
        out
    }

    fn node(graph: &Graph, name: &str) -> NodeIndex {
        graph.find_node(name).unwrap()
    }

    #[test]
    fn test_same_endpoints_yield_nothing() {
        let mut graph = Graph::new();
        graph.add_edge("a", "b");
        let a = node(&graph, "a");

        let paths = PathEnumerator::new(&graph)
            .enumerate(a, a, &Progress::new())
            .unwrap();
        assert!(paths.is_empty());
    }

    #[test]
    fn test_direct_and_indirect_paths() {
        let mut graph = Graph::new();
        graph.add_edge("a", "b");
        graph.add_edge("b", "c");
        graph.add_edge("a", "c");

        let paths = PathEnumerator::new(&graph)
            .enumerate(node(&graph, "a"), node(&graph, "c"), &Progress::new())
            .unwrap();

        assert_eq!(names(&graph, &paths), vec!["[a->b, b->c]", "[a->c]"]);
    }

    #[test]
    fn test_enumerate_by_name() {
        let mut graph = Graph::new();
        graph.add_edge("a", "b");
        graph.add_edge("b", "c");
        let enumerator = PathEnumerator::new(&graph);

        let paths = enumerator.enumerate_named("a", "c", &Progress::new()).unwrap();
        assert_eq!(names(&graph, &paths), vec!["[a->b, b->c]"]);

        match enumerator.enumerate_named("a", "missing", &Progress::new()) {
            Err(AnalysisError::UnknownNode(name)) => assert_eq!(name, "missing"),
            other => panic!("Expected UnknownNode, got {:?}", other),
        }
        assert!(matches!(
            enumerator.enumerate_named("nope", "c", &Progress::new()),
            Err(AnalysisError::UnknownNode(_))
        ));
    }

    #[test]
    fn test_unreachable_destination() {
        let mut graph = Graph::new();
        graph.add_edge("a", "b");
        graph.add_edge("c", "b");

        let paths = PathEnumerator::new(&graph)
            .enumerate(node(&graph, "a"), node(&graph, "c"), &Progress::new())
            .unwrap();
        assert!(paths.is_empty());
    }

    #[test]
    fn test_back_edge_to_origin_flags_whole_path() {
        let mut graph = Graph::new();
        let ab = graph.add_edge("a", "b");
        let bc = graph.add_edge("b", "c");
        let ca = graph.add_edge("c", "a");
        let cd = graph.add_edge("c", "d");

        let paths = PathEnumerator::new(&graph)
            .enumerate(node(&graph, "a"), node(&graph, "d"), &Progress::new())
            .unwrap();

        // Whether c->d is recorded depends on which edge of `c` comes first
        assert!(paths.len() <= 1);
        assert!(names(&graph, &paths).iter().all(|p| p == "[a->b, b->c, c->d]"));
        assert!(graph[ab].in_cycle());
        assert!(graph[bc].in_cycle());
        assert!(graph[ca].in_cycle());
        assert!(!graph[cd].in_cycle());
    }

    #[test]
    fn test_inner_loop_flags_only_loop_edges() {
        let mut graph = Graph::new();
        let sx = graph.add_edge("s", "x");
        let xy = graph.add_edge("x", "y");
        let yz = graph.add_edge("y", "z");
        let zx = graph.add_edge("z", "x");
        let zt = graph.add_edge("z", "t");

        let paths = PathEnumerator::new(&graph)
            .enumerate(node(&graph, "s"), node(&graph, "t"), &Progress::new())
            .unwrap();

        assert!(paths.len() <= 1);
        assert!(names(&graph, &paths).iter().all(|p| p == "[s->x, x->y, y->z, z->t]"));
        assert!(!graph[sx].in_cycle());
        assert!(graph[xy].in_cycle());
        assert!(graph[yz].in_cycle());
        assert!(graph[zx].in_cycle());
        assert!(!graph[zt].in_cycle());
    }

    #[test]
    fn test_probe_finds_cycle_through_destination() {
        let mut graph = Graph::new();
        let ab = graph.add_edge("a", "b");
        let bc = graph.add_edge("b", "c");
        let ca = graph.add_edge("c", "a");

        let paths = PathEnumerator::new(&graph)
            .enumerate(node(&graph, "a"), node(&graph, "b"), &Progress::new())
            .unwrap();

        // Recorded before the loop closed
        assert_eq!(names(&graph, &paths), vec!["[a->b]"]);
        assert!(graph[ab].in_cycle());
        assert!(graph[bc].in_cycle());
        assert!(graph[ca].in_cycle());

        // Flagged edges are gone for every later search
        let again = PathEnumerator::new(&graph)
            .enumerate(node(&graph, "a"), node(&graph, "b"), &Progress::new())
            .unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn test_self_loop_is_flagged() {
        let mut graph = Graph::new();
        let ab = graph.add_edge("a", "b");
        let bb = graph.add_edge("b", "b");
        graph.add_edge("b", "c");

        let paths = PathEnumerator::new(&graph)
            .enumerate(node(&graph, "a"), node(&graph, "c"), &Progress::new())
            .unwrap();

        assert!(names(&graph, &paths).iter().all(|p| p == "[a->b, b->c]"));
        assert!(graph[bb].in_cycle());
        // The whole candidate path is flagged, prefix included
        assert!(graph[ab].in_cycle());
    }

    #[test]
    fn test_branch_with_flagged_prefix_is_dropped() {
        let mut graph = Graph::new();
        graph.add_edge("a", "b");
        let bc = graph.add_edge("b", "c");
        graph.add_edge("c", "d");
        graph.add_edge("c", "c");
        graph.add_edge("a", "d");

        let paths = PathEnumerator::new(&graph)
            .enumerate(node(&graph, "a"), node(&graph, "d"), &Progress::new())
            .unwrap();

        // The self loop on `c` flags a->b and b->c; nothing recorded
        // afterwards may use them
        assert!(graph[bc].in_cycle());
        for path in &paths {
            if path.contains(&bc) {
                assert_eq!(names(&graph, &[path.clone()]), vec!["[a->b, b->c, c->d]"]);
            }
        }
        assert!(names(&graph, &paths).contains(&"[a->d]".to_string()));
    }

    #[test]
    fn test_flagged_edges_are_skipped() {
        let mut graph = Graph::new();
        graph.add_edge("a", "b");
        let bc = graph.add_edge("b", "c");
        graph.add_edge("a", "c");
        graph[bc].mark_in_cycle();

        let paths = PathEnumerator::new(&graph)
            .enumerate(node(&graph, "a"), node(&graph, "c"), &Progress::new())
            .unwrap();

        assert_eq!(names(&graph, &paths), vec!["[a->c]"]);
    }

    #[test]
    fn test_spill_stack_gives_same_paths() {
        let mut graph = Graph::new();
        for (s, t) in [("a", "b"), ("a", "c"), ("b", "d"), ("c", "d"), ("b", "c"), ("d", "e")] {
            graph.add_edge(s, t);
        }
        let a = node(&graph, "a");
        let e = node(&graph, "e");

        let in_memory = PathEnumerator::new(&graph)
            .enumerate(a, e, &Progress::new())
            .unwrap();
        let spilled = PathEnumerator::with_stack(&graph, StackKind::Spill { scratch_dir: None })
            .enumerate(a, e, &Progress::new())
            .unwrap();

        assert_eq!(in_memory.len(), 3);
        assert_eq!(names(&graph, &in_memory), names(&graph, &spilled));
    }

    #[test]
    fn test_cancelled_enumeration() {
        let mut graph = Graph::new();
        graph.add_edge("a", "b");
        let progress = Progress::new();
        progress.cancel();

        let err = PathEnumerator::new(&graph)
            .enumerate(node(&graph, "a"), node(&graph, "b"), &progress)
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_long_chain_does_not_recurse() {
        let mut graph = Graph::new();
        let depth = 2_000;
        for i in 0..depth {
            graph.add_edge(&format!("n{}", i), &format!("n{}", i + 1));
        }

        let paths = PathEnumerator::new(&graph)
            .enumerate(node(&graph, "n0"), node(&graph, &format!("n{}", depth)), &Progress::new())
            .unwrap();

        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].len(), depth);
    }
}
