//! Concurrent transitive-cost aggregation
//!
//! Every edge becomes one task on a dedicated rayon pool. A task enumerates
//! all alternate paths between the edge's endpoints and raises the edge's
//! cost to the heaviest path found.
//!
//! In [`CostMode::Live`] path costs are read from the shared edges while
//! other tasks may still be raising them, so on graphs with overlapping
//! paths the result depends on scheduling. [`CostMode::Snapshot`] reads
//! every path cost from a copy taken before dispatch instead. Cycle flags
//! are shared in both modes.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use petgraph::stable_graph::EdgeIndex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::graph::Graph;
use crate::paths::PathEnumerator;
use crate::progress::Progress;

/// Where a task reads the cost of edges on an alternate path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostMode {
    /// Current shared values, possibly already raised by other tasks
    #[default]
    Live,
    /// Values captured before any task starts
    Snapshot,
}

/// Summary of a finished aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostReport {
    /// Tasks run, one per edge
    pub edges: usize,
    /// Alternate paths found over all edges
    pub paths: usize,
    /// Edges whose cost went up
    pub raised: usize,
    pub elapsed: Duration,
    pub pool_size: usize,
}

struct TaskOutcome {
    paths: usize,
    raised: bool,
}

/// Runs the per-edge cost tasks of one graph
pub struct CostAggregator<'c> {
    config: &'c AnalysisConfig,
}

impl<'c> CostAggregator<'c> {
    pub fn new(config: &'c AnalysisConfig) -> Self {
        Self { config }
    }

    /// Raise every edge of `graph` to its transitive cost
    ///
    /// All tasks run to completion even when one fails; the outcome is the
    /// first failure in edge insertion order. Mutations made before a
    /// failure or cancellation are kept.
    ///
    /// # Errors
    /// - [`AnalysisError::InvalidConfig`] for a zero pool size
    /// - [`AnalysisError::ThreadPool`] when the workers cannot be started
    /// - [`AnalysisError::Cancelled`] when `progress` was cancelled
    /// - [`AnalysisError::Task`] when a task panicked
    /// - [`AnalysisError::Stack`] when a task lost its traversal stack
    #[instrument(skip_all, fields(edges = graph.edge_count(), pool_size = self.config.pool_size))]
    pub fn compute_costs(&self, graph: &Graph, progress: &Progress) -> Result<CostReport, AnalysisError> {
        self.config.validate()?;

        let start = Instant::now();
        let edges: Vec<EdgeIndex> = graph.edge_indices().collect();
        progress.begin("Compute connection costs", edges.len() as u64);

        let snapshot = match self.config.cost_mode {
            CostMode::Live => None,
            CostMode::Snapshot => Some(
                edges
                    .iter()
                    .map(|&e| (e, graph[e].cost()))
                    .collect::<HashMap<_, _>>(),
            ),
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.pool_size)
            .thread_name(|i| format!("depcost-cost-{}", i))
            .build()?;

        let outcomes: Vec<Result<TaskOutcome, AnalysisError>> = pool.install(|| {
            edges
                .par_iter()
                .map(|&edge| self.run_task(graph, edge, snapshot.as_ref(), progress))
                .collect()
        });

        let elapsed = start.elapsed();
        info!(
            elapsed_ms = elapsed.as_millis() as u64,
            pool_size = self.config.pool_size,
            "connection costs computed"
        );

        let mut report = CostReport {
            edges: edges.len(),
            paths: 0,
            raised: 0,
            elapsed,
            pool_size: self.config.pool_size,
        };
        for outcome in outcomes {
            let outcome = outcome?;
            report.paths += outcome.paths;
            if outcome.raised {
                report.raised += 1;
            }
        }

        Ok(report)
    }

    fn run_task(
        &self,
        graph: &Graph,
        edge: EdgeIndex,
        snapshot: Option<&HashMap<EdgeIndex, u64>>,
        progress: &Progress,
    ) -> Result<TaskOutcome, AnalysisError> {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.edge_cost(graph, edge, snapshot, progress)
        }));

        match result {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(err)) => {
                if !err.is_cancelled() {
                    warn!(edge = %graph.describe_edge(edge), error = %err, "cost task failed");
                }
                Err(err)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(edge = %graph.describe_edge(edge), %message, "cost task panicked");
                Err(AnalysisError::Task {
                    edge: graph.describe_edge(edge),
                    message,
                })
            }
        }
    }

    fn edge_cost(
        &self,
        graph: &Graph,
        edge_index: EdgeIndex,
        snapshot: Option<&HashMap<EdgeIndex, u64>>,
        progress: &Progress,
    ) -> Result<TaskOutcome, AnalysisError> {
        progress.check()?;

        let edge = &graph[edge_index];
        let paths = PathEnumerator::with_stack(graph, self.config.stack.clone()).enumerate(
            edge.source(),
            edge.target(),
            progress,
        )?;
        if self.config.log_path_counts {
            info!(edge = %graph.describe_edge(edge_index), paths = paths.len(), "possible paths");
        }

        let cost_of = |e: EdgeIndex| match snapshot {
            Some(costs) => costs.get(&e).copied().unwrap_or_else(|| graph[e].cost()),
            None => graph[e].cost(),
        };

        let mut new_cost = cost_of(edge_index);
        for path in &paths {
            progress.check()?;
            let path_cost = path
                .iter()
                .map(|&e| cost_of(e))
                .fold(0u64, u64::saturating_add);
            new_cost = new_cost.max(path_cost);
        }

        let previous = edge.raise_cost(new_cost);
        progress.worked(1);

        Ok(TaskOutcome {
            paths: paths.len(),
            raised: new_cost > previous,
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::StackKind;

    fn config(pool_size: usize, cost_mode: CostMode) -> AnalysisConfig {
        AnalysisConfig {
            pool_size,
            log_path_counts: false,
            cost_mode,
            ..AnalysisConfig::default()
        }
    }

    fn cost(graph: &Graph, src: &str, dst: &str) -> u64 {
        let s = graph.find_node(src).unwrap();
        let d = graph.find_node(dst).unwrap();
        graph[graph.find_edge(s, d).unwrap()].cost()
    }

    #[test]
    fn test_shortcut_takes_longest_path_cost() {
        let mut graph = Graph::new();
        graph.add_edge("a", "b");
        graph.add_edge("b", "c");
        graph.add_edge("c", "d");
        graph.add_edge("a", "d");

        let config = config(2, CostMode::Live);
        let report = CostAggregator::new(&config)
            .compute_costs(&graph, &Progress::new())
            .unwrap();

        assert_eq!(cost(&graph, "a", "d"), 3);
        assert_eq!(cost(&graph, "a", "b"), 1);
        assert_eq!(report.edges, 4);
        assert_eq!(report.raised, 1);
        // Every edge finds at least itself, a->d also finds the chain
        assert_eq!(report.paths, 5);
        assert_eq!(report.pool_size, 2);
    }

    #[test]
    fn test_cycle_edges_keep_base_cost() {
        let mut graph = Graph::new();
        graph.add_edge("a", "b");
        graph.add_edge("b", "c");
        graph.add_edge("c", "a");

        let config = config(3, CostMode::Live);
        CostAggregator::new(&config)
            .compute_costs(&graph, &Progress::new())
            .unwrap();

        assert!(graph.edges().all(|e| e.in_cycle()));
        assert!(graph.edges().all(|e| e.cost() == 1));
    }

    #[test]
    fn test_snapshot_mode_reads_costs_from_before_dispatch() {
        let mut graph = Graph::new();
        graph.add_edge("a", "b");
        let bc = graph.add_edge("b", "c");
        graph.add_edge("a", "c");
        graph.add_edge("c", "d");
        graph.add_edge("a", "d");
        graph[bc].raise_cost(5);

        let config = config(4, CostMode::Snapshot);
        CostAggregator::new(&config)
            .compute_costs(&graph, &Progress::new())
            .unwrap();

        assert_eq!(cost(&graph, "a", "c"), 6);
        assert_eq!(cost(&graph, "b", "c"), 5);
        // a->b->c->d with the pre-raised b->c
        assert_eq!(cost(&graph, "a", "d"), 7);
    }

    #[test]
    fn test_costs_never_decrease() {
        let mut graph = Graph::new();
        let ab = graph.add_edge("a", "b");
        graph[ab].raise_cost(9);

        let config = config(1, CostMode::Live);
        let report = CostAggregator::new(&config)
            .compute_costs(&graph, &Progress::new())
            .unwrap();

        assert_eq!(graph[ab].cost(), 9);
        assert_eq!(report.raised, 0);
    }

    #[test]
    fn test_cancelled_before_dispatch_leaves_costs() {
        let mut graph = Graph::new();
        graph.add_edge("a", "b");
        graph.add_edge("b", "c");
        graph.add_edge("a", "c");
        let progress = Progress::new();
        progress.cancel();

        let config = config(2, CostMode::Live);
        let err = CostAggregator::new(&config)
            .compute_costs(&graph, &progress)
            .unwrap_err();

        assert!(err.is_cancelled());
        assert!(graph.edges().all(|e| e.cost() == 1 && !e.in_cycle()));
    }

    #[test]
    fn test_zero_pool_size_is_rejected() {
        let graph = Graph::new();
        let config = config(0, CostMode::Live);

        let err = CostAggregator::new(&config)
            .compute_costs(&graph, &Progress::new())
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidConfig(_)));
    }

    #[test]
    fn test_unusable_scratch_dir_fails_tasks() {
        let mut graph = Graph::new();
        graph.add_edge("a", "b");
        let dir = tempfile::TempDir::new().unwrap();

        let config = AnalysisConfig {
            stack: StackKind::Spill {
                scratch_dir: Some(dir.path().join("missing")),
            },
            ..config(1, CostMode::Live)
        };
        let err = CostAggregator::new(&config)
            .compute_costs(&graph, &Progress::new())
            .unwrap_err();

        assert!(matches!(err, AnalysisError::Stack(_)));
    }

    #[test]
    fn test_progress_counts_edges() {
        let mut graph = Graph::new();
        graph.add_edge("a", "b");
        graph.add_edge("b", "c");
        let progress = Progress::new();

        let config = config(2, CostMode::Live);
        CostAggregator::new(&config)
            .compute_costs(&graph, &progress)
            .unwrap();

        assert_eq!(progress.total_units(), 2);
        assert_eq!(progress.worked_units(), 2);
        assert_eq!(progress.label(), "Compute connection costs");
    }

    #[test]
    fn test_empty_graph() {
        let config = config(1, CostMode::Live);
        let report = CostAggregator::new(&config)
            .compute_costs(&Graph::new(), &Progress::new())
            .unwrap();

        assert_eq!(report.edges, 0);
        assert_eq!(report.paths, 0);
    }

    #[test]
    fn test_snapshot_costs_override_live_costs() {
        let mut graph = Graph::new();
        let ab = graph.add_edge("a", "b");
        let bc = graph.add_edge("b", "c");
        let ac = graph.add_edge("a", "c");
        let config = config(1, CostMode::Snapshot);
        let aggregator = CostAggregator::new(&config);

        // Higher than live: the path sum follows the captured values
        let snapshot = HashMap::from([(ab, 4), (bc, 3), (ac, 1)]);
        let outcome = aggregator
            .edge_cost(&graph, ac, Some(&snapshot), &Progress::new())
            .unwrap();
        assert_eq!(graph[ac].cost(), 7);
        assert_eq!(outcome.paths, 2);
        assert!(outcome.raised);

        // Lower than live: raises made after capture are not seen
        let mut graph = Graph::new();
        let ab = graph.add_edge("a", "b");
        let bc = graph.add_edge("b", "c");
        let ac = graph.add_edge("a", "c");
        graph[ab].raise_cost(10);
        let snapshot = HashMap::from([(ab, 1), (bc, 1), (ac, 1)]);
        aggregator
            .edge_cost(&graph, ac, Some(&snapshot), &Progress::new())
            .unwrap();
        assert_eq!(graph[ac].cost(), 2);

        // The live read on the same graph sees the raised edge
        aggregator
            .edge_cost(&graph, ac, None, &Progress::new())
            .unwrap();
        assert_eq!(graph[ac].cost(), 11);
    }

    #[test]
    fn test_panic_message() {
        let text: Box<dyn Any + Send> = Box::new("boom");
        let owned: Box<dyn Any + Send> = Box::new(String::from("bang"));
        let other: Box<dyn Any + Send> = Box::new(7u8);

        assert_eq!(panic_message(text.as_ref()), "boom");
        assert_eq!(panic_message(owned.as_ref()), "bang");
        assert_eq!(panic_message(other.as_ref()), "task panicked");
    }
}
