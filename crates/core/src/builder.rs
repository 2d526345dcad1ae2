//! Graph construction from a root project
//!
//! The builder walks the dependency closure of the root without recursion:
//! projects waiting to be expanded sit on a [`MemoryStack`], and a `done`
//! set makes sure every project is expanded exactly once. Each reported
//! dependency becomes a deduplicated edge.
//!
//! The walk also carries a cheap cycle hint: a popped project that is
//! already done while another copy is still waiting on the stack is logged
//! as a suspected cycle. The hint is diagnostic only. It never flags edges;
//! the path enumerator owns cycle marking.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::AnalysisError;
use crate::graph::Graph;
use crate::progress::Progress;
use crate::provider::DependencyProvider;
use crate::queries::degree_stats;
use crate::stack::{FrameStack, MemoryStack};

/// Summary statistics of a finished build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    pub nodes: usize,
    pub edges: usize,
    pub min_degree: usize,
    pub max_degree: usize,
    /// Hits of the build-time cycle hint
    pub suspected_cycles: usize,
}

/// Builds a [`Graph`] by querying a [`DependencyProvider`]
pub struct GraphBuilder<'p, P: DependencyProvider> {
    provider: &'p P,
}

impl<'p, P: DependencyProvider> GraphBuilder<'p, P> {
    pub fn new(provider: &'p P) -> Self {
        Self { provider }
    }

    /// Build the dependency graph reachable from `root`
    ///
    /// # Errors
    /// - [`AnalysisError::Provider`] when a dependency lookup fails
    /// - [`AnalysisError::Cancelled`] when `progress` is cancelled
    ///
    /// No partial graph is returned on error.
    #[instrument(skip_all, fields(root = %self.provider.name(root)))]
    pub fn build(&self, root: &P::Project, progress: &Progress) -> Result<(Graph, BuildReport), AnalysisError> {
        progress.begin("Create model", 0);

        let mut graph = Graph::new();
        let root_index = graph.add_node(&self.provider.name(root));
        graph.set_root(root_index);

        let mut stack = MemoryStack::new();
        let mut done: HashSet<P::Project> = HashSet::new();
        let mut suspected_cycles = 0;

        stack.push(root.clone())?;
        while !stack.is_empty() {
            progress.check()?;
            let project = stack.pop()?;

            if done.contains(&project) {
                if stack.contains(&project) {
                    suspected_cycles += 1;
                    debug!(project = %self.provider.name(&project), pending = stack.len(), done = done.len(), "suspected cycle");
                }
                continue;
            }
            done.insert(project.clone());

            let name = self.provider.name(&project);
            let dependencies = self
                .provider
                .dependencies(&project)
                .map_err(|source| AnalysisError::Provider {
                    project: name.clone(),
                    source,
                })?;

            let source = graph.add_node(&name);
            for dependency in dependencies {
                progress.check()?;

                let target = graph.add_node(&self.provider.name(&dependency));
                graph.connect(source, target);
                if !done.contains(&dependency) {
                    stack.push(dependency)?;
                }
                progress.worked(1);
            }
        }

        let degrees = degree_stats(&graph);
        let report = BuildReport {
            nodes: graph.node_count(),
            edges: graph.edge_count(),
            min_degree: degrees.min,
            max_degree: degrees.max,
            suspected_cycles,
        };
        info!(
            projects = report.nodes,
            connections = report.edges,
            min_degree = report.min_degree,
            max_degree = report.max_degree,
            "dependency model built"
        );

        Ok((graph, report))
    }
}
