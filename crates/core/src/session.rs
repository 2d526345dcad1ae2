//! One analysis of one root project
//!
//! A [`Session`] owns everything a run needs: the provider, the root, the
//! configuration and the graph slot. Both phases lock the slot for their
//! whole duration, so a build never overlaps an aggregation of the same
//! session. The lock guard releases the slot on every exit path.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::builder::{BuildReport, GraphBuilder};
use crate::config::AnalysisConfig;
use crate::cost::{CostAggregator, CostReport};
use crate::error::AnalysisError;
use crate::graph::Graph;
use crate::progress::Progress;
use crate::provider::DependencyProvider;

/// Reports of both phases of a full run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub build: BuildReport,
    pub cost: CostReport,
}

pub struct Session<P: DependencyProvider> {
    provider: P,
    root: P::Project,
    config: AnalysisConfig,
    graph: Mutex<Option<Graph>>,
}

impl<P: DependencyProvider> Session<P> {
    /// Create a session for `root`
    ///
    /// # Errors
    /// [`AnalysisError::InvalidConfig`] when `config` fails validation.
    pub fn new(provider: P, root: P::Project, config: AnalysisConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self {
            provider,
            root,
            config,
            graph: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn root(&self) -> &P::Project {
        &self.root
    }

    /// Build a fresh graph, replacing the previous one
    ///
    /// The previous graph is discarded before building starts; a failed or
    /// cancelled build leaves the session without a graph.
    pub fn build(&self, progress: &Progress) -> Result<BuildReport, AnalysisError> {
        let mut slot = self.lock();
        *slot = None;

        let (graph, report) = GraphBuilder::new(&self.provider).build(&self.root, progress)?;
        *slot = Some(graph);
        Ok(report)
    }

    /// Run cost aggregation over the built graph
    ///
    /// # Errors
    /// [`AnalysisError::NotBuilt`] before a successful [`Session::build`],
    /// otherwise whatever [`CostAggregator::compute_costs`] reports.
    pub fn compute_costs(&self, progress: &Progress) -> Result<CostReport, AnalysisError> {
        let slot = self.lock();
        let graph = slot.as_ref().ok_or(AnalysisError::NotBuilt)?;
        CostAggregator::new(&self.config).compute_costs(graph, progress)
    }

    /// Build, then compute costs
    #[instrument(skip_all, fields(root = %self.provider.name(&self.root)))]
    pub fn run(&self, progress: &Progress) -> Result<AnalysisReport, AnalysisError> {
        let build = self.build(progress)?;
        let cost = self.compute_costs(progress)?;
        info!(
            projects = build.nodes,
            connections = build.edges,
            raised = cost.raised,
            "analysis finished"
        );
        Ok(AnalysisReport { build, cost })
    }

    /// Read the built graph under the phase lock
    ///
    /// Returns `None` when no graph has been built.
    pub fn with_graph<R>(&self, f: impl FnOnce(&Graph) -> R) -> Option<R> {
        self.lock().as_ref().map(f)
    }

    /// Hand the built graph to the caller, ending the session
    pub fn into_graph(self) -> Option<Graph> {
        self.graph.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> MutexGuard<'_, Option<Graph>> {
        self.graph.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
