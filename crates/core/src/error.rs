//! Error types shared by the analysis phases
//!
//! Every phase (build, cost aggregation) returns `Result<_, AnalysisError>`.
//! Cancellation travels through the same channel as failures but is kept
//! distinguishable through [`AnalysisError::is_cancelled`], so callers can
//! report "cancelled" separately from "failed".

use crate::stack::StackError;

/// Terminal failure of an analysis phase
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// The progress token was cancelled; not a true failure
    #[error("analysis cancelled")]
    Cancelled,

    /// The dependency provider could not report a project's dependencies
    #[error("dependency lookup failed for project `{project}`")]
    Provider {
        project: String,
        #[source]
        source: anyhow::Error,
    },

    /// The traversal stack could not store or restore a frame
    #[error("traversal stack failure")]
    Stack(#[from] StackError),

    /// A per-edge aggregation task failed
    #[error("cost task for edge {edge} failed: {message}")]
    Task { edge: String, message: String },

    /// Configuration rejected by validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The worker pool could not be created
    #[error("failed to start worker pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// A node name that is not part of the graph
    #[error("unknown node `{0}`")]
    UnknownNode(String),

    /// Cost aggregation requested before any successful build
    #[error("no graph has been built yet")]
    NotBuilt,
}

impl AnalysisError {
    /// Whether this outcome is a cancellation rather than a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AnalysisError::Cancelled)
    }
}
