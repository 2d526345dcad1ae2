//! depcost core library
//!
//! Builds the dependency graph of a root project, finds circular
//! dependencies, and raises every direct dependency edge to the cost of
//! the heaviest alternate path between its endpoints. Renderers use the
//! result to hide redundant edges and highlight cycles.
//!
//! The usual entry point is [`Session`]:
//!
//! ```no_run
//! use depcost_core::{AnalysisConfig, Progress, Session, StaticProvider};
//!
//! let provider = StaticProvider::new()
//!     .with_project("app", &["core", "util"])
//!     .with_project("core", &["util"]);
//! let session = Session::new(provider, "app".to_string(), AnalysisConfig::default())?;
//! session.run(&Progress::new())?;
//! # Ok::<(), depcost_core::AnalysisError>(())
//! ```

pub mod builder;
pub mod config;
pub mod cost;
pub mod discovery;
pub mod error;
pub mod graph;
pub mod paths;
pub mod progress;
pub mod provider;
pub mod queries;
pub mod session;
pub mod stack;

// Re-export commonly used types
pub use builder::{BuildReport, GraphBuilder};
pub use config::AnalysisConfig;
pub use cost::{CostAggregator, CostMode, CostReport};
pub use error::AnalysisError;
pub use graph::{Edge, Graph, Node};
pub use paths::{EdgePath, PathEnumerator};
pub use progress::Progress;
pub use provider::{CargoWorkspaceProvider, DependencyProvider, StaticProvider};
pub use queries::{EdgeClass, GraphSnapshot};
pub use session::{AnalysisReport, Session};
pub use stack::{FrameStack, StackError, StackKind};
