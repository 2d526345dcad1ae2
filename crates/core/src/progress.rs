//! Cooperative cancellation and progress reporting
//!
//! A [`Progress`] handle is shared between the caller and every worker of a
//! phase. Workers poll [`Progress::check`] at well-defined points (task
//! start, edge expansion, path-cost accumulation) and report completed work
//! units; the caller may cancel at any time. Nothing here blocks.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::AnalysisError;

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    worked: AtomicU64,
    total: AtomicU64,
    label: Mutex<String>,
}

/// Cancellation token plus work-unit counter
///
/// Cloning is cheap; all clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct Progress {
    inner: Arc<Inner>,
}

impl Progress {
    /// Create a fresh, non-cancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; observed by workers at their next poll
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Fail with [`AnalysisError::Cancelled`] once cancellation was requested
    pub fn check(&self) -> Result<(), AnalysisError> {
        if self.is_cancelled() {
            Err(AnalysisError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Start a new task: resets the counter and records the expected total
    ///
    /// A total of zero means "unknown".
    pub fn begin(&self, label: &str, total: u64) {
        *self.inner.label.lock().unwrap_or_else(PoisonError::into_inner) = label.to_string();
        self.inner.total.store(total, Ordering::Relaxed);
        self.inner.worked.store(0, Ordering::Relaxed);
    }

    /// Report `units` of completed work
    pub fn worked(&self, units: u64) {
        self.inner.worked.fetch_add(units, Ordering::Relaxed);
    }

    pub fn worked_units(&self) -> u64 {
        self.inner.worked.load(Ordering::Relaxed)
    }

    pub fn total_units(&self) -> u64 {
        self.inner.total.load(Ordering::Relaxed)
    }

    /// Label of the task most recently started with [`Progress::begin`]
    pub fn label(&self) -> String {
        self.inner
            .label
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
