//! Analysis configuration
//!
//! Read from a TOML file; every key is optional:
//!
//! ```toml
//! pool_size = 8
//! log_path_counts = true
//! cost_mode = "snapshot"
//!
//! [stack]
//! kind = "spill"
//! scratch_dir = "/var/tmp"
//! ```

use std::num::NonZeroUsize;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cost::CostMode;
use crate::error::AnalysisError;
use crate::stack::StackKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Worker threads used by cost aggregation
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Log how many alternate paths were found for every edge
    #[serde(default = "default_true")]
    pub log_path_counts: bool,
    /// Frame storage for path enumeration
    #[serde(default)]
    pub stack: StackKind,
    #[serde(default)]
    pub cost_mode: CostMode,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            log_path_counts: default_true(),
            stack: StackKind::default(),
            cost_mode: CostMode::default(),
        }
    }
}

/// Available hardware parallelism, or 1 when it cannot be determined
pub fn default_pool_size() -> usize {
    std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

fn default_true() -> bool {
    true
}

impl AnalysisConfig {
    /// Load and validate a TOML configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        Self::from_toml_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.pool_size == 0 {
            return Err(AnalysisError::InvalidConfig(
                "pool_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
