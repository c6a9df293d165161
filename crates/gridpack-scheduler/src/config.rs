//! Scheduler limits, loadable from TOML.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{SchedulerError, SchedulerResult};

pub const DEFAULT_MAX_NODES: usize = 1024;
pub const DEFAULT_MAX_CANDIDATES: usize = 128;

/// Table sizes and the candidate bound for [`crate::Scheduler`].
///
/// All tables are allocated up front and never grow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Node registry slots.
    pub max_nodes: usize,
    /// Queue slots.
    pub max_queued_jobs: usize,
    /// Replica table slots.
    pub max_replicas: usize,
    /// Upper bound on nodes considered per queued entry per tick.
    pub max_candidates: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_nodes: DEFAULT_MAX_NODES,
            max_queued_jobs: DEFAULT_MAX_NODES * 8,
            max_replicas: DEFAULT_MAX_NODES * 8,
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }
}

impl SchedulerConfig {
    pub fn from_file(path: &Path) -> SchedulerResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> SchedulerResult<Self> {
        let config: SchedulerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SchedulerResult<()> {
        let limits = [
            ("max_nodes", self.max_nodes),
            ("max_queued_jobs", self.max_queued_jobs),
            ("max_replicas", self.max_replicas),
            ("max_candidates", self.max_candidates),
        ];
        for (key, value) in limits {
            if value == 0 {
                return Err(SchedulerError::InvalidRequest(format!(
                    "{key} must be at least 1"
                )));
            }
        }
        Ok(())
    }
}
