//! Search configuration

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SearchError;

/// Engine configuration shared by every search a coordinator runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of worker threads (0 = cores minus one, at least one)
    pub workers: usize,
    /// Maximum batches dispatched per search (0 = unlimited)
    pub max_batches: u64,
    /// Wall-clock budget per search in milliseconds
    pub timeout_ms: u64,
    /// How often each worker reports progress
    pub progress_interval_ms: u64,
    /// Consecutive worker failures tolerated before the search errors out
    pub max_consecutive_failures: u32,
    /// Directory holding the used-salt set and terminal results
    pub store_dir: PathBuf,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            workers: 0, // Auto-detect
            max_batches: 100,
            timeout_ms: 5 * 60 * 1000,
            progress_interval_ms: 5000,
            max_consecutive_failures: 8,
            store_dir: PathBuf::from("salt-store"),
        }
    }
}

impl SearchConfig {
    /// Load a JSON config file. Missing fields fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SearchError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| SearchError::persistence(path, e))?;
        serde_json::from_str(&raw).map_err(|e| SearchError::serialization(path, e))
    }

    /// Resolved worker count, reserving one core for the host.
    pub fn worker_count(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get().saturating_sub(1).max(1)
        } else {
            self.workers
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}
