//! Runtime configuration
//!
//! # Configuration hierarchy
//!
//! ```text
//! Priority (high → low):
//! 1. Explicit worker count passed to `start`
//! 2. Environment variable (WEFT_NUM_THREADS)
//! 3. Config file passed to the CLI (JSON)
//! 4. Default values
//! ```
//!
//! # Usage
//!
//! ```rust
//! use weft::util::config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env().with_workers(2);
//! assert_eq!(config.num_workers, 2);
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tracing::warn;

use crate::runtime::{Result, RuntimeError};

/// Environment variable selecting the worker count at first start.
pub const NUM_THREADS_ENV: &str = "WEFT_NUM_THREADS";

/// Sequential cutoffs for the divide-and-conquer algorithms.
///
/// Below a cutoff an algorithm stops splitting and runs inline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitThresholds {
    /// Largest factorial sub-range multiplied sequentially.
    pub factorial: u64,
    /// Result cells below which matrix multiply stays sequential.
    pub matrix_cells: usize,
    /// Largest input folded inline by `reduce`.
    pub reduce_grain: usize,
    /// Largest slice sorted inline by the merge sort.
    pub sort_grain: usize,
    /// Largest chunk handled by one element-wise task.
    pub elementwise_grain: usize,
}

impl Default for SplitThresholds {
    fn default() -> Self {
        Self {
            factorial: 10,
            matrix_cells: 1000,
            reduce_grain: 1024,
            sort_grain: 2048,
            elementwise_grain: 4096,
        }
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Number of worker threads.
    pub num_workers: usize,
    /// Stack size for worker threads.
    pub stack_size: usize,
    /// Work stealing batch size.
    pub steal_batch: usize,
    /// How long an idle worker parks before polling again.
    pub idle_timeout: Duration,
    /// How long `start` waits for the pool to report ready.
    pub startup_timeout: Duration,
    /// Sequential cutoffs.
    pub thresholds: SplitThresholds,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            num_workers: default_workers(),
            stack_size: 8 * 1024 * 1024,
            steal_batch: 4,
            idle_timeout: Duration::from_millis(1),
            startup_timeout: Duration::from_secs(10),
            thresholds: SplitThresholds::default(),
        }
    }
}

impl RuntimeConfig {
    /// Defaults with the worker count taken from `WEFT_NUM_THREADS` if set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(workers) = env_workers() {
            config.num_workers = workers;
        }
        config
    }

    /// Resolve the configuration for a first start.
    ///
    /// An explicit worker count wins over the environment.
    pub fn resolve(workers: Option<usize>) -> Self {
        match workers {
            Some(n) => Self::default().with_workers(n),
            None => Self::from_env(),
        }
    }

    /// Load a JSON config file. Missing fields take their defaults and the
    /// environment still overrides the worker count.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            RuntimeError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        let mut config: Self = serde_json::from_str(&content).map_err(|e| {
            RuntimeError::InvalidConfig(format!("cannot parse {}: {}", path.display(), e))
        })?;
        if let Some(workers) = env_workers() {
            config.num_workers = workers;
        }
        Ok(config)
    }

    /// Set the worker count.
    #[inline]
    pub fn with_workers(
        mut self,
        num_workers: usize,
    ) -> Self {
        self.num_workers = num_workers;
        self
    }

    /// Set the startup timeout.
    #[inline]
    pub fn with_startup_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Set the sequential cutoffs.
    #[inline]
    pub fn with_thresholds(
        mut self,
        thresholds: SplitThresholds,
    ) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Reject configurations the pool cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.num_workers == 0 {
            return Err(RuntimeError::InvalidConfig(
                "num_workers must be at least 1".to_string(),
            ));
        }
        if self.steal_batch == 0 {
            return Err(RuntimeError::InvalidConfig(
                "steal_batch must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Hardware concurrency, falling back to 4.
fn default_workers() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Worker count from the environment; non-positive or garbage values are ignored.
fn env_workers() -> Option<usize> {
    let raw = std::env::var(NUM_THREADS_ENV).ok()?;
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Some(n),
        _ => {
            warn!(value = %raw, "ignoring invalid {}", NUM_THREADS_ENV);
            None
        },
    }
}
