//! Configuration types for the Verity engine.
//!
//! Loaded once at startup from TOML. Every section has compiled
//! defaults, so a file only needs the keys it changes:
//!
//! ```toml
//! [phases]
//! bootstrap_until = 10
//! merit_from = 50
//!
//! [[bootstrap_allocation]]
//! worker = 1
//! share = 0.5
//!
//! [[bootstrap_allocation]]
//! worker = 2
//! share = 0.5
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use verity_consensus::{ScoringSettings, WorkerId};
use verity_reputation::{PhaseSchedule, WeightVector};

use crate::error::EngineError;
use crate::Result;

/// Configuration for the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Multi-factor scorer settings.
    pub scoring: ScoringSettings,

    /// Epoch phase thresholds and fixed-fraction decay.
    pub phases: PhaseSchedule,

    /// Fixed reward allocation used while merit data accumulates.
    pub bootstrap_allocation: Vec<AllocationEntry>,

    /// Ground-truth tracker settings.
    pub ground_truth: GroundTruthConfig,

    /// Processing cadence and limits.
    pub engine: ProcessingConfig,
}

/// One worker's share of the bootstrap allocation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AllocationEntry {
    /// The worker.
    pub worker: WorkerId,
    /// Relative share. Shares are normalized if they do not sum to 1.
    pub share: f64,
}

/// Ground-truth tracker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroundTruthConfig {
    /// Path to the tracker database. In-memory when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,

    /// Graded answers a worker needs before ground truth enters merit.
    pub min_samples: u64,

    /// Weight of ground-truth accuracy in the merit blend, in `[0, 1]`.
    pub blend: f64,
}

impl Default for GroundTruthConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            min_samples: 5,
            blend: 0.5,
        }
    }
}

/// Processing cadence and limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Statements between weight-vector updates.
    pub weight_update_interval: usize,

    /// Timeout for one dispatch round, in milliseconds.
    pub dispatch_timeout_ms: u64,

    /// Number of consensus sources kept per result.
    pub max_consensus_sources: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            weight_update_interval: 10,
            dispatch_timeout_ms: 12_000,
            max_consensus_sources: 10,
        }
    }
}

impl ProcessingConfig {
    /// Dispatch round timeout.
    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms)
    }
}

impl EngineConfig {
    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Config` if the TOML does not parse.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).map_err(|e| EngineError::Config(format!("invalid TOML: {}", e)))
    }

    /// Reads and parses a TOML configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Serializes the configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Replaces the bootstrap allocation with equal shares.
    #[must_use]
    pub fn with_uniform_allocation(mut self, workers: &[WorkerId]) -> Self {
        let share = if workers.is_empty() {
            0.0
        } else {
            1.0 / workers.len() as f64
        };
        self.bootstrap_allocation = workers
            .iter()
            .map(|&worker| AllocationEntry { worker, share })
            .collect();
        self
    }

    /// The bootstrap allocation as a weight vector (not normalized).
    pub fn bootstrap_vector(&self) -> WeightVector {
        self.bootstrap_allocation
            .iter()
            .map(|entry| (entry.worker, entry.share))
            .collect()
    }

    /// Checks every section, failing on the first problem.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Config` describing what is wrong.
    pub fn validate(&self) -> Result<()> {
        self.scoring
            .validate()
            .map_err(|e| EngineError::Config(format!("scoring: {}", e)))?;

        self.phases
            .validate()
            .map_err(|e| EngineError::Config(format!("phases: {}", e)))?;

        self.validate_allocation()?;

        let blend = self.ground_truth.blend;
        if !blend.is_finite() || !(0.0..=1.0).contains(&blend) {
            return Err(EngineError::Config(format!(
                "ground_truth: blend {} is outside [0, 1]",
                blend
            )));
        }
        if self.ground_truth.min_samples == 0 {
            return Err(EngineError::Config(
                "ground_truth: min_samples must be at least 1".to_string(),
            ));
        }

        if self.engine.weight_update_interval == 0 {
            return Err(EngineError::Config(
                "engine: weight_update_interval must be at least 1".to_string(),
            ));
        }
        if self.engine.dispatch_timeout_ms == 0 {
            return Err(EngineError::Config(
                "engine: dispatch_timeout_ms must be at least 1".to_string(),
            ));
        }
        if self.engine.max_consensus_sources == 0 {
            return Err(EngineError::Config(
                "engine: max_consensus_sources must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_allocation(&self) -> Result<()> {
        if self.bootstrap_allocation.is_empty() {
            return Err(EngineError::Config(
                "bootstrap_allocation: at least one worker is required".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        let mut total = 0.0;
        for entry in &self.bootstrap_allocation {
            if !seen.insert(entry.worker) {
                return Err(EngineError::Config(format!(
                    "bootstrap_allocation: worker {} listed twice",
                    entry.worker
                )));
            }
            if !entry.share.is_finite() || entry.share < 0.0 {
                return Err(EngineError::Config(format!(
                    "bootstrap_allocation: share {} for worker {} must be finite and non-negative",
                    entry.share, entry.worker
                )));
            }
            total += entry.share;
        }

        if total <= 0.0 {
            return Err(EngineError::Config(
                "bootstrap_allocation: shares sum to zero".to_string(),
            ));
        }
        Ok(())
    }
}
