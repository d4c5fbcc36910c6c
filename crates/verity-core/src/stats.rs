//! Engine counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Lock-free counters updated by the engine.
#[derive(Debug)]
pub struct EngineStats {
    started: Instant,
    statements_processed: AtomicU64,
    consensus_reached: AtomicU64,
    replies_received: AtomicU64,
    replies_rejected: AtomicU64,
    scoring_exclusions: AtomicU64,
    weight_updates: AtomicU64,
    official_resolutions: AtomicU64,
    ground_truth_conflicts: AtomicU64,
}

/// Point-in-time copy of [`EngineStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Statements with a committed result.
    pub statements_processed: u64,
    /// Committed results with a TRUE or FALSE resolution.
    pub consensus_reached: u64,
    /// Raw replies seen, including absent ones.
    pub replies_received: u64,
    /// Replies excluded by validation.
    pub replies_rejected: u64,
    /// Valid responses excluded by the scorer.
    pub scoring_exclusions: u64,
    /// Weight vectors computed.
    pub weight_updates: u64,
    /// Official resolutions newly recorded.
    pub official_resolutions: u64,
    /// Conflicting official resolutions refused.
    pub ground_truth_conflicts: u64,
    /// Milliseconds since the engine started.
    pub uptime_ms: u64,
}

impl Default for EngineStats {
    fn default() -> Self {
        Self {
            started: Instant::now(),
            statements_processed: AtomicU64::new(0),
            consensus_reached: AtomicU64::new(0),
            replies_received: AtomicU64::new(0),
            replies_rejected: AtomicU64::new(0),
            scoring_exclusions: AtomicU64::new(0),
            weight_updates: AtomicU64::new(0),
            official_resolutions: AtomicU64::new(0),
            ground_truth_conflicts: AtomicU64::new(0),
        }
    }
}

impl EngineStats {
    pub(crate) fn record_statement(&self, definite: bool, replies: usize, rejected: usize, excluded: usize) {
        self.statements_processed.fetch_add(1, Ordering::Relaxed);
        if definite {
            self.consensus_reached.fetch_add(1, Ordering::Relaxed);
        }
        self.replies_received.fetch_add(replies as u64, Ordering::Relaxed);
        self.replies_rejected.fetch_add(rejected as u64, Ordering::Relaxed);
        self.scoring_exclusions.fetch_add(excluded as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_weight_update(&self) {
        self.weight_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_official(&self) {
        self.official_resolutions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_conflict(&self) {
        self.ground_truth_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    /// Time since the counters were created.
    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Reads all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            statements_processed: self.statements_processed.load(Ordering::Relaxed),
            consensus_reached: self.consensus_reached.load(Ordering::Relaxed),
            replies_received: self.replies_received.load(Ordering::Relaxed),
            replies_rejected: self.replies_rejected.load(Ordering::Relaxed),
            scoring_exclusions: self.scoring_exclusions.load(Ordering::Relaxed),
            weight_updates: self.weight_updates.load(Ordering::Relaxed),
            official_resolutions: self.official_resolutions.load(Ordering::Relaxed),
            ground_truth_conflicts: self.ground_truth_conflicts.load(Ordering::Relaxed),
            uptime_ms: u64::try_from(self.uptime().as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl StatsSnapshot {
    /// Share of processed statements that reached a TRUE or FALSE
    /// consensus, in `[0, 1]`.
    pub fn consensus_rate(&self) -> f64 {
        if self.statements_processed == 0 {
            0.0
        } else {
            self.consensus_reached as f64 / self.statements_processed as f64
        }
    }

    /// Time since the engine started.
    pub fn uptime(&self) -> Duration {
        Duration::from_millis(self.uptime_ms)
    }

    /// Share of received replies that were rejected, in `[0, 1]`.
    pub fn rejection_rate(&self) -> f64 {
        if self.replies_received == 0 {
            0.0
        } else {
            self.replies_rejected as f64 / self.replies_received as f64
        }
    }
}
