//! Error types for the reputation ledger and phase controller.

use thiserror::Error;

/// Result type alias for reputation operations.
pub type Result<T> = std::result::Result<T, ReputationError>;

/// Errors that can occur while updating reputation or deriving weights.
#[derive(Debug, Error)]
pub enum ReputationError {
    /// A composite score was not a finite value in `[0, 1]`.
    ///
    /// No part of the batch containing it is applied.
    #[error("score {score} for worker {worker} is outside [0, 1]")]
    InvalidScore {
        /// Worker the score belongs to
        worker: u32,
        /// The rejected score
        score: f64,
    },

    /// The phase schedule thresholds or fractions are inconsistent.
    #[error("invalid phase schedule: {0}")]
    InvalidSchedule(String),

    /// The ledger lock was poisoned by a panicking writer.
    #[error("reputation ledger lock poisoned")]
    LockPoisoned,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_score_display() {
        let err = ReputationError::InvalidScore {
            worker: 3,
            score: 1.5,
        };
        let msg = err.to_string();
        assert!(msg.contains("1.5"));
        assert!(msg.contains("worker 3"));
    }

    #[test]
    fn test_lock_poisoned_display() {
        assert_eq!(
            ReputationError::LockPoisoned.to_string(),
            "reputation ledger lock poisoned"
        );
    }
}
