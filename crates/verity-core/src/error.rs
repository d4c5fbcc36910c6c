//! Error types for the Verity engine.

use thiserror::Error;
use verity_consensus::StatementId;

/// Core error type for engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration error. Fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A result for this statement has already been committed.
    #[error("Statement already processed: {0}")]
    AlreadyProcessed(StatementId),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Consensus error passthrough.
    #[error("Consensus error: {0}")]
    Consensus(#[from] verity_consensus::ConsensusError),

    /// Reputation error passthrough.
    #[error("Reputation error: {0}")]
    Reputation(#[from] verity_reputation::ReputationError),

    /// Ground-truth error passthrough.
    #[error("Ground truth error: {0}")]
    Truth(#[from] verity_truth::TruthError),
}
