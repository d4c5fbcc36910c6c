//! Error types for consensus and scoring.
//!
//! A malformed reply is never an error here: the validator turns it into
//! a [`Rejection`](crate::validator::Rejection) value. These errors cover
//! values that should have been impossible to construct and scoring
//! preconditions that failed defensively.

use thiserror::Error;

/// Errors that can occur while building responses or scoring them.
#[derive(Debug, Error)]
pub enum ConsensusError {
    /// A confidence value was outside `[0, 100]` or not finite.
    #[error("confidence {0} is outside [0, 100]")]
    InvalidConfidence(f64),

    /// A resolution string could not be parsed.
    #[error("unrecognized resolution '{0}'")]
    InvalidResolution(String),

    /// A response was scored against a statement it does not belong to.
    #[error("response for statement '{response}' scored against statement '{statement}'")]
    StatementMismatch {
        /// Statement id carried by the response.
        response: String,
        /// Statement id of the consensus being scored.
        statement: String,
    },

    /// A scoring precondition did not hold for a response.
    #[error("scoring precondition failed for worker {worker}: {reason}")]
    ScoringPrecondition {
        /// The worker whose response was excluded.
        worker: u32,
        /// Why the response could not be scored.
        reason: String,
    },

    /// Scoring weights are unusable.
    #[error("invalid scoring weights: {0}")]
    InvalidWeights(String),
}
