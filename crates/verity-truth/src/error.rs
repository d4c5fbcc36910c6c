//! Error types for the ground-truth tracker.

use thiserror::Error;
use verity_consensus::Resolution;

/// Result type alias for ground-truth operations.
pub type Result<T> = std::result::Result<T, TruthError>;

/// Errors that can occur while recording or grading ground truth.
#[derive(Debug, Error)]
pub enum TruthError {
    /// Database error from sled.
    #[error("database error: {0}")]
    Database(#[from] sled::Error),

    /// A statement already has a different official resolution.
    ///
    /// The stored value is kept.
    #[error("statement '{statement}' already resolved as {stored}, refusing {proposed}")]
    Conflict {
        /// The statement id
        statement: String,
        /// Resolution already on record
        stored: Resolution,
        /// Resolution that was refused
        proposed: Resolution,
    },

    /// Official resolutions must be TRUE or FALSE.
    #[error("official resolution for statement '{0}' must be TRUE or FALSE")]
    IndefiniteResolution(String),

    /// A stored record could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_display() {
        let err = TruthError::Conflict {
            statement: "btc-100k".to_string(),
            stored: Resolution::True,
            proposed: Resolution::False,
        };
        assert_eq!(
            err.to_string(),
            "statement 'btc-100k' already resolved as TRUE, refusing FALSE"
        );
    }
}
