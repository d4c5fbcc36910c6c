//! # Verity Consensus
//!
//! Turns the noisy, self-reported replies of independent worker nodes
//! into one consensus resolution per statement and one quality score per
//! worker.
//!
//! ## Overview
//!
//! A statement such as "Bitcoin will cross $100,000 by Dec 31" is sent
//! to a pool of workers. Each answers TRUE, FALSE or PENDING with a
//! confidence between 0 and 100 and a list of sources. This crate is the
//! synchronous, stateless part of the engine:
//!
//! - **Validation**: raw replies become typed [`WorkerResponse`] values
//!   or audit-ready [`Rejection`]s. A bad reply never aborts the batch.
//! - **Consensus**: confidence-weighted majority, with a deterministic
//!   tie-break (PENDING, then TRUE, then FALSE).
//! - **Scoring**: four factors (accuracy, calibration, consistency,
//!   source quality) combined 40/20/30/10 into a composite in `[0, 1]`.
//!
//! ## Threat Model
//!
//! ### Confident Liars
//! A worker that answers against consensus with high confidence loses on
//! accuracy, calibration and consistency at once.
//!
//! ### Lazy Workers
//! PENDING at 50% is treated as honest uncertainty: half accuracy credit
//! and full calibration. PENDING at 100% is not.
//!
//! ### Source Padding
//! Both source terms saturate, so listing twenty URLs earns nothing over
//! three reputable ones.
//!
//! ## Architecture
//!
//! ```text
//!  raw replies
//!       │
//!       ▼
//! ┌────────────┐   rejections
//! │ VALIDATOR  │──────────────┐
//! └─────┬──────┘              │
//!       ▼                     │
//! ┌────────────┐              │
//! │ CONSENSUS  │              │
//! └─────┬──────┘              │
//!       ▼                     ▼
//! ┌────────────┐      ┌─────────────────┐
//! │   SCORER   │─────▶│ ConsensusResult │
//! └────────────┘      └─────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use verity_consensus::{Council, RawReply, WorkerId};
//!
//! let council = Council::new();
//! let result = council.resolve(&statement, replies);
//! println!("{}", result.summary());
//! for (worker, score) in &result.scores {
//!     println!("worker {worker}: {score:.3}");
//! }
//! ```

pub mod consensus;
pub mod council;
pub mod error;
pub mod response;
pub mod scoring;
pub mod validator;

pub use consensus::{ConsensusCalculator, ConsensusOutcome, VoteTally};
pub use council::{ConsensusResult, Council};
pub use error::ConsensusError;
pub use response::{
    Confidence, Direction, Resolution, Statement, StatementId, WorkerId, WorkerResponse,
};
pub use scoring::factors::{Accuracy, Calibration, Consistency, SourceQuality};
pub use scoring::{
    Factor, MultiFactorScorer, ScoreCard, ScoringExclusion, ScoringReport, ScoringSettings,
    ScoringWeights,
};
pub use validator::{RawReply, RejectReason, Rejection, ResponseValidator, ValidationReport};

/// Result type for consensus operations.
pub type Result<T> = std::result::Result<T, ConsensusError>;
