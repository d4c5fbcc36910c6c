//! # Verity Ground Truth
//!
//! Stores officially confirmed statement resolutions and grades worker
//! answers against them.
//!
//! ## Overview
//!
//! A statement's confidence-weighted consensus is only an estimate. The
//! [`GroundTruthTracker`] gives the merit phase a slower-moving signal
//! anchored outside the worker pool:
//!
//! - Official resolutions are write-once. Re-recording the same value is
//!   a no-op; a different value is rejected and logged.
//! - Every accepted worker answer is observed, so resolutions that arrive
//!   late still grade earlier answers.
//! - [`GroundTruthTracker::accuracy`] is the fraction of a worker's
//!   graded answers that matched.
//!
//! ## Persistence
//!
//! Backed by sled. Use [`GroundTruthTracker::open`] for a durable store
//! or [`GroundTruthTracker::temporary`] for an in-memory one.

pub mod error;
pub mod storage;
pub mod tracker;

pub use error::{Result, TruthError};
pub use tracker::{GradedAccuracy, GroundTruthTracker, RecordOutcome};
