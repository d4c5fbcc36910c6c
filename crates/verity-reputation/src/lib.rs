//! # Verity Reputation
//!
//! Turns per-statement composite scores into the reward-weight vector
//! handed to settlement.
//!
//! ## Overview
//!
//! - [`ReputationLedger`] keeps a running mean of each worker's composite
//!   scores. It is the engine's only shared mutable state and serializes
//!   all writers behind one lock.
//! - [`WeightVector`] is a distribution over workers summing to 1, or
//!   empty when no data exists yet.
//! - [`PhaseSchedule`] derives the [`Phase`] of an epoch and blends the
//!   fixed bootstrap allocation with the merit vector.
//!
//! ## Example
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use verity_consensus::WorkerId;
//! use verity_reputation::{PhaseSchedule, ReputationLedger, WeightVector};
//!
//! let ledger = ReputationLedger::new();
//! let mut scores = BTreeMap::new();
//! scores.insert(WorkerId(1), 0.9);
//! scores.insert(WorkerId(2), 0.3);
//! ledger.record(&scores)?;
//!
//! let bootstrap: WeightVector = [(WorkerId(1), 0.5), (WorkerId(2), 0.5)].into_iter().collect();
//! let weights = PhaseSchedule::new().weights(60, &bootstrap, &ledger.merit_vector()?);
//! assert!(weights.get(WorkerId(1)).unwrap() > weights.get(WorkerId(2)).unwrap());
//! # Ok::<(), verity_reputation::ReputationError>(())
//! ```

pub mod epoch;
pub mod error;
pub mod ledger;
pub mod weights;

pub use epoch::{blend, Phase, PhaseSchedule};
pub use error::{ReputationError, Result};
pub use ledger::{merit_from_snapshot, Reputation, ReputationLedger};
pub use weights::WeightVector;
