//! Cumulative worker reputation.
//!
//! The ledger is the engine's only shared mutable state. Every update
//! for one statement is applied under a single lock, so concurrent
//! statements never interleave partial updates to a worker's running
//! mean. Readers take a consistent snapshot under the same lock.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::debug;
use verity_consensus::WorkerId;

use crate::error::{ReputationError, Result};
use crate::weights::WeightVector;

/// Running mean of one worker's composite scores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Reputation {
    /// Arithmetic mean of all composite scores so far.
    pub mean: f64,
    /// Number of statements scored.
    pub count: u64,
}

impl Reputation {
    /// Folds one more score into the mean.
    pub fn update(&mut self, score: f64) {
        self.count += 1;
        self.mean += (score - self.mean) / self.count as f64;
    }
}

/// Owned store of per-worker reputation.
///
/// Workers appear only after their first scored response.
#[derive(Debug, Default)]
pub struct ReputationLedger {
    entries: Mutex<BTreeMap<WorkerId, Reputation>>,
}

impl ReputationLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<WorkerId, Reputation>>> {
        self.entries.lock().map_err(|_| ReputationError::LockPoisoned)
    }

    /// Applies one statement's composite scores.
    ///
    /// All scores are checked before any is applied.
    ///
    /// # Errors
    ///
    /// - [`ReputationError::InvalidScore`] if a score is outside `[0, 1]`
    /// - [`ReputationError::LockPoisoned`] if a previous writer panicked
    pub fn record(&self, scores: &BTreeMap<WorkerId, f64>) -> Result<()> {
        for (&worker, &score) in scores {
            if !score.is_finite() || !(0.0..=1.0).contains(&score) {
                return Err(ReputationError::InvalidScore {
                    worker: worker.0,
                    score,
                });
            }
        }

        let mut entries = self.lock()?;
        for (&worker, &score) in scores {
            let entry = entries.entry(worker).or_default();
            entry.update(score);
            debug!(worker = %worker, score, mean = entry.mean, count = entry.count, "reputation updated");
        }
        Ok(())
    }

    /// Returns one worker's reputation.
    pub fn get(&self, worker: WorkerId) -> Result<Option<Reputation>> {
        Ok(self.lock()?.get(&worker).copied())
    }

    /// Returns a consistent copy of the whole ledger.
    pub fn snapshot(&self) -> Result<BTreeMap<WorkerId, Reputation>> {
        Ok(self.lock()?.clone())
    }

    /// Number of workers with a reputation entry.
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    /// Returns true if no worker has been scored yet.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    /// Normalized distribution of reputation means.
    ///
    /// Empty when the ledger is empty or every mean is zero.
    pub fn merit_vector(&self) -> Result<WeightVector> {
        let snapshot = self.snapshot()?;
        Ok(merit_from_snapshot(&snapshot))
    }
}

/// Normalizes the means of a ledger snapshot into a weight vector.
pub fn merit_from_snapshot(snapshot: &BTreeMap<WorkerId, Reputation>) -> WeightVector {
    snapshot
        .iter()
        .map(|(&worker, rep)| (worker, rep.mean))
        .collect::<WeightVector>()
        .normalized()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn scores(entries: &[(u32, f64)]) -> BTreeMap<WorkerId, f64> {
        entries.iter().map(|&(w, s)| (WorkerId(w), s)).collect()
    }

    #[test]
    fn test_running_mean() {
        let mut rep = Reputation::default();
        rep.update(1.0);
        rep.update(0.0);
        rep.update(0.5);
        assert_eq!(rep.count, 3);
        assert!((rep.mean - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_record_creates_entries() {
        let ledger = ReputationLedger::new();
        assert!(ledger.is_empty().unwrap());

        ledger.record(&scores(&[(1, 0.8), (2, 0.2)])).unwrap();
        ledger.record(&scores(&[(1, 0.4)])).unwrap();

        let one = ledger.get(WorkerId(1)).unwrap().unwrap();
        assert_eq!(one.count, 2);
        assert!((one.mean - 0.6).abs() < 1e-12);
        assert_eq!(ledger.get(WorkerId(3)).unwrap(), None);
        assert_eq!(ledger.len().unwrap(), 2);
    }

    #[test]
    fn test_invalid_score_applies_nothing() {
        let ledger = ReputationLedger::new();
        let err = ledger.record(&scores(&[(1, 0.5), (2, 1.5)])).unwrap_err();
        assert!(matches!(err, ReputationError::InvalidScore { worker: 2, .. }));
        assert!(ledger.is_empty().unwrap());

        assert!(ledger.record(&scores(&[(1, f64::NAN)])).is_err());
        assert!(ledger.is_empty().unwrap());
    }

    #[test]
    fn test_merit_vector_normalizes_means() {
        let ledger = ReputationLedger::new();
        ledger.record(&scores(&[(1, 0.6), (2, 0.2), (3, 0.0)])).unwrap();

        let merit = ledger.merit_vector().unwrap();
        assert!((merit.get(WorkerId(1)).unwrap() - 0.75).abs() < 1e-12);
        assert!((merit.get(WorkerId(2)).unwrap() - 0.25).abs() < 1e-12);
        assert_eq!(merit.get(WorkerId(3)), None);
        assert!(merit.is_normalized());
    }

    #[test]
    fn test_merit_vector_empty_when_all_zero() {
        let ledger = ReputationLedger::new();
        assert!(ledger.merit_vector().unwrap().is_empty());
        ledger.record(&scores(&[(1, 0.0)])).unwrap();
        assert!(ledger.merit_vector().unwrap().is_empty());
    }

    #[test]
    fn test_concurrent_records_are_serialized() {
        let ledger = Arc::new(ReputationLedger::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                thread::spawn(move || {
                    for _ in 0..100 {
                        ledger.record(&scores(&[(1, 1.0), (2, 0.0)])).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = ledger.snapshot().unwrap();
        assert_eq!(snapshot[&WorkerId(1)].count, 800);
        assert_eq!(snapshot[&WorkerId(2)].count, 800);
        assert!((snapshot[&WorkerId(1)].mean - 1.0).abs() < 1e-12);
    }
}
