//! Ground-truth tracker.
//!
//! Official resolutions arrive from an external authority at any time,
//! possibly long after consensus was computed. The tracker keeps them
//! write-once and grades each worker's observed answers against them.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use verity_consensus::{Resolution, StatementId, WorkerId};

use crate::error::{Result, TruthError};
use crate::storage::{Insert, Storage};

/// Result of recording an official resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordOutcome {
    /// First resolution for the statement.
    Recorded,
    /// The same resolution was already on record; nothing changed.
    AlreadyRecorded,
}

/// A worker's record against official resolutions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradedAccuracy {
    /// Answers matching the official resolution.
    pub correct: u64,
    /// Answers for statements with an official resolution.
    pub graded: u64,
}

impl GradedAccuracy {
    /// Fraction of graded answers that were correct.
    pub fn accuracy(&self) -> f64 {
        if self.graded == 0 {
            0.0
        } else {
            self.correct as f64 / self.graded as f64
        }
    }

    fn grade(&mut self, answer: Resolution, official: Resolution) {
        self.graded += 1;
        if answer == official {
            self.correct += 1;
        }
    }
}

/// Write-once store of official resolutions.
///
/// # Example
///
/// ```rust
/// use verity_consensus::{Resolution, StatementId, WorkerId};
/// use verity_truth::{GroundTruthTracker, RecordOutcome};
///
/// let tracker = GroundTruthTracker::temporary()?;
/// let id = StatementId::from("btc-100k");
///
/// tracker.observe(&id, WorkerId(1), Resolution::True)?;
/// assert_eq!(tracker.record(&id, Resolution::True)?, RecordOutcome::Recorded);
/// assert_eq!(tracker.record(&id, Resolution::True)?, RecordOutcome::AlreadyRecorded);
/// assert!(tracker.record(&id, Resolution::False).is_err());
///
/// let graded = tracker.accuracy(WorkerId(1))?.unwrap();
/// assert_eq!(graded.accuracy(), 1.0);
/// # Ok::<(), verity_truth::TruthError>(())
/// ```
#[derive(Debug, Clone)]
pub struct GroundTruthTracker {
    storage: Storage,
}

impl GroundTruthTracker {
    /// Opens or creates a persistent tracker at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            storage: Storage::open(path)?,
        })
    }

    /// Creates an in-memory tracker.
    pub fn temporary() -> Result<Self> {
        Ok(Self {
            storage: Storage::temporary()?,
        })
    }

    /// Records the official resolution of a statement.
    ///
    /// Recording the same value twice is a no-op.
    ///
    /// # Errors
    ///
    /// - [`TruthError::IndefiniteResolution`] for PENDING
    /// - [`TruthError::Conflict`] if a different value is on record; the
    ///   stored value is kept
    pub fn record(&self, statement: &StatementId, resolution: Resolution) -> Result<RecordOutcome> {
        if !resolution.is_definite() {
            warn!(statement = %statement, "refusing PENDING as official resolution");
            return Err(TruthError::IndefiniteResolution(statement.to_string()));
        }

        match self.storage.insert_official(statement, resolution)? {
            Insert::Inserted => {
                info!(statement = %statement, %resolution, "official resolution recorded");
                Ok(RecordOutcome::Recorded)
            }
            Insert::Unchanged => {
                debug!(statement = %statement, %resolution, "official resolution already recorded");
                Ok(RecordOutcome::AlreadyRecorded)
            }
            Insert::Conflict(stored) => {
                warn!(
                    statement = %statement,
                    %stored,
                    proposed = %resolution,
                    "conflicting official resolution rejected"
                );
                Err(TruthError::Conflict {
                    statement: statement.to_string(),
                    stored,
                    proposed: resolution,
                })
            }
        }
    }

    /// Returns the official resolution of a statement, if recorded.
    pub fn official(&self, statement: &StatementId) -> Result<Option<Resolution>> {
        self.storage.load_official(statement)
    }

    /// Records a worker's accepted answer for later grading.
    pub fn observe(&self, statement: &StatementId, worker: WorkerId, answer: Resolution) -> Result<()> {
        self.storage.store_answer(worker, statement, answer)
    }

    /// Grades one worker's answers.
    ///
    /// `None` if none of the worker's answers has an official resolution.
    pub fn accuracy(&self, worker: WorkerId) -> Result<Option<GradedAccuracy>> {
        let mut graded = GradedAccuracy::default();
        for (statement, answer) in self.storage.load_answers(worker)? {
            if let Some(official) = self.storage.load_official(&statement)? {
                graded.grade(answer, official);
            }
        }
        Ok((graded.graded > 0).then_some(graded))
    }

    /// Grades every worker with at least one graded answer.
    pub fn accuracies(&self) -> Result<BTreeMap<WorkerId, GradedAccuracy>> {
        let mut officials: BTreeMap<StatementId, Option<Resolution>> = BTreeMap::new();
        let mut grades: BTreeMap<WorkerId, GradedAccuracy> = BTreeMap::new();

        for (worker, statement, answer) in self.storage.load_all_answers()? {
            let official = match officials.get(&statement) {
                Some(cached) => *cached,
                None => {
                    let loaded = self.storage.load_official(&statement)?;
                    officials.insert(statement, loaded);
                    loaded
                }
            };
            if let Some(official) = official {
                grades.entry(worker).or_default().grade(answer, official);
            }
        }

        Ok(grades)
    }

    /// Number of statements with an official resolution.
    pub fn resolved_count(&self) -> usize {
        self.storage.official_count()
    }

    /// Flushes pending writes to disk.
    pub fn flush(&self) -> Result<usize> {
        self.storage.flush()
    }
}
