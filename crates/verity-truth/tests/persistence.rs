//! # Ground Truth Persistence Tests
//!
//! | Property | Test |
//! |----------|------|
//! | Resolutions survive reopen | `test_resolutions_survive_reopen` |
//! | Write-once holds across reopen | `test_conflict_after_reopen` |
//! | Idempotent re-record | `test_idempotent_record` |

use tempfile::TempDir;
use verity_consensus::{Resolution, StatementId, WorkerId};
use verity_truth::{GroundTruthTracker, RecordOutcome, TruthError};

#[test]
fn test_resolutions_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("truth.db");
    let id = StatementId::from("eth-5k");

    {
        let tracker = GroundTruthTracker::open(&path).unwrap();
        tracker.observe(&id, WorkerId(1), Resolution::False).unwrap();
        tracker.record(&id, Resolution::False).unwrap();
        tracker.flush().unwrap();
    }

    let tracker = GroundTruthTracker::open(&path).unwrap();
    assert_eq!(tracker.official(&id).unwrap(), Some(Resolution::False));
    let graded = tracker.accuracy(WorkerId(1)).unwrap().unwrap();
    assert_eq!(graded.correct, 1);
    assert_eq!(graded.graded, 1);
}

#[test]
fn test_conflict_after_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("truth.db");
    let id = StatementId::from("btc-100k");

    {
        let tracker = GroundTruthTracker::open(&path).unwrap();
        tracker.record(&id, Resolution::True).unwrap();
        tracker.flush().unwrap();
    }

    let tracker = GroundTruthTracker::open(&path).unwrap();
    let err = tracker.record(&id, Resolution::False).unwrap_err();
    assert!(matches!(err, TruthError::Conflict { .. }));
    assert_eq!(tracker.official(&id).unwrap(), Some(Resolution::True));
}

#[test]
fn test_idempotent_record() {
    let tracker = GroundTruthTracker::temporary().unwrap();
    let id = StatementId::from("s");

    assert_eq!(tracker.record(&id, Resolution::True).unwrap(), RecordOutcome::Recorded);
    for _ in 0..3 {
        assert_eq!(
            tracker.record(&id, Resolution::True).unwrap(),
            RecordOutcome::AlreadyRecorded
        );
    }
    assert_eq!(tracker.resolved_count(), 1);
}
