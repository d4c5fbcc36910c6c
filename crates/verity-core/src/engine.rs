//! The engine facade.
//!
//! [`Engine`] is the library boundary consumed by an orchestration loop.
//! It owns the council, the reputation ledger and the ground-truth
//! tracker, and exposes the three external operations:
//!
//! | Direction | Operation |
//! |-----------|-----------|
//! | Inbound | [`Engine::process_statement`] |
//! | Inbound | [`Engine::record_official_resolution`] |
//! | Outbound | [`Engine::current_weights`] |

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, info, warn};
use verity_consensus::{ConsensusResult, Council, RawReply, Resolution, Statement, StatementId, WorkerId};
use verity_reputation::{Phase, Reputation, ReputationLedger, WeightVector};
use verity_truth::{GroundTruthTracker, RecordOutcome, TruthError};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::stats::{EngineStats, StatsSnapshot};
use crate::Result;

/// Consensus and reputation engine.
///
/// Safe to share across threads. Statements may be processed
/// concurrently; reputation updates are serialized by the ledger.
///
/// # Example
///
/// ```rust,ignore
/// let engine = Engine::new(config)?;
///
/// let result = engine.process_statement(&statement, replies)?;
/// println!("{}", result.summary());
///
/// engine.record_official_resolution(&statement.id, Resolution::True)?;
/// let weights = engine.current_weights(epoch)?;
/// ```
pub struct Engine {
    config: EngineConfig,
    council: Council,
    ledger: ReputationLedger,
    truth: GroundTruthTracker,
    bootstrap: WeightVector,
    results: Mutex<BTreeMap<StatementId, ConsensusResult>>,
    stats: EngineStats,
    #[cfg(test)]
    fail_next_apply: std::sync::atomic::AtomicBool,
}

impl Engine {
    /// Creates an engine from configuration.
    ///
    /// The configuration is validated before anything else is built.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration is invalid
    /// - The ground-truth database cannot be opened
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let council = Council::with_settings(&config.scoring, config.engine.max_consensus_sources)?;
        let truth = match &config.ground_truth.db_path {
            Some(path) => GroundTruthTracker::open(path)?,
            None => GroundTruthTracker::temporary()?,
        };
        let bootstrap = config.bootstrap_vector();

        info!(
            workers = bootstrap.len(),
            bootstrap_until = config.phases.bootstrap_until,
            merit_from = config.phases.merit_from,
            "engine initialized"
        );

        Ok(Self {
            config,
            council,
            ledger: ReputationLedger::new(),
            truth,
            bootstrap,
            results: Mutex::new(BTreeMap::new()),
            stats: EngineStats::default(),
            #[cfg(test)]
            fail_next_apply: std::sync::atomic::AtomicBool::new(false),
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn results(&self) -> Result<MutexGuard<'_, BTreeMap<StatementId, ConsensusResult>>> {
        self.results
            .lock()
            .map_err(|_| EngineError::Internal("result store lock poisoned".to_string()))
    }

    /// Resolves a statement from its raw replies and updates reputation.
    ///
    /// # Process
    ///
    /// 1. Validate, vote and score (no shared state touched)
    /// 2. Reserve the statement; a statement is committed once
    /// 3. Record accepted answers for ground-truth grading
    /// 4. Fold composite scores into the reputation ledger
    ///
    /// If step 3 or 4 fails the reservation is released, so the statement
    /// can be processed again. Answer records are keyed by worker and
    /// statement and the ledger applies a whole batch or nothing, so a
    /// retry never counts a score twice.
    ///
    /// # Errors
    ///
    /// - `EngineError::AlreadyProcessed` if a result is already committed
    /// - Reputation or ground-truth storage failures
    pub fn process_statement(&self, statement: &Statement, replies: Vec<RawReply>) -> Result<ConsensusResult> {
        if self.results()?.contains_key(&statement.id) {
            return Err(EngineError::AlreadyProcessed(statement.id.clone()));
        }

        let result = self.council.resolve(statement, replies);

        {
            let mut results = self.results()?;
            if results.contains_key(&statement.id) {
                return Err(EngineError::AlreadyProcessed(statement.id.clone()));
            }
            results.insert(statement.id.clone(), result.clone());
        }

        if let Err(e) = self.apply(statement, &result) {
            warn!(statement = %statement.id, error = %e, "commit failed, releasing statement");
            if let Ok(mut results) = self.results() {
                results.remove(&statement.id);
            }
            return Err(e);
        }

        self.stats.record_statement(
            result.is_definite(),
            result.total_queried,
            result.rejections.len(),
            result.scoring_exclusions.len(),
        );

        debug!(statement = %statement.id, summary = %result.summary(), "statement committed");
        Ok(result)
    }

    fn apply(&self, statement: &Statement, result: &ConsensusResult) -> Result<()> {
        #[cfg(test)]
        if self.fail_next_apply.swap(false, std::sync::atomic::Ordering::SeqCst) {
            return Err(EngineError::Internal("injected storage failure".to_string()));
        }

        for response in result
            .responses
            .iter()
            .filter(|r| result.scores.contains_key(&r.worker))
        {
            self.truth
                .observe(&statement.id, response.worker, response.resolution)?;
        }

        self.ledger.record(&result.scores)?;
        Ok(())
    }

    /// Records an official resolution from the ground-truth authority.
    ///
    /// # Errors
    ///
    /// Conflicting or PENDING resolutions are refused; the stored value
    /// never changes.
    pub fn record_official_resolution(
        &self,
        statement: &StatementId,
        resolution: Resolution,
    ) -> Result<RecordOutcome> {
        match self.truth.record(statement, resolution) {
            Ok(outcome) => {
                if outcome == RecordOutcome::Recorded {
                    self.stats.record_official();
                }
                Ok(outcome)
            }
            Err(e) => {
                if matches!(e, TruthError::Conflict { .. }) {
                    self.stats.record_conflict();
                }
                Err(e.into())
            }
        }
    }

    /// Merit distribution over workers with a reputation entry.
    ///
    /// A worker with at least `min_samples` graded answers has its
    /// reputation blended with its ground-truth accuracy:
    /// `(1 - blend) * reputation + blend * accuracy`.
    pub fn merit_vector(&self) -> Result<WeightVector> {
        let snapshot = self.ledger.snapshot()?;
        let graded = self.truth.accuracies()?;
        let blend = self.config.ground_truth.blend;
        let min_samples = self.config.ground_truth.min_samples;

        let merit: WeightVector = snapshot
            .iter()
            .map(|(&worker, rep)| {
                let value = match graded.get(&worker) {
                    Some(g) if g.graded >= min_samples => (1.0 - blend) * rep.mean + blend * g.accuracy(),
                    _ => rep.mean,
                };
                (worker, value)
            })
            .collect();

        Ok(merit.normalized())
    }

    /// Computes the weight vector for an epoch.
    ///
    /// Reads a consistent snapshot of reputation and writes nothing back.
    pub fn current_weights(&self, epoch: u64) -> Result<WeightVector> {
        let merit = self.merit_vector()?;
        let weights = self.config.phases.weights(epoch, &self.bootstrap, &merit);
        self.stats.record_weight_update();

        if weights.is_empty() {
            warn!(epoch, "no weight data available");
        } else {
            info!(epoch, phase = %self.phase(epoch), workers = weights.len(), "weights computed");
        }
        Ok(weights)
    }

    /// Returns the phase of an epoch.
    pub fn phase(&self, epoch: u64) -> Phase {
        self.config.phases.phase(epoch)
    }

    /// Returns the committed result of a statement.
    pub fn result(&self, statement: &StatementId) -> Result<Option<ConsensusResult>> {
        Ok(self.results()?.get(statement).cloned())
    }

    /// Returns one worker's reputation.
    pub fn reputation(&self, worker: WorkerId) -> Result<Option<Reputation>> {
        Ok(self.ledger.get(worker)?)
    }

    /// Returns a consistent copy of every worker's reputation.
    pub fn reputations(&self) -> Result<BTreeMap<WorkerId, Reputation>> {
        Ok(self.ledger.snapshot()?)
    }

    /// Returns the ground-truth tracker.
    pub fn ground_truth(&self) -> &GroundTruthTracker {
        &self.truth
    }

    /// Reads the engine counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("bootstrap_workers", &self.bootstrap.len())
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use serde_json::json;

    fn engine() -> Engine {
        let config = EngineConfig::default()
            .with_uniform_allocation(&[WorkerId(1), WorkerId(2), WorkerId(3)]);
        Engine::new(config).unwrap()
    }

    fn statement(id: &str) -> Statement {
        Statement::new(id, "test statement", Utc::now() + Duration::hours(1))
    }

    fn reply(worker: u32, resolution: &str, confidence: f64) -> RawReply {
        RawReply::new(
            WorkerId(worker),
            json!({"resolution": resolution, "confidence": confidence}),
        )
    }

    #[test]
    fn test_invalid_config_builds_nothing() {
        let err = Engine::new(EngineConfig::default()).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_process_updates_ledger() {
        let engine = engine();
        let result = engine
            .process_statement(&statement("s"), vec![reply(1, "TRUE", 90.0), reply(2, "FALSE", 60.0)])
            .unwrap();

        assert_eq!(result.resolution, Resolution::True);
        let one = engine.reputation(WorkerId(1)).unwrap().unwrap();
        assert_eq!(one.count, 1);
        assert!((one.mean - result.scores[&WorkerId(1)]).abs() < 1e-12);
        assert_eq!(engine.reputation(WorkerId(3)).unwrap(), None);
    }

    #[test]
    fn test_statement_is_committed_once() {
        let engine = engine();
        engine
            .process_statement(&statement("s"), vec![reply(1, "TRUE", 90.0)])
            .unwrap();
        let err = engine
            .process_statement(&statement("s"), vec![reply(1, "FALSE", 90.0)])
            .unwrap_err();
        assert!(matches!(err, EngineError::AlreadyProcessed(_)));

        let stored = engine.result(&StatementId::from("s")).unwrap().unwrap();
        assert_eq!(stored.resolution, Resolution::True);
        assert_eq!(engine.reputation(WorkerId(1)).unwrap().unwrap().count, 1);
    }

    #[test]
    fn test_empty_round_is_pending_zero() {
        let engine = engine();
        let result = engine
            .process_statement(
                &statement("quiet"),
                vec![RawReply::missing(WorkerId(1)), RawReply::missing(WorkerId(2))],
            )
            .unwrap();
        assert_eq!(result.resolution, Resolution::Pending);
        assert_eq!(result.confidence, 0.0);
        assert!(engine.reputations().unwrap().is_empty());
        assert_eq!(engine.stats().replies_rejected, 2);
    }

    #[test]
    fn test_failed_commit_can_be_retried() {
        let engine = engine();
        let s = statement("flaky");
        let replies = || vec![reply(1, "TRUE", 90.0), reply(2, "FALSE", 60.0)];

        engine
            .fail_next_apply
            .store(true, std::sync::atomic::Ordering::SeqCst);
        let err = engine.process_statement(&s, replies()).unwrap_err();
        assert!(matches!(err, EngineError::Internal(_)));
        assert_eq!(engine.result(&s.id).unwrap(), None);
        assert!(engine.reputations().unwrap().is_empty());
        assert_eq!(engine.stats().statements_processed, 0);

        let result = engine.process_statement(&s, replies()).unwrap();
        assert_eq!(result.resolution, Resolution::True);
        assert_eq!(engine.reputation(WorkerId(1)).unwrap().unwrap().count, 1);
        assert!(engine.result(&s.id).unwrap().is_some());

        engine.record_official_resolution(&s.id, Resolution::True).unwrap();
        let graded = engine.ground_truth().accuracy(WorkerId(2)).unwrap().unwrap();
        assert_eq!(graded.graded, 1);
        assert_eq!(graded.correct, 0);
    }

    #[test]
    fn test_conflict_is_counted() {
        let engine = engine();
        let id = StatementId::from("s");
        assert_eq!(
            engine.record_official_resolution(&id, Resolution::True).unwrap(),
            RecordOutcome::Recorded
        );
        assert_eq!(
            engine.record_official_resolution(&id, Resolution::True).unwrap(),
            RecordOutcome::AlreadyRecorded
        );
        assert!(engine.record_official_resolution(&id, Resolution::False).is_err());

        let stats = engine.stats();
        assert_eq!(stats.official_resolutions, 1);
        assert_eq!(stats.ground_truth_conflicts, 1);
    }

    #[test]
    fn test_bootstrap_weights_before_any_data() {
        let engine = engine();
        let weights = engine.current_weights(60).unwrap();
        assert_eq!(weights.len(), 3);
        assert!(weights.is_normalized());
    }
}
