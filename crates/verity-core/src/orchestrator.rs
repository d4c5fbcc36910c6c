//! Orchestration loop.
//!
//! Drives statements through dispatch and the engine, and every
//! `weight_update_interval` statements hands the epoch's weight vector to
//! a [`Settlement`] sink before advancing the epoch.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use verity_consensus::{ConsensusResult, Statement};
use verity_reputation::WeightVector;

use crate::dispatch::{dispatch_round, Worker};
use crate::engine::Engine;
use crate::Result;

/// Consumer of per-epoch weight vectors, e.g. reward settlement.
pub trait Settlement {
    /// Receives the final weight vector of an epoch.
    fn settle(&mut self, epoch: u64, weights: &WeightVector);
}

/// Settlement sink that keeps every vector it receives.
#[derive(Debug, Clone, Default)]
pub struct SettlementLog {
    /// `(epoch, weights)` in settlement order.
    pub entries: Vec<(u64, WeightVector)>,
}

impl Settlement for SettlementLog {
    fn settle(&mut self, epoch: u64, weights: &WeightVector) {
        self.entries.push((epoch, weights.clone()));
    }
}

/// Runs statements against a worker pool.
pub struct Orchestrator<W: Worker, S: Settlement> {
    engine: Arc<Engine>,
    workers: Vec<Arc<W>>,
    settlement: S,
    epoch: u64,
    since_update: usize,
    interval: usize,
    timeout: Duration,
}

impl<W: Worker, S: Settlement> Orchestrator<W, S> {
    /// Creates an orchestrator starting at epoch 0.
    ///
    /// Cadence and dispatch timeout come from the engine's configuration.
    pub fn new(engine: Arc<Engine>, workers: Vec<Arc<W>>, settlement: S) -> Self {
        let interval = engine.config().engine.weight_update_interval.max(1);
        let timeout = engine.config().engine.dispatch_timeout();
        Self {
            engine,
            workers,
            settlement,
            epoch: 0,
            since_update: 0,
            interval,
            timeout,
        }
    }

    /// Overrides the dispatch timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The current epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// The engine being driven.
    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// The settlement sink.
    pub fn settlement(&self) -> &S {
        &self.settlement
    }

    /// Consumes the orchestrator, returning the settlement sink.
    pub fn into_settlement(self) -> S {
        self.settlement
    }

    /// Dispatches one statement, commits its result and settles the epoch
    /// when the interval is reached.
    pub async fn run_statement(&mut self, statement: &Statement) -> Result<ConsensusResult> {
        let replies = dispatch_round(&self.workers, statement, self.timeout).await;
        let result = self.engine.process_statement(statement, replies)?;

        self.since_update += 1;
        if self.since_update >= self.interval {
            self.settle_epoch()?;
        }
        Ok(result)
    }

    /// Runs statements in order.
    pub async fn run<I>(&mut self, statements: I) -> Result<Vec<ConsensusResult>>
    where
        I: IntoIterator<Item = Statement>,
    {
        let mut results = Vec::new();
        for statement in statements {
            results.push(self.run_statement(&statement).await?);
        }
        Ok(results)
    }

    /// Computes the current epoch's weights, hands them to settlement and
    /// advances the epoch.
    pub fn settle_epoch(&mut self) -> Result<WeightVector> {
        let weights = self.engine.current_weights(self.epoch)?;
        self.settlement.settle(self.epoch, &weights);

        info!(
            epoch = self.epoch,
            phase = %self.engine.phase(self.epoch),
            workers = weights.len(),
            "epoch settled"
        );

        self.epoch += 1;
        self.since_update = 0;
        Ok(weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use chrono::{Duration as ChronoDuration, Utc};
    use serde_json::{json, Value};
    use verity_consensus::WorkerId;

    struct Fixed {
        id: WorkerId,
        reply: Value,
    }

    impl Worker for Fixed {
        fn id(&self) -> WorkerId {
            self.id
        }

        async fn query(&self, _statement: Statement) -> Option<Value> {
            Some(self.reply.clone())
        }
    }

    fn pool() -> Vec<Arc<Fixed>> {
        vec![
            Arc::new(Fixed {
                id: WorkerId(1),
                reply: json!({"resolution": "TRUE", "confidence": 90, "sources": ["reuters"]}),
            }),
            Arc::new(Fixed {
                id: WorkerId(2),
                reply: json!({"resolution": "FALSE", "confidence": 95}),
            }),
            Arc::new(Fixed {
                id: WorkerId(3),
                reply: json!({"resolution": "TRUE", "confidence": 85}),
            }),
        ]
    }

    fn engine(interval: usize) -> Arc<Engine> {
        let mut config = EngineConfig::default()
            .with_uniform_allocation(&[WorkerId(1), WorkerId(2), WorkerId(3)]);
        config.engine.weight_update_interval = interval;
        Arc::new(Engine::new(config).unwrap())
    }

    fn statements(n: usize) -> Vec<Statement> {
        (0..n)
            .map(|i| {
                Statement::new(
                    format!("s-{}", i),
                    "test",
                    Utc::now() + ChronoDuration::hours(1),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_settles_every_interval() {
        let mut orchestrator = Orchestrator::new(engine(2), pool(), SettlementLog::default());
        let results = orchestrator.run(statements(5)).await.unwrap();

        assert_eq!(results.len(), 5);
        assert_eq!(orchestrator.epoch(), 2);
        let log = orchestrator.settlement();
        assert_eq!(log.entries.len(), 2);
        assert_eq!(log.entries[0].0, 0);
        assert_eq!(log.entries[1].0, 1);
        assert!(log.entries.iter().all(|(_, w)| w.is_normalized()));
    }

    #[tokio::test]
    async fn test_contrarian_loses_reputation() {
        let engine = engine(1);
        let mut orchestrator = Orchestrator::new(Arc::clone(&engine), pool(), SettlementLog::default());
        orchestrator.run(statements(3)).await.unwrap();

        let honest = engine.reputation(WorkerId(1)).unwrap().unwrap();
        let contrarian = engine.reputation(WorkerId(2)).unwrap().unwrap();
        assert_eq!(honest.count, 3);
        assert!(honest.mean > contrarian.mean);
    }
}
