//! Multi-factor worker scoring.
//!
//! Defines the [`Factor`] trait and the [`MultiFactorScorer`] that
//! combines four factors into one composite score per worker and
//! statement.

pub mod factors;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ConsensusError;
use crate::response::{Confidence, Resolution, StatementId, WorkerId, WorkerResponse};
use factors::{Accuracy, Calibration, Consistency, SourceQuality};

/// Tolerance for the weight sum check.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Relative weights of the four factors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Weight of agreement with consensus.
    pub accuracy: f64,
    /// Weight of confidence calibration.
    pub calibration: f64,
    /// Weight of agreement with high-confidence peers.
    pub consistency: f64,
    /// Weight of evidence quality.
    pub source_quality: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            accuracy: 0.40,
            calibration: 0.20,
            consistency: 0.30,
            source_quality: 0.10,
        }
    }
}

impl ScoringWeights {
    /// Sum of the four weights.
    pub fn sum(&self) -> f64 {
        self.accuracy + self.calibration + self.consistency + self.source_quality
    }

    /// Checks that every weight is finite and non-negative and that they
    /// sum to 1.
    ///
    /// # Errors
    ///
    /// Returns [`ConsensusError::InvalidWeights`] describing the first
    /// problem found.
    pub fn validate(&self) -> Result<(), ConsensusError> {
        let named = [
            ("accuracy", self.accuracy),
            ("calibration", self.calibration),
            ("consistency", self.consistency),
            ("source_quality", self.source_quality),
        ];
        for (name, weight) in named {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConsensusError::InvalidWeights(format!(
                    "{} weight {} must be finite and non-negative",
                    name, weight
                )));
            }
        }

        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConsensusError::InvalidWeights(format!(
                "weights sum to {}, expected 1",
                sum
            )));
        }
        Ok(())
    }
}

/// Scorer settings, as loaded from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringSettings {
    /// Factor weights.
    pub weights: ScoringWeights,
    /// Allow-list of recognized reputable source names.
    pub reputable_sources: Vec<String>,
    /// Peers above this confidence (percent) count for consistency.
    pub high_confidence_threshold: f64,
    /// Source count at which the count term saturates.
    pub source_saturation: usize,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            reputable_sources: [
                "coingecko",
                "coinmarketcap",
                "yahoo",
                "bloomberg",
                "reuters",
                "binance",
                "coinbase",
                "kraken",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            high_confidence_threshold: 80.0,
            source_saturation: 3,
        }
    }
}

impl ScoringSettings {
    /// Validates weights, threshold and saturation.
    pub fn validate(&self) -> Result<(), ConsensusError> {
        self.weights.validate()?;
        if Confidence::new(self.high_confidence_threshold).is_err() {
            return Err(ConsensusError::InvalidWeights(format!(
                "high confidence threshold {} is outside [0, 100]",
                self.high_confidence_threshold
            )));
        }
        if self.source_saturation == 0 {
            return Err(ConsensusError::InvalidWeights(
                "source saturation must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Everything a factor sees when scoring one response.
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
    /// The response being scored.
    pub response: &'a WorkerResponse,
    /// The statement's consensus resolution.
    pub consensus: Resolution,
    /// All valid responses for the statement, including `response`.
    pub peers: &'a [WorkerResponse],
}

/// One dimension of worker quality.
///
/// # Implementors
///
/// - [`factors::Accuracy`]
/// - [`factors::Calibration`]
/// - [`factors::Consistency`]
/// - [`factors::SourceQuality`]
pub trait Factor: Send + Sync {
    /// Returns the factor name used in audit output.
    fn name(&self) -> &str;

    /// Scores the response, in `[0, 1]`.
    fn score(&self, ctx: &ScoringContext<'_>) -> f64;
}

/// Per-worker audit record for one statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    /// The scored worker.
    pub worker: WorkerId,
    /// Accuracy sub-score.
    pub accuracy: f64,
    /// Calibration sub-score.
    pub calibration: f64,
    /// Consistency sub-score.
    pub consistency: f64,
    /// Source quality sub-score.
    pub source_quality: f64,
    /// Weighted combination of the four, in `[0, 1]`.
    pub composite: f64,
}

/// A response the scorer refused to score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringExclusion {
    /// The excluded worker.
    pub worker: WorkerId,
    /// The failed precondition.
    pub reason: String,
}

/// Scores produced for one statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringReport {
    /// Score cards by worker.
    pub cards: BTreeMap<WorkerId, ScoreCard>,
    /// Responses excluded from scoring.
    pub exclusions: Vec<ScoringExclusion>,
}

impl ScoringReport {
    /// Composite score per scored worker.
    pub fn composites(&self) -> BTreeMap<WorkerId, f64> {
        self.cards
            .iter()
            .map(|(&worker, card)| (worker, card.composite))
            .collect()
    }
}

/// Combines the four factors into a composite score.
#[derive(Debug, Clone)]
pub struct MultiFactorScorer {
    weights: ScoringWeights,
    accuracy: Accuracy,
    calibration: Calibration,
    consistency: Consistency,
    source_quality: SourceQuality,
}

impl Default for MultiFactorScorer {
    fn default() -> Self {
        Self::build(&ScoringSettings::default())
    }
}

impl MultiFactorScorer {
    /// Creates a scorer from validated settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConsensusError::InvalidWeights`] if the settings do not
    /// validate.
    pub fn new(settings: &ScoringSettings) -> Result<Self, ConsensusError> {
        settings.validate()?;
        Ok(Self::build(settings))
    }

    fn build(settings: &ScoringSettings) -> Self {
        Self {
            weights: settings.weights,
            accuracy: Accuracy,
            calibration: Calibration,
            consistency: Consistency::new(settings.high_confidence_threshold),
            source_quality: SourceQuality::new(
                settings.source_saturation,
                &settings.reputable_sources,
            ),
        }
    }

    /// Returns the factor weights.
    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Scores one response against the statement's consensus.
    ///
    /// # Errors
    ///
    /// - [`ConsensusError::StatementMismatch`] if the response belongs to
    ///   a different statement
    /// - [`ConsensusError::ScoringPrecondition`] if the confidence is out
    ///   of range or the integrity proof no longer matches
    pub fn score(
        &self,
        statement_id: &StatementId,
        response: &WorkerResponse,
        consensus: Resolution,
        peers: &[WorkerResponse],
    ) -> Result<ScoreCard, ConsensusError> {
        self.check_preconditions(statement_id, response)?;

        let ctx = ScoringContext {
            response,
            consensus,
            peers,
        };

        let accuracy = self.accuracy.score(&ctx);
        let calibration = self.calibration.score(&ctx);
        let consistency = self.consistency.score(&ctx);
        let source_quality = self.source_quality.score(&ctx);

        let composite = (self.weights.accuracy * accuracy
            + self.weights.calibration * calibration
            + self.weights.consistency * consistency
            + self.weights.source_quality * source_quality)
            .clamp(0.0, 1.0);

        debug!(
            worker = %response.worker,
            accuracy,
            calibration,
            consistency,
            source_quality,
            composite,
            "scored response"
        );

        Ok(ScoreCard {
            worker: response.worker,
            accuracy,
            calibration,
            consistency,
            source_quality,
            composite,
        })
    }

    /// Scores every response for a statement.
    ///
    /// Responses failing a precondition are excluded and listed in the
    /// report, never zero-scored.
    pub fn score_all(
        &self,
        statement_id: &StatementId,
        consensus: Resolution,
        responses: &[WorkerResponse],
    ) -> ScoringReport {
        let mut report = ScoringReport::default();

        for response in responses {
            match self.score(statement_id, response, consensus, responses) {
                Ok(card) => {
                    report.cards.insert(response.worker, card);
                }
                Err(e) => {
                    warn!(
                        statement = %statement_id,
                        worker = %response.worker,
                        error = %e,
                        "response excluded from scoring"
                    );
                    report.exclusions.push(ScoringExclusion {
                        worker: response.worker,
                        reason: e.to_string(),
                    });
                }
            }
        }

        report
    }

    fn check_preconditions(
        &self,
        statement_id: &StatementId,
        response: &WorkerResponse,
    ) -> Result<(), ConsensusError> {
        if &response.statement_id != statement_id {
            return Err(ConsensusError::StatementMismatch {
                response: response.statement_id.to_string(),
                statement: statement_id.to_string(),
            });
        }

        let percent = response.confidence.percent();
        if Confidence::new(percent).is_err() {
            return Err(ConsensusError::ScoringPrecondition {
                worker: response.worker.0,
                reason: format!("confidence {} is outside [0, 100]", percent),
            });
        }

        if !response.verify_proof() {
            return Err(ConsensusError::ScoringPrecondition {
                worker: response.worker.0,
                reason: "integrity proof does not match content".to_string(),
            });
        }

        Ok(())
    }
}
