//! Per-statement pipeline facade.
//!
//! Runs the validator, the consensus calculator and the scorer for one
//! statement and assembles the immutable [`ConsensusResult`].

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::consensus::{ConsensusCalculator, VoteTally};
use crate::response::{Resolution, Statement, StatementId, WorkerId, WorkerResponse};
use crate::scoring::{MultiFactorScorer, ScoreCard, ScoringExclusion, ScoringSettings};
use crate::validator::{RawReply, Rejection, ResponseValidator};
use crate::Result;

/// Default number of consensus sources kept in a result.
pub const DEFAULT_MAX_SOURCES: usize = 10;

/// The committed outcome for one statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    /// The resolved statement.
    pub statement_id: StatementId,
    /// Consensus resolution.
    pub resolution: Resolution,
    /// Consensus confidence in `[0, 100]`.
    pub confidence: f64,
    /// Number of workers queried (raw replies, including absent ones).
    pub total_queried: usize,
    /// Number of replies that passed validation.
    pub valid_responses: usize,
    /// Composite score per scored worker.
    pub scores: BTreeMap<WorkerId, f64>,
    /// Full sub-score breakdown per scored worker.
    pub score_cards: BTreeMap<WorkerId, ScoreCard>,
    /// Most frequently cited sources among agreeing responses.
    pub top_sources: Vec<String>,
    /// The vote tally behind the decision.
    pub tally: VoteTally,
    /// Whether the tie-break rule decided the resolution.
    pub tie_broken: bool,
    /// The validated responses.
    pub responses: Vec<WorkerResponse>,
    /// Replies excluded by validation.
    pub rejections: Vec<Rejection>,
    /// Responses excluded by the scorer.
    pub scoring_exclusions: Vec<ScoringExclusion>,
    /// When the result was computed.
    pub computed_at: DateTime<Utc>,
}

impl ConsensusResult {
    /// One-line description, e.g. `TRUE (60.0%) from 2/2 workers`.
    pub fn summary(&self) -> String {
        format!(
            "{} ({:.1}%) from {}/{} workers",
            self.resolution, self.confidence, self.valid_responses, self.total_queried
        )
    }

    /// Returns true if consensus settled on TRUE or FALSE.
    pub fn is_definite(&self) -> bool {
        self.resolution.is_definite()
    }
}

/// Validator, calculator and scorer wired together.
///
/// # Example
///
/// ```rust
/// use chrono::{Duration, Utc};
/// use serde_json::json;
/// use verity_consensus::{Council, RawReply, Resolution, Statement, WorkerId};
///
/// let council = Council::new();
/// let statement = Statement::new("btc-100k", "Bitcoin will cross $100,000", Utc::now() + Duration::days(1));
/// let replies = vec![
///     RawReply::new(WorkerId(1), json!({"resolution": "TRUE", "confidence": 90})),
///     RawReply::new(WorkerId(2), json!({"resolution": "FALSE", "confidence": 60})),
/// ];
///
/// let result = council.resolve(&statement, replies);
/// assert_eq!(result.resolution, Resolution::True);
/// assert_eq!(result.summary(), "TRUE (60.0%) from 2/2 workers");
/// ```
#[derive(Debug, Clone)]
pub struct Council {
    validator: ResponseValidator,
    calculator: ConsensusCalculator,
    scorer: MultiFactorScorer,
    max_sources: usize,
}

impl Default for Council {
    fn default() -> Self {
        Self::new()
    }
}

impl Council {
    /// Creates a council with default scoring settings.
    pub fn new() -> Self {
        Self {
            validator: ResponseValidator::new(),
            calculator: ConsensusCalculator::new(),
            scorer: MultiFactorScorer::default(),
            max_sources: DEFAULT_MAX_SOURCES,
        }
    }

    /// Creates a council with custom scoring settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings do not validate.
    pub fn with_settings(settings: &ScoringSettings, max_sources: usize) -> Result<Self> {
        Ok(Self {
            validator: ResponseValidator::new(),
            calculator: ConsensusCalculator::new(),
            scorer: MultiFactorScorer::new(settings)?,
            max_sources,
        })
    }

    /// Returns the scorer.
    pub fn scorer(&self) -> &MultiFactorScorer {
        &self.scorer
    }

    /// Resolves one statement from its raw replies.
    ///
    /// # Process
    ///
    /// 1. Validate replies, collecting rejections
    /// 2. Compute the confidence-weighted consensus
    /// 3. Score each valid response against it
    /// 4. Rank the sources cited by agreeing responses
    pub fn resolve(&self, statement: &Statement, replies: Vec<RawReply>) -> ConsensusResult {
        let report = self.validator.validate(statement, replies);
        let outcome = self.calculator.calculate(&report.accepted);
        let scoring = self
            .scorer
            .score_all(&statement.id, outcome.resolution, &report.accepted);
        let top_sources = top_sources(&report.accepted, outcome.resolution, self.max_sources);

        let result = ConsensusResult {
            statement_id: statement.id.clone(),
            resolution: outcome.resolution,
            confidence: outcome.confidence,
            total_queried: report.total,
            valid_responses: report.accepted.len(),
            scores: scoring.composites(),
            score_cards: scoring.cards,
            top_sources,
            tally: outcome.tally,
            tie_broken: outcome.tie_broken,
            responses: report.accepted,
            rejections: report.rejections,
            scoring_exclusions: scoring.exclusions,
            computed_at: Utc::now(),
        };

        info!(
            statement = %result.statement_id,
            resolution = %result.resolution,
            confidence = result.confidence,
            valid = result.valid_responses,
            queried = result.total_queried,
            "consensus computed"
        );

        result
    }
}

/// Ranks sources cited by responses agreeing with `resolution`.
///
/// Each response counts a source once. Ordered by count, then name.
pub fn top_sources(responses: &[WorkerResponse], resolution: Resolution, limit: usize) -> Vec<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for response in responses.iter().filter(|r| r.resolution == resolution) {
        let unique: BTreeSet<&str> = response.sources.iter().map(String::as_str).collect();
        for source in unique {
            *counts.entry(source).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(source, _)| source.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::Confidence;
    use chrono::Duration;
    use serde_json::json;

    fn statement() -> Statement {
        Statement::new("s", "ETH will close above $5,000", Utc::now() + Duration::days(7))
    }

    fn resp(worker: u32, resolution: Resolution, sources: &[&str]) -> WorkerResponse {
        WorkerResponse::new(
            WorkerId(worker),
            StatementId::from("s"),
            resolution,
            Confidence::new(80.0).unwrap(),
            "",
            sources.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn test_two_worker_scenario() {
        let council = Council::new();
        let result = council.resolve(
            &statement(),
            vec![
                RawReply::new(WorkerId(1), json!({"resolution": "TRUE", "confidence": 90})),
                RawReply::new(WorkerId(2), json!({"resolution": "FALSE", "confidence": 60})),
            ],
        );

        assert_eq!(result.resolution, Resolution::True);
        assert!((result.confidence - 60.0).abs() < 1e-9);
        assert_eq!(result.total_queried, 2);
        assert_eq!(result.valid_responses, 2);
        assert_eq!(result.scores.len(), 2);
        assert!(result.scores[&WorkerId(1)] > result.scores[&WorkerId(2)]);
        assert_eq!(result.summary(), "TRUE (60.0%) from 2/2 workers");
    }

    #[test]
    fn test_no_valid_replies() {
        let council = Council::new();
        let result = council.resolve(
            &statement(),
            vec![
                RawReply::missing(WorkerId(1)),
                RawReply::new(WorkerId(2), json!({"confidence": 90})),
            ],
        );

        assert_eq!(result.resolution, Resolution::Pending);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.valid_responses, 0);
        assert_eq!(result.total_queried, 2);
        assert!(result.scores.is_empty());
        assert_eq!(result.rejections.len(), 2);
        assert!(!result.is_definite());
    }

    #[test]
    fn test_rejected_replies_do_not_vote() {
        let council = Council::new();
        let result = council.resolve(
            &statement(),
            vec![
                RawReply::new(WorkerId(1), json!({"resolution": "FALSE", "confidence": 150})),
                RawReply::new(WorkerId(2), json!({"resolution": "TRUE", "confidence": 30})),
            ],
        );
        assert_eq!(result.resolution, Resolution::True);
        assert_eq!(result.rejections.len(), 1);
        assert_eq!(result.rejections[0].worker, WorkerId(1));
        assert!(!result.scores.contains_key(&WorkerId(1)));
    }

    #[test]
    fn test_top_sources_ranked_by_agreeing_recurrence() {
        let responses = vec![
            resp(1, Resolution::True, &["reuters", "coingecko", "reuters"]),
            resp(2, Resolution::True, &["coingecko", "bloomberg"]),
            resp(3, Resolution::True, &["coingecko", "reuters"]),
            resp(4, Resolution::False, &["blog", "blog2", "blog3"]),
        ];
        let top = top_sources(&responses, Resolution::True, 10);
        assert_eq!(top, vec!["coingecko", "reuters", "bloomberg"]);

        let limited = top_sources(&responses, Resolution::True, 1);
        assert_eq!(limited, vec!["coingecko"]);
    }

    #[test]
    fn test_top_sources_ties_sorted_by_name() {
        let responses = vec![resp(1, Resolution::False, &["zeta", "alpha", "mid"])];
        let top = top_sources(&responses, Resolution::False, 10);
        assert_eq!(top, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_with_settings_rejects_bad_weights() {
        let mut settings = ScoringSettings::default();
        settings.weights.accuracy = 0.9;
        assert!(Council::with_settings(&settings, 10).is_err());
    }
}
