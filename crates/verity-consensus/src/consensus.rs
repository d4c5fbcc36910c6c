//! Confidence-weighted consensus over valid responses.
//!
//! Each response votes for its resolution with weight `confidence / 100`.
//! The bucket with the largest accumulated weight wins and the consensus
//! confidence is that bucket's share of the total weight, as a percentage.
//!
//! # Voting Rules
//!
//! - Zero valid responses: PENDING at 0% (a defined result, not an error)
//! - Only buckets that received at least one vote compete
//! - Exactly equal buckets: PENDING beats TRUE beats FALSE
//! - All-zero weights: the tie rule picks the winner, confidence 0%

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::response::{Resolution, WorkerResponse};

/// Accumulated vote weight and count per resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoteTally {
    /// Accumulated `confidence / 100` per resolution that received a vote.
    pub weights: BTreeMap<Resolution, f64>,
    /// Number of votes per resolution.
    pub counts: BTreeMap<Resolution, usize>,
}

impl VoteTally {
    /// Creates an empty tally.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a tally from a set of responses, in order.
    pub fn from_responses(responses: &[WorkerResponse]) -> Self {
        let mut tally = Self::new();
        for response in responses {
            tally.add(response);
        }
        tally
    }

    /// Adds one response's vote.
    pub fn add(&mut self, response: &WorkerResponse) {
        *self.weights.entry(response.resolution).or_insert(0.0) += response.confidence.fraction();
        *self.counts.entry(response.resolution).or_insert(0) += 1;
    }

    /// Sum of all buckets' weights.
    pub fn total_weight(&self) -> f64 {
        self.weights.values().sum()
    }

    /// Total number of votes.
    pub fn total_votes(&self) -> usize {
        self.counts.values().sum()
    }

    /// Weight accumulated for one resolution.
    pub fn weight(&self, resolution: Resolution) -> f64 {
        self.weights.get(&resolution).copied().unwrap_or(0.0)
    }

    /// Returns true if no votes were cast.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Result of a consensus calculation for one statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusOutcome {
    /// The winning resolution.
    pub resolution: Resolution,
    /// Winning share of total weight, in `[0, 100]`.
    pub confidence: f64,
    /// The tally the decision was made from.
    pub tally: VoteTally,
    /// Whether the tie-break rule decided the winner.
    pub tie_broken: bool,
}

impl ConsensusOutcome {
    /// The defined outcome for a statement with no valid responses.
    pub fn insufficient() -> Self {
        Self {
            resolution: Resolution::Pending,
            confidence: 0.0,
            tally: VoteTally::new(),
            tie_broken: false,
        }
    }
}

/// Confidence-weighted majority calculator.
#[derive(Debug, Clone, Default)]
pub struct ConsensusCalculator;

impl ConsensusCalculator {
    /// Creates a calculator.
    pub fn new() -> Self {
        Self
    }

    /// Computes the consensus resolution and confidence.
    pub fn calculate(&self, responses: &[WorkerResponse]) -> ConsensusOutcome {
        let tally = VoteTally::from_responses(responses);
        self.decide(tally)
    }

    /// Decides the winner of an existing tally.
    pub fn decide(&self, tally: VoteTally) -> ConsensusOutcome {
        let mut winner: Option<(Resolution, f64)> = None;
        for (&resolution, &weight) in &tally.weights {
            winner = match winner {
                None => Some((resolution, weight)),
                Some((best, best_weight)) => {
                    if weight > best_weight
                        || (weight == best_weight && resolution.tie_rank() > best.tie_rank())
                    {
                        Some((resolution, weight))
                    } else {
                        Some((best, best_weight))
                    }
                }
            };
        }

        let Some((resolution, winning_weight)) = winner else {
            debug!("no valid responses, consensus is PENDING");
            return ConsensusOutcome::insufficient();
        };

        let tied: Vec<Resolution> = tally
            .weights
            .iter()
            .filter(|&(_, &w)| w == winning_weight)
            .map(|(&r, _)| r)
            .collect();
        let tie_broken = tied.len() > 1;
        if tie_broken {
            info!(
                event = "consensus_tie",
                ?tied,
                weight = winning_weight,
                winner = %resolution,
                "equal consensus buckets, tie-break applied"
            );
        }

        let total = tally.total_weight();
        let confidence = if total > 0.0 {
            (winning_weight / total * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };

        ConsensusOutcome {
            resolution,
            confidence,
            tally,
            tie_broken,
        }
    }
}
