//! The four scoring factors.
//!
//! Each factor looks at one worker's response against the statement's
//! consensus and produces a sub-score in `[0, 1]`:
//!
//! - **Accuracy**: agreement with consensus, partial credit for PENDING
//! - **Calibration**: confidence that matches correctness
//! - **Consistency**: agreement with high-confidence peers
//! - **Source quality**: saturating count plus reputable share

use crate::response::Resolution;
use crate::scoring::{Factor, ScoringContext};

/// Agreement with the consensus resolution.
///
/// | Worker | Consensus | Score |
/// |--------|-----------|-------|
/// | same as consensus | any | 1.0 |
/// | PENDING | definite | 0.5 |
/// | definite, different | any | 0.0 |
#[derive(Debug, Clone, Default)]
pub struct Accuracy;

impl Factor for Accuracy {
    fn name(&self) -> &str {
        "accuracy"
    }

    fn score(&self, ctx: &ScoringContext<'_>) -> f64 {
        let answered = ctx.response.resolution;
        if answered == ctx.consensus {
            1.0
        } else if answered == Resolution::Pending {
            0.5
        } else {
            0.0
        }
    }
}

/// Confidence calibration.
///
/// Right and definite scores `c`, wrong scores `1 - c`, and PENDING
/// scores `1 - 2|c - 0.5|` so honest uncertainty near 50% is rewarded.
#[derive(Debug, Clone, Default)]
pub struct Calibration;

impl Factor for Calibration {
    fn name(&self) -> &str {
        "calibration"
    }

    fn score(&self, ctx: &ScoringContext<'_>) -> f64 {
        let c = ctx.response.confidence.fraction();
        let answered = ctx.response.resolution;

        if answered == Resolution::Pending {
            1.0 - 2.0 * (c - 0.5).abs()
        } else if answered == ctx.consensus {
            c
        } else {
            1.0 - c
        }
    }
}

/// Agreement with the other high-confidence responses.
#[derive(Debug, Clone)]
pub struct Consistency {
    /// Peers must report strictly more than this confidence (percent).
    threshold: f64,
}

impl Consistency {
    /// Score used when no peer clears the threshold.
    pub const NEUTRAL: f64 = 0.5;

    /// Creates the factor with a peer confidence threshold in percent.
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Returns the peer confidence threshold.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl Default for Consistency {
    fn default() -> Self {
        Self::new(80.0)
    }
}

impl Factor for Consistency {
    fn name(&self) -> &str {
        "consistency"
    }

    fn score(&self, ctx: &ScoringContext<'_>) -> f64 {
        let me = ctx.response.worker;
        let (agree, total) = ctx
            .peers
            .iter()
            .filter(|peer| peer.worker != me && peer.confidence.percent() > self.threshold)
            .fold((0usize, 0usize), |(agree, total), peer| {
                let same = usize::from(peer.resolution == ctx.response.resolution);
                (agree + same, total + 1)
            });

        if total == 0 {
            Self::NEUTRAL
        } else {
            agree as f64 / total as f64
        }
    }
}

/// Evidence quality from the listed sources.
///
/// `(min(n, saturation) / saturation + reputable / n) / 2`, where a
/// source is reputable if it contains an allow-listed name
/// (case-insensitive).
#[derive(Debug, Clone)]
pub struct SourceQuality {
    saturation: usize,
    reputable: Vec<String>,
}

impl SourceQuality {
    /// Creates the factor.
    ///
    /// A saturation of zero is treated as one.
    pub fn new(saturation: usize, reputable: &[String]) -> Self {
        Self {
            saturation: saturation.max(1),
            reputable: reputable.iter().map(|s| s.to_lowercase()).collect(),
        }
    }

    /// Returns true if the source matches the allow-list.
    pub fn is_reputable(&self, source: &str) -> bool {
        let source = source.to_lowercase();
        self.reputable.iter().any(|known| source.contains(known.as_str()))
    }
}

impl Factor for SourceQuality {
    fn name(&self) -> &str {
        "source_quality"
    }

    fn score(&self, ctx: &ScoringContext<'_>) -> f64 {
        let sources = &ctx.response.sources;
        if sources.is_empty() {
            return 0.0;
        }

        let count = sources.len().min(self.saturation) as f64 / self.saturation as f64;
        let reputable = sources.iter().filter(|s| self.is_reputable(s)).count();
        let reliability = reputable as f64 / sources.len() as f64;

        (count + reliability) / 2.0
    }
}
