//! Statement and worker response types.
//!
//! Defines the immutable records that flow through the engine: the
//! [`Statement`] being resolved and the validated [`WorkerResponse`]
//! each worker returns for it.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ConsensusError;

/// Maximum summary length kept from a reply, in characters.
pub const MAX_SUMMARY_CHARS: usize = 1000;

/// Maximum number of sources kept from a reply.
pub const MAX_SOURCES: usize = 10;

/// Identifier of a worker node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub u32);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for WorkerId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// Identifier of a statement.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatementId(String);

impl StatementId {
    /// Creates a statement id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StatementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StatementId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// The verdict a worker or the engine assigns to a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Resolution {
    /// The statement came true.
    True,
    /// The statement did not come true.
    False,
    /// Not enough information to decide.
    Pending,
}

impl Resolution {
    /// All resolutions, in declaration order.
    pub const ALL: [Resolution; 3] = [Resolution::True, Resolution::False, Resolution::Pending];

    /// Returns true for TRUE and FALSE.
    pub fn is_definite(&self) -> bool {
        !matches!(self, Resolution::Pending)
    }

    /// Precedence when consensus buckets carry exactly equal weight.
    ///
    /// Higher wins: PENDING, then TRUE, then FALSE.
    pub fn tie_rank(&self) -> u8 {
        match self {
            Resolution::Pending => 2,
            Resolution::True => 1,
            Resolution::False => 0,
        }
    }

    /// Single-byte encoding used by persistent stores.
    pub fn to_byte(self) -> u8 {
        match self {
            Resolution::True => b'T',
            Resolution::False => b'F',
            Resolution::Pending => b'P',
        }
    }

    /// Decodes [`to_byte`](Self::to_byte) output.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'T' => Some(Resolution::True),
            b'F' => Some(Resolution::False),
            b'P' => Some(Resolution::Pending),
            _ => None,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::True => write!(f, "TRUE"),
            Resolution::False => write!(f, "FALSE"),
            Resolution::Pending => write!(f, "PENDING"),
        }
    }
}

impl FromStr for Resolution {
    type Err = ConsensusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TRUE" => Ok(Resolution::True),
            "FALSE" => Ok(Resolution::False),
            "PENDING" => Ok(Resolution::Pending),
            _ => Err(ConsensusError::InvalidResolution(s.to_string())),
        }
    }
}

/// Self-reported confidence, a percentage in `[0, 100]`.
///
/// Out-of-range values are rejected at construction rather than clamped,
/// so a misbehaving worker stays visible.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Confidence(f64);

impl Confidence {
    /// Creates a confidence value.
    ///
    /// # Errors
    ///
    /// Returns [`ConsensusError::InvalidConfidence`] when the value is not
    /// finite or lies outside `[0, 100]`.
    pub fn new(percent: f64) -> Result<Self, ConsensusError> {
        if percent.is_finite() && (0.0..=100.0).contains(&percent) {
            Ok(Self(percent))
        } else {
            Err(ConsensusError::InvalidConfidence(percent))
        }
    }

    /// Returns the percentage value.
    pub fn percent(&self) -> f64 {
        self.0
    }

    /// Returns the value as a fraction in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        self.0 / 100.0
    }
}

impl TryFrom<f64> for Confidence {
    type Error = ConsensusError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Confidence> for f64 {
    fn from(value: Confidence) -> Self {
        value.0
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}%", self.0)
    }
}

/// Direction hint attached to numeric statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// The value is expected to rise past the target.
    Increase,
    /// The value is expected to fall past the target.
    Decrease,
}

/// A prediction statement to be resolved.
///
/// Created by the upstream catalog; read-only to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    /// Unique statement id.
    pub id: StatementId,
    /// Natural-language statement text.
    pub text: String,
    /// When the statement was created.
    pub created_at: DateTime<Utc>,
    /// Resolution deadline.
    pub deadline: DateTime<Utc>,
    /// Optional numeric baseline at creation time.
    pub baseline: Option<f64>,
    /// Optional direction hint.
    pub direction: Option<Direction>,
}

impl Statement {
    /// Creates a statement created now with the given deadline.
    pub fn new(id: impl Into<String>, text: impl Into<String>, deadline: DateTime<Utc>) -> Self {
        Self {
            id: StatementId::new(id),
            text: text.into(),
            created_at: Utc::now(),
            deadline,
            baseline: None,
            direction: None,
        }
    }

    /// Sets the numeric baseline.
    pub fn with_baseline(mut self, baseline: f64) -> Self {
        self.baseline = Some(baseline);
        self
    }

    /// Sets the direction hint.
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    /// Returns true once the deadline has passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.deadline
    }
}

/// A validated reply from one worker for one statement.
///
/// Only the [`ResponseValidator`](crate::validator::ResponseValidator)
/// produces these from raw replies; once built they are never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerResponse {
    /// The responding worker.
    pub worker: WorkerId,
    /// The statement this response belongs to.
    pub statement_id: StatementId,
    /// The worker's verdict.
    pub resolution: Resolution,
    /// The worker's self-reported confidence.
    pub confidence: Confidence,
    /// Free-text reasoning, truncated to [`MAX_SUMMARY_CHARS`].
    pub summary: String,
    /// Ordered source identifiers, at most [`MAX_SOURCES`].
    pub sources: Vec<String>,
    /// Optional numeric target the worker resolved against.
    pub target_value: Option<f64>,
    /// SHA-256 integrity digest, lowercase hex.
    pub proof: String,
    /// When the reply was received.
    pub received_at: DateTime<Utc>,
}

/// Computes the integrity digest of a response's content.
///
/// The digest covers
/// `statement_id|RESOLUTION|confidence|summary|src1,src2,...`
/// and is returned as 64 lowercase hex characters.
pub fn integrity_digest(
    statement_id: &StatementId,
    resolution: Resolution,
    confidence: Confidence,
    summary: &str,
    sources: &[String],
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(statement_id.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(resolution.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(confidence.percent().to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(summary.as_bytes());
    hasher.update(b"|");
    hasher.update(sources.join(",").as_bytes());

    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Truncates a summary to [`MAX_SUMMARY_CHARS`] characters plus `...`.
pub fn truncate_summary(summary: &str) -> String {
    if summary.chars().count() > MAX_SUMMARY_CHARS {
        let mut truncated: String = summary.chars().take(MAX_SUMMARY_CHARS).collect();
        truncated.push_str("...");
        truncated
    } else {
        summary.to_string()
    }
}

impl WorkerResponse {
    /// Builds a response, truncating the summary and sources and
    /// computing the integrity digest.
    pub fn new(
        worker: WorkerId,
        statement_id: StatementId,
        resolution: Resolution,
        confidence: Confidence,
        summary: &str,
        mut sources: Vec<String>,
    ) -> Self {
        let summary = truncate_summary(summary);
        sources.truncate(MAX_SOURCES);
        let proof = integrity_digest(&statement_id, resolution, confidence, &summary, &sources);

        Self {
            worker,
            statement_id,
            resolution,
            confidence,
            summary,
            sources,
            target_value: None,
            proof,
            received_at: Utc::now(),
        }
    }

    /// Sets the numeric target value.
    pub fn with_target_value(mut self, value: f64) -> Self {
        self.target_value = Some(value);
        self
    }

    /// Recomputes the digest and compares it with the stored proof.
    pub fn verify_proof(&self) -> bool {
        let expected = integrity_digest(
            &self.statement_id,
            self.resolution,
            self.confidence,
            &self.summary,
            &self.sources,
        );
        expected.eq_ignore_ascii_case(&self.proof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn response(confidence: f64) -> WorkerResponse {
        WorkerResponse::new(
            WorkerId(1),
            StatementId::from("s-1"),
            Resolution::False,
            Confidence::new(confidence).unwrap(),
            "Bitcoin peaked at $98k",
            vec!["CoinGecko".to_string()],
        )
    }

    #[test]
    fn test_resolution_parse_case_insensitive() {
        assert_eq!("true".parse::<Resolution>().unwrap(), Resolution::True);
        assert_eq!(" False ".parse::<Resolution>().unwrap(), Resolution::False);
        assert_eq!("PENDING".parse::<Resolution>().unwrap(), Resolution::Pending);
        assert!("maybe".parse::<Resolution>().is_err());
        assert!("".parse::<Resolution>().is_err());
    }

    #[test]
    fn test_resolution_display_and_serde() {
        assert_eq!(Resolution::Pending.to_string(), "PENDING");
        let json = serde_json::to_string(&Resolution::True).unwrap();
        assert_eq!(json, "\"TRUE\"");
    }

    #[test]
    fn test_resolution_byte_encoding() {
        for r in Resolution::ALL {
            assert_eq!(Resolution::from_byte(r.to_byte()), Some(r));
        }
        assert_eq!(Resolution::from_byte(b'x'), None);
    }

    #[test]
    fn test_tie_rank_order() {
        assert!(Resolution::Pending.tie_rank() > Resolution::True.tie_rank());
        assert!(Resolution::True.tie_rank() > Resolution::False.tie_rank());
    }

    #[test]
    fn test_confidence_bounds() {
        assert!(Confidence::new(0.0).is_ok());
        assert!(Confidence::new(100.0).is_ok());
        assert!(Confidence::new(100.01).is_err());
        assert!(Confidence::new(-0.1).is_err());
        assert!(Confidence::new(f64::NAN).is_err());
        assert!(Confidence::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_confidence_fraction_and_display() {
        let c = Confidence::new(75.0).unwrap();
        assert!((c.fraction() - 0.75).abs() < f64::EPSILON);
        assert_eq!(c.to_string(), "75.0%");
    }

    #[test]
    fn test_confidence_deserialize_rejects_out_of_range() {
        assert!(serde_json::from_str::<Confidence>("150").is_err());
        let ok: Confidence = serde_json::from_str("42.5").unwrap();
        assert!((ok.percent() - 42.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_statement_is_expired() {
        let now = Utc::now();
        let future = Statement::new("a", "ETH > $5000", now + Duration::days(30));
        let past = Statement::new("b", "ETH > $5000", now - Duration::days(30));
        assert!(!future.is_expired(now));
        assert!(past.is_expired(now));
    }

    #[test]
    fn test_statement_builders() {
        let s = Statement::new("btc", "Bitcoin will cross $100,000", Utc::now())
            .with_baseline(21500.75)
            .with_direction(Direction::Increase);
        assert_eq!(s.baseline, Some(21500.75));
        assert_eq!(s.direction, Some(Direction::Increase));
    }

    #[test]
    fn test_proof_is_deterministic_and_content_bound() {
        let a = response(95.5);
        let b = response(95.5);
        let c = response(90.0);

        assert_eq!(a.proof.len(), 64);
        assert_eq!(a.proof, b.proof);
        assert_ne!(a.proof, c.proof);
        assert!(a.verify_proof());
    }

    #[test]
    fn test_tampered_response_fails_proof() {
        let mut r = response(95.5);
        r.resolution = Resolution::True;
        assert!(!r.verify_proof());
    }

    #[test]
    fn test_sources_limited() {
        let sources: Vec<String> = (0..20).map(|i| format!("Source{}", i)).collect();
        let r = WorkerResponse::new(
            WorkerId(1),
            StatementId::from("s"),
            Resolution::Pending,
            Confidence::new(50.0).unwrap(),
            "x",
            sources,
        );
        assert_eq!(r.sources.len(), MAX_SOURCES);
        assert_eq!(r.sources[0], "Source0");
        assert_eq!(r.sources[9], "Source9");
    }

    #[test]
    fn test_summary_truncation() {
        let long = "x".repeat(2000);
        let truncated = truncate_summary(&long);
        assert_eq!(truncated.chars().count(), MAX_SUMMARY_CHARS + 3);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncate_summary("short"), "short");
    }
}
