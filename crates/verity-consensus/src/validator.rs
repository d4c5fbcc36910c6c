//! Response validation for raw worker replies.
//!
//! Workers reply with loosely structured JSON. Nothing about a reply is
//! trusted until [`ResponseValidator::validate_reply`] has turned it into a
//! typed [`WorkerResponse`] or a [`RejectReason`]. A bad reply only shrinks
//! the valid set; it never aborts the batch.
//!
//! ## Rules
//!
//! | Field | Rule |
//! |-------|------|
//! | `resolution` | Required. TRUE / FALSE / PENDING, any case. Never defaulted. |
//! | `confidence` | Required. Number or numeric string in `[0, 100]`. Out of range is rejected, not clamped. |
//! | `summary` | Optional string. Truncated to 1000 characters. |
//! | `sources` | Optional array of strings, possibly empty. First 10 kept. |
//! | `target_value` | Optional number. |
//! | `statement_id` | Optional; must match the dispatched statement when present. |
//! | `proof` | Optional; must match the recomputed digest when present. |

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::response::{Confidence, Resolution, Statement, WorkerId, WorkerResponse};

/// One attempted reply from one dispatched worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawReply {
    /// The worker the statement was dispatched to.
    pub worker: WorkerId,
    /// The reply body, or `None` if the worker never answered.
    pub payload: Option<Value>,
    /// When the reply arrived (or the round closed).
    pub received_at: DateTime<Utc>,
}

impl RawReply {
    /// Creates a reply received now.
    pub fn new(worker: WorkerId, payload: Value) -> Self {
        Self {
            worker,
            payload: Some(payload),
            received_at: Utc::now(),
        }
    }

    /// Creates a placeholder for a worker that did not answer.
    pub fn missing(worker: WorkerId) -> Self {
        Self {
            worker,
            payload: None,
            received_at: Utc::now(),
        }
    }
}

/// Why a reply was excluded from the valid set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RejectReason {
    /// The worker never replied within the round.
    NoReply,
    /// The worker already had a reply accepted or rejected in this batch.
    Duplicate,
    /// The reply body is not a JSON object.
    NotAnObject,
    /// The `resolution` field is absent.
    MissingResolution,
    /// The `resolution` field is not one of the enumerated values.
    InvalidResolution(String),
    /// The `confidence` field is absent.
    MissingConfidence,
    /// The `confidence` field does not parse as a number.
    UnparseableConfidence(String),
    /// The `confidence` field parsed but lies outside `[0, 100]`.
    ConfidenceOutOfRange(f64),
    /// The `summary` field is present but not a string.
    InvalidSummary,
    /// The `sources` field is not a list of strings.
    InvalidSources(String),
    /// The `target_value` field is present but not a number.
    InvalidTargetValue,
    /// The reply names a different statement.
    StatementMismatch {
        /// The dispatched statement.
        expected: String,
        /// The statement named in the reply.
        actual: String,
    },
    /// The supplied integrity proof does not match the reply content.
    ProofMismatch,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoReply => write!(f, "no reply before the round closed"),
            Self::Duplicate => write!(f, "duplicate reply from the same worker"),
            Self::NotAnObject => write!(f, "reply is not a JSON object"),
            Self::MissingResolution => write!(f, "resolution field is missing"),
            Self::InvalidResolution(v) => write!(f, "resolution '{}' is not TRUE, FALSE or PENDING", v),
            Self::MissingConfidence => write!(f, "confidence field is missing"),
            Self::UnparseableConfidence(v) => write!(f, "confidence '{}' is not a number", v),
            Self::ConfidenceOutOfRange(v) => write!(f, "confidence {} is outside [0, 100]", v),
            Self::InvalidSummary => write!(f, "summary is not a string"),
            Self::InvalidSources(why) => write!(f, "sources {}", why),
            Self::InvalidTargetValue => write!(f, "target_value is not a number"),
            Self::StatementMismatch { expected, actual } => {
                write!(f, "reply is for statement '{}', expected '{}'", actual, expected)
            }
            Self::ProofMismatch => write!(f, "integrity proof does not match reply content"),
        }
    }
}

/// A reply excluded by validation, kept for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    /// The worker whose reply was excluded.
    pub worker: WorkerId,
    /// Why it was excluded.
    pub reason: RejectReason,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker {}: {}", self.worker, self.reason)
    }
}

/// Outcome of validating one batch of replies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Well-formed responses, in arrival order.
    pub accepted: Vec<WorkerResponse>,
    /// Excluded replies with reasons.
    pub rejections: Vec<Rejection>,
    /// Number of replies examined.
    pub total: usize,
}

impl ValidationReport {
    /// Number of rejected replies.
    pub fn rejected_count(&self) -> usize {
        self.rejections.len()
    }
}

/// Filters raw replies into typed responses.
#[derive(Debug, Clone, Default)]
pub struct ResponseValidator;

impl ResponseValidator {
    /// Creates a validator.
    pub fn new() -> Self {
        Self
    }

    /// Validates a batch of replies for one statement.
    ///
    /// Only the first reply from each worker is considered; later ones
    /// are rejected as duplicates.
    pub fn validate(&self, statement: &Statement, replies: Vec<RawReply>) -> ValidationReport {
        let total = replies.len();
        let mut seen = BTreeSet::new();
        let mut accepted = Vec::new();
        let mut rejections = Vec::new();

        for reply in replies {
            let worker = reply.worker;
            let outcome = if seen.insert(worker) {
                self.validate_reply(statement, reply)
            } else {
                Err(RejectReason::Duplicate)
            };

            match outcome {
                Ok(response) => accepted.push(response),
                Err(reason) => {
                    warn!(statement = %statement.id, worker = %worker, %reason, "reply rejected");
                    rejections.push(Rejection { worker, reason });
                }
            }
        }

        debug!(
            statement = %statement.id,
            total,
            accepted = accepted.len(),
            rejected = rejections.len(),
            "validation complete"
        );

        ValidationReport {
            accepted,
            rejections,
            total,
        }
    }

    /// Validates a single reply.
    ///
    /// # Errors
    ///
    /// Returns the first rule the reply violates.
    pub fn validate_reply(
        &self,
        statement: &Statement,
        reply: RawReply,
    ) -> Result<WorkerResponse, RejectReason> {
        let payload = reply.payload.ok_or(RejectReason::NoReply)?;
        let fields = payload.as_object().ok_or(RejectReason::NotAnObject)?;

        if let Some(id) = fields.get("statement_id") {
            if id.as_str() != Some(statement.id.as_str()) {
                return Err(RejectReason::StatementMismatch {
                    expected: statement.id.to_string(),
                    actual: id.as_str().map(str::to_string).unwrap_or_else(|| id.to_string()),
                });
            }
        }

        let resolution = parse_resolution(fields)?;
        let confidence = parse_confidence(fields)?;
        let summary = match fields.get("summary") {
            None | Some(Value::Null) => "",
            Some(Value::String(s)) => s.as_str(),
            Some(_) => return Err(RejectReason::InvalidSummary),
        };
        let sources = parse_sources(fields)?;
        let target_value = match fields.get("target_value") {
            None | Some(Value::Null) => None,
            Some(v) => Some(v.as_f64().ok_or(RejectReason::InvalidTargetValue)?),
        };

        let mut response = WorkerResponse::new(
            reply.worker,
            statement.id.clone(),
            resolution,
            confidence,
            summary,
            sources,
        );
        response.target_value = target_value;
        response.received_at = reply.received_at;

        match fields.get("proof") {
            None | Some(Value::Null) => {}
            Some(Value::String(claimed)) => {
                if !claimed.eq_ignore_ascii_case(&response.proof) {
                    return Err(RejectReason::ProofMismatch);
                }
            }
            Some(_) => return Err(RejectReason::ProofMismatch),
        }

        Ok(response)
    }
}

fn parse_resolution(fields: &Map<String, Value>) -> Result<Resolution, RejectReason> {
    match fields.get("resolution") {
        None | Some(Value::Null) => Err(RejectReason::MissingResolution),
        Some(Value::String(s)) => s
            .parse()
            .map_err(|_| RejectReason::InvalidResolution(s.clone())),
        Some(other) => Err(RejectReason::InvalidResolution(other.to_string())),
    }
}

fn parse_confidence(fields: &Map<String, Value>) -> Result<Confidence, RejectReason> {
    let value = match fields.get("confidence") {
        None | Some(Value::Null) => return Err(RejectReason::MissingConfidence),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| RejectReason::UnparseableConfidence(n.to_string()))?,
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| RejectReason::UnparseableConfidence(s.clone()))?,
        Some(other) => return Err(RejectReason::UnparseableConfidence(other.to_string())),
    };

    Confidence::new(value).map_err(|_| RejectReason::ConfidenceOutOfRange(value))
}

fn parse_sources(fields: &Map<String, Value>) -> Result<Vec<String>, RejectReason> {
    match fields.get("sources") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| RejectReason::InvalidSources(format!("entry {} is not a string", item)))
            })
            .collect(),
        Some(_) => Err(RejectReason::InvalidSources("is not a list".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::integrity_digest;
    use serde_json::json;

    fn statement() -> Statement {
        Statement::new("btc-100k", "Bitcoin will cross $100,000 by Dec 31, 2024", Utc::now())
    }

    fn reject(payload: Value) -> RejectReason {
        ResponseValidator::new()
            .validate_reply(&statement(), RawReply::new(WorkerId(1), payload))
            .unwrap_err()
    }

    #[test]
    fn test_valid_reply_accepted() {
        let reply = RawReply::new(
            WorkerId(3),
            json!({
                "resolution": "true",
                "confidence": 90,
                "summary": "Strong bullish indicators",
                "sources": ["coingecko", "yahoo"],
                "target_value": 100000.0
            }),
        );
        let response = ResponseValidator::new()
            .validate_reply(&statement(), reply)
            .unwrap();

        assert_eq!(response.worker, WorkerId(3));
        assert_eq!(response.resolution, Resolution::True);
        assert!((response.confidence.percent() - 90.0).abs() < f64::EPSILON);
        assert_eq!(response.sources.len(), 2);
        assert_eq!(response.target_value, Some(100000.0));
        assert!(response.verify_proof());
    }

    #[test]
    fn test_numeric_string_confidence_accepted() {
        let response = ResponseValidator::new()
            .validate_reply(
                &statement(),
                RawReply::new(WorkerId(1), json!({"resolution": "PENDING", "confidence": " 55.5 "})),
            )
            .unwrap();
        assert!((response.confidence.percent() - 55.5).abs() < f64::EPSILON);
        assert!(response.sources.is_empty());
        assert_eq!(response.summary, "");
    }

    #[test]
    fn test_missing_resolution_not_defaulted() {
        assert_eq!(reject(json!({"confidence": 50})), RejectReason::MissingResolution);
        assert_eq!(
            reject(json!({"resolution": null, "confidence": 50})),
            RejectReason::MissingResolution
        );
    }

    #[test]
    fn test_unparseable_resolution() {
        assert_eq!(
            reject(json!({"resolution": "maybe", "confidence": 50})),
            RejectReason::InvalidResolution("maybe".to_string())
        );
        assert!(matches!(
            reject(json!({"resolution": 1, "confidence": 50})),
            RejectReason::InvalidResolution(_)
        ));
    }

    #[test]
    fn test_confidence_out_of_range_rejected_not_clamped() {
        assert_eq!(
            reject(json!({"resolution": "TRUE", "confidence": 150})),
            RejectReason::ConfidenceOutOfRange(150.0)
        );
        assert_eq!(
            reject(json!({"resolution": "TRUE", "confidence": -10})),
            RejectReason::ConfidenceOutOfRange(-10.0)
        );
    }

    #[test]
    fn test_confidence_missing_or_garbage() {
        assert_eq!(reject(json!({"resolution": "TRUE"})), RejectReason::MissingConfidence);
        assert!(matches!(
            reject(json!({"resolution": "TRUE", "confidence": "high"})),
            RejectReason::UnparseableConfidence(_)
        ));
        assert!(matches!(
            reject(json!({"resolution": "TRUE", "confidence": [90]})),
            RejectReason::UnparseableConfidence(_)
        ));
    }

    #[test]
    fn test_sources_must_be_string_list() {
        assert!(matches!(
            reject(json!({"resolution": "TRUE", "confidence": 80, "sources": "reuters"})),
            RejectReason::InvalidSources(_)
        ));
        assert!(matches!(
            reject(json!({"resolution": "TRUE", "confidence": 80, "sources": ["a", 2]})),
            RejectReason::InvalidSources(_)
        ));
    }

    #[test]
    fn test_not_an_object() {
        assert_eq!(reject(json!("TRUE")), RejectReason::NotAnObject);
        assert_eq!(reject(json!([1, 2])), RejectReason::NotAnObject);
    }

    #[test]
    fn test_statement_mismatch() {
        assert!(matches!(
            reject(json!({"statement_id": "other", "resolution": "TRUE", "confidence": 80})),
            RejectReason::StatementMismatch { .. }
        ));
    }

    #[test]
    fn test_non_string_statement_id_rejected() {
        let unnamed = Statement::new("", "statement with an empty id", Utc::now());
        for id in [json!(42), json!(["btc-100k"])] {
            let err = ResponseValidator::new()
                .validate_reply(
                    &unnamed,
                    RawReply::new(WorkerId(1), json!({"statement_id": id, "resolution": "TRUE", "confidence": 80})),
                )
                .unwrap_err();
            assert!(matches!(err, RejectReason::StatementMismatch { .. }));
        }
    }

    #[test]
    fn test_proof_checked_when_present() {
        let s = statement();
        let good = integrity_digest(
            &s.id,
            Resolution::False,
            Confidence::new(60.0).unwrap(),
            "no",
            &[],
        );
        let validator = ResponseValidator::new();

        let ok = validator.validate_reply(
            &s,
            RawReply::new(WorkerId(1), json!({"resolution": "FALSE", "confidence": 60, "summary": "no", "proof": good.to_uppercase()})),
        );
        assert!(ok.is_ok());

        let bad = validator.validate_reply(
            &s,
            RawReply::new(WorkerId(1), json!({"resolution": "TRUE", "confidence": 60, "summary": "no", "proof": good})),
        );
        assert_eq!(bad.unwrap_err(), RejectReason::ProofMismatch);
    }

    #[test]
    fn test_batch_keeps_valid_drops_bad_and_duplicates() {
        let replies = vec![
            RawReply::new(WorkerId(1), json!({"resolution": "TRUE", "confidence": 90})),
            RawReply::new(WorkerId(2), json!({"resolution": "FALSE", "confidence": 200})),
            RawReply::missing(WorkerId(3)),
            RawReply::new(WorkerId(1), json!({"resolution": "FALSE", "confidence": 90})),
            RawReply::new(WorkerId(4), json!({"resolution": "pending", "confidence": 50})),
        ];

        let report = ResponseValidator::new().validate(&statement(), replies);

        assert_eq!(report.total, 5);
        assert_eq!(report.accepted.len(), 2);
        assert_eq!(report.rejected_count(), 3);
        assert_eq!(report.accepted[0].resolution, Resolution::True);

        let reasons: Vec<_> = report.rejections.iter().map(|r| &r.reason).collect();
        assert!(reasons.contains(&&RejectReason::NoReply));
        assert!(reasons.contains(&&RejectReason::Duplicate));
    }

    #[test]
    fn test_rejection_reason_strings() {
        let r = Rejection {
            worker: WorkerId(9),
            reason: RejectReason::ConfidenceOutOfRange(101.0),
        };
        let text = r.to_string();
        assert!(text.contains("worker 9"));
        assert!(text.contains("outside [0, 100]"));
    }
}
