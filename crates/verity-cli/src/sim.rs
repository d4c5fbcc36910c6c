//! Simulated worker pool for `verity simulate`.
//!
//! Every answer is derived from a SHA-256 digest of the statement id, so a
//! run is reproducible without a random number generator.

use std::time::Duration;

use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use verity_core::{Resolution, Statement, StatementId, Worker, WorkerId};

/// Behaviour of a simulated worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Usually right, well sourced.
    Honest,
    /// Answers PENDING or not at all.
    Lazy,
    /// Confidently wrong.
    Contrarian,
}

impl Role {
    /// Role of the `index`-th worker: half honest, a quarter each of the rest.
    pub fn for_index(index: usize) -> Self {
        match index % 4 {
            0 | 1 => Role::Honest,
            2 => Role::Lazy,
            _ => Role::Contrarian,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Honest => "honest",
            Role::Lazy => "lazy",
            Role::Contrarian => "contrarian",
        }
    }
}

/// A worker answering from a fixed script.
#[derive(Debug, Clone)]
pub struct SimWorker {
    id: WorkerId,
    role: Role,
}

impl SimWorker {
    pub fn new(id: WorkerId, role: Role) -> Self {
        Self { id, role }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    fn answer(&self, statement: &Statement) -> Option<Value> {
        let truth = true_resolution(&statement.id);
        let roll = digest(&[statement.id.as_str().as_bytes(), self.id.0.to_be_bytes().as_slice()]);

        match self.role {
            Role::Honest => {
                // One answer in ten is a low-confidence mistake.
                let (resolution, confidence) = if roll % 10 == 0 {
                    (opposite(truth), 55 + roll % 10)
                } else {
                    (truth, 70 + roll % 26)
                };
                Some(json!({
                    "resolution": resolution.to_string(),
                    "confidence": confidence,
                    "summary": format!("checked market data for {}", statement.id),
                    "sources": ["coingecko", "reuters", "binance"],
                }))
            }
            Role::Lazy => {
                if roll % 3 == 0 {
                    None
                } else {
                    Some(json!({"resolution": "PENDING", "confidence": 50}))
                }
            }
            Role::Contrarian => Some(json!({
                "resolution": opposite(truth).to_string(),
                "confidence": 90 + roll % 10,
                "summary": "trust me",
                "sources": ["someblog.example"],
            })),
        }
    }

    fn latency(&self, statement: &Statement) -> Duration {
        let roll = digest(&[self.id.0.to_be_bytes().as_slice(), statement.id.as_str().as_bytes()]);
        Duration::from_millis(roll % 25)
    }
}

impl Worker for SimWorker {
    fn id(&self) -> WorkerId {
        self.id
    }

    async fn query(&self, statement: Statement) -> Option<Value> {
        tokio::time::sleep(self.latency(&statement)).await;
        self.answer(&statement)
    }
}

/// The resolution the simulated authority will publish for a statement.
pub fn true_resolution(statement: &StatementId) -> Resolution {
    if digest(&[statement.as_str().as_bytes()]) % 2 == 0 {
        Resolution::True
    } else {
        Resolution::False
    }
}

fn opposite(resolution: Resolution) -> Resolution {
    match resolution {
        Resolution::True => Resolution::False,
        Resolution::False => Resolution::True,
        Resolution::Pending => Resolution::Pending,
    }
}

/// First eight bytes of the SHA-256 of `parts`, big-endian.
fn digest(parts: &[&[u8]]) -> u64 {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher
        .finalize()
        .iter()
        .take(8)
        .fold(0u64, |acc, &byte| (acc << 8) | u64::from(byte))
}
