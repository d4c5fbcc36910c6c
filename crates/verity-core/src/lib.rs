//! # Verity Core
//!
//! Consensus and reputation engine for a decentralized truth oracle.
//! Ties the council, the reputation ledger and the ground-truth tracker
//! together behind one facade.
//!
//! ## Components
//!
//! | Stage | Component | Responsibility |
//! |-------|-----------|----------------|
//! | Resolve | Council | Validation, weighted vote, multi-factor scoring |
//! | Remember | Reputation Ledger | Running mean of composite scores per worker |
//! | Reward | Phase Schedule | Bootstrap, hybrid and merit weight vectors |
//! | Audit | Ground Truth | Write-once official resolutions, answer grading |
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         VERITY CORE                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │   Orchestrator ──► dispatch_round ──► Engine::process_statement │
//! │        │                                    │                   │
//! │        │                 ┌──────────────────┼─────────────┐     │
//! │        │                 ▼                  ▼             ▼     │
//! │        │          ┌─────────────┐   ┌─────────────┐ ┌─────────┐ │
//! │        │          │   Council   │   │ Reputation  │ │ Ground  │ │
//! │        │          │             │   │   Ledger    │ │  Truth  │ │
//! │        │          └─────────────┘   └──────┬──────┘ └────┬────┘ │
//! │        │                                   └──────┬──────┘      │
//! │        ▼                                          ▼             │
//! │   Settlement ◄──────────── Engine::current_weights(epoch)       │
//! │                                                                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use verity_core::{Engine, EngineConfig, Orchestrator, SettlementLog};
//!
//! let config = EngineConfig::from_file("verity.toml")?;
//! let engine = Arc::new(Engine::new(config)?);
//!
//! let mut orchestrator = Orchestrator::new(engine, workers, SettlementLog::default());
//! for statement in statements {
//!     let result = orchestrator.run_statement(&statement).await?;
//!     println!("{}", result.summary());
//! }
//! ```
//!
//! ## Notes
//!
//! - Results are committed once per statement; resubmission is an error
//! - Weight vectors are pure functions of configuration and a reputation
//!   snapshot
//! - Official resolutions are write-once; conflicts are refused and logged

mod config;
mod dispatch;
mod engine;
mod error;
mod orchestrator;
mod stats;

pub use config::{AllocationEntry, EngineConfig, GroundTruthConfig, ProcessingConfig};
pub use dispatch::{dispatch_round, Worker};
pub use engine::Engine;
pub use error::EngineError;
pub use orchestrator::{Orchestrator, Settlement, SettlementLog};
pub use stats::{EngineStats, StatsSnapshot};

// Re-export component types for convenience
pub use verity_consensus::{
    ConsensusResult, RawReply, RejectReason, Resolution, ScoreCard, ScoringSettings, ScoringWeights, Statement,
    StatementId, WorkerId, WorkerResponse,
};
pub use verity_reputation::{Phase, PhaseSchedule, Reputation, WeightVector};
pub use verity_truth::{GradedAccuracy, RecordOutcome};

/// Core result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
