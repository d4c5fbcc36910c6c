//! Verity CLI - Command-line interface for the consensus and reputation engine

mod sim;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::{Duration as ChronoDuration, Utc};
use clap::Parser;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;
use verity_core::{
    Engine, EngineConfig, Orchestrator, Reputation, Settlement, Statement, StatsSnapshot, WeightVector, Worker,
    WorkerId,
};

use crate::sim::{true_resolution, Role, SimWorker};

#[derive(Parser)]
#[command(name = "verity")]
#[command(about = "Verity - Consensus and reputation engine for a decentralized truth oracle")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Check configuration validity
    Check {
        /// Configuration file path
        #[arg(short, long, default_value = "config/verity.toml")]
        config: PathBuf,
    },
    /// Print the reward phase of each epoch
    Phases {
        /// Configuration file path (compiled defaults when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Number of epochs to print
        #[arg(short, long, default_value_t = 60)]
        epochs: u64,
    },
    /// Run the engine against simulated workers
    Simulate {
        /// Configuration file path (compiled defaults when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Number of statements to resolve
        #[arg(short, long, default_value_t = 100)]
        statements: usize,
        /// Number of simulated workers
        #[arg(short, long, default_value_t = 8)]
        workers: u32,
        /// Print the final report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match cli.command {
        Some(Commands::Check { config }) => check(&config),
        Some(Commands::Phases { config, epochs }) => phases(config.as_deref(), epochs),
        Some(Commands::Simulate {
            config,
            statements,
            workers,
            json,
        }) => simulate(config.as_deref(), statements, workers, json).await,
        None => {
            println!("Verity v{} - Use --help for commands", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn load(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_file(path).with_context(|| format!("loading {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn check(path: &Path) -> anyhow::Result<()> {
    let config = load(Some(path))?;
    config.validate().context("configuration rejected")?;

    println!("Configuration OK: {}", path.display());
    println!("  workers in bootstrap allocation: {}", config.bootstrap_allocation.len());
    println!(
        "  phases: bootstrap < {} <= hybrid < {} <= merit",
        config.phases.bootstrap_until, config.phases.merit_from
    );
    println!(
        "  ground truth: {}",
        config
            .ground_truth
            .db_path
            .as_ref()
            .map_or_else(|| "in-memory".to_string(), |p| p.display().to_string())
    );
    Ok(())
}

fn phases(path: Option<&Path>, epochs: u64) -> anyhow::Result<()> {
    let config = load(path)?;
    config.phases.validate().context("invalid phase schedule")?;

    println!("{:>6}  {:<20}  {:>14}", "epoch", "phase", "fixed fraction");
    for epoch in 0..epochs {
        let phase = config.phases.phase(epoch);
        println!("{:>6}  {:<20}  {:>14.3}", epoch, phase.to_string(), phase.fixed_fraction());
    }
    Ok(())
}

/// Settlement sink that prints each epoch's weights.
#[derive(Default)]
struct ConsoleSettlement {
    epochs: u64,
}

impl Settlement for ConsoleSettlement {
    fn settle(&mut self, epoch: u64, weights: &WeightVector) {
        self.epochs += 1;
        let line: Vec<String> = weights.iter().map(|(w, v)| format!("{}={:.3}", w, v)).collect();
        println!("-- epoch {:>3} weights: {}", epoch, line.join(" "));
    }
}

#[derive(Serialize)]
struct SimulationReport {
    statements: usize,
    epochs_settled: u64,
    correct: usize,
    pending: usize,
    workers: Vec<WorkerReport>,
    stats: StatsSnapshot,
}

#[derive(Serialize)]
struct WorkerReport {
    worker: WorkerId,
    role: &'static str,
    reputation: Option<Reputation>,
    accuracy: Option<f64>,
}

async fn simulate(path: Option<&Path>, statements: usize, workers: u32, json: bool) -> anyhow::Result<()> {
    anyhow::ensure!(workers > 0, "at least one worker is required");

    let ids: Vec<WorkerId> = (1..=workers).map(WorkerId).collect();
    let mut config = load(path)?;
    if config.bootstrap_allocation.is_empty() {
        config = config.with_uniform_allocation(&ids);
    }

    let engine = Arc::new(Engine::new(config).context("building engine")?);
    let pool: Vec<Arc<SimWorker>> = ids
        .iter()
        .enumerate()
        .map(|(i, &id)| Arc::new(SimWorker::new(id, Role::for_index(i))))
        .collect();

    info!(workers, statements, "simulation starting");
    let mut orchestrator = Orchestrator::new(Arc::clone(&engine), pool.clone(), ConsoleSettlement::default());

    let mut correct = 0;
    let mut pending = 0;
    for n in 0..statements {
        let statement = Statement::new(
            format!("stmt-{:05}", n),
            format!("Simulated market statement #{}", n),
            Utc::now() + ChronoDuration::hours(1),
        );
        let result = orchestrator.run_statement(&statement).await?;

        let truth = true_resolution(&statement.id);
        if result.resolution == truth {
            correct += 1;
        } else if !result.is_definite() {
            pending += 1;
        }
        if !json {
            println!("{:<12} {} (truth {})", statement.id.as_str(), result.summary(), truth);
        }

        engine.record_official_resolution(&statement.id, truth)?;
    }

    let mut report = SimulationReport {
        statements,
        epochs_settled: orchestrator.settlement().epochs,
        correct,
        pending,
        workers: Vec::with_capacity(pool.len()),
        stats: engine.stats(),
    };
    for worker in &pool {
        let id = worker.id();
        report.workers.push(WorkerReport {
            worker: id,
            role: worker.role().as_str(),
            reputation: engine.reputation(id)?,
            accuracy: engine.ground_truth().accuracy(id)?.map(|g| g.accuracy()),
        });
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    println!(
        "{} statements, {} matched ground truth, {} pending, {} epochs settled",
        report.statements, report.correct, report.pending, report.epochs_settled
    );
    println!("{:>6}  {:<10}  {:>10}  {:>8}  {:>8}", "worker", "role", "reputation", "answers", "accuracy");
    for w in &report.workers {
        let (mean, count) = w.reputation.map_or((0.0, 0), |r| (r.mean, r.count));
        let accuracy = w.accuracy.map_or_else(|| "-".to_string(), |a| format!("{:.3}", a));
        println!("{:>6}  {:<10}  {:>10.4}  {:>8}  {:>8}", w.worker.0, w.role, mean, count, accuracy);
    }
    println!(
        "replies: {} received, {} rejected ({:.1}%)",
        report.stats.replies_received,
        report.stats.replies_rejected,
        report.stats.rejection_rate() * 100.0
    );
    println!(
        "consensus rate: {:.1}%, uptime {:.2}s",
        report.stats.consensus_rate() * 100.0,
        report.stats.uptime().as_secs_f64()
    );
    Ok(())
}
