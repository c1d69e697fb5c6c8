//! nextgen-sim
//!
//! Drives the decision engine against the seeded reference survey for a
//! number of epochs and prints the final report as JSON.
//!
//! - `--state` persists brain state between runs (atomic file store)
//! - `--config` reads a brain TOML config; `--seed` applies when it sets none
//! - Ctrl-C finishes the current action, reports the partial epoch and saves

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use nextgen_brain::persist::{FileStateStore, MemoryStateStore, StateStore};
use nextgen_brain::{Brain, BrainConfig, Mode};
use nextgen_sim::{EnvironmentConfig, Simulation};

#[derive(Parser, Debug)]
#[command(name = "nextgen-sim", about = "Run the decision engine against a simulated survey")]
struct Cli {
    /// Epochs to simulate.
    #[arg(long, default_value_t = 100)]
    epochs: u64,

    /// Seed for the environment, and for the brain unless the config sets one.
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Operating mode (active, passive, assist). Overrides saved state.
    #[arg(long)]
    mode: Option<Mode>,

    /// Brain config file (TOML).
    #[arg(long)]
    config: Option<PathBuf>,

    /// State file, loaded at start and saved after every epoch.
    #[arg(long)]
    state: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .compact()
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            BrainConfig::from_toml_str(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => BrainConfig::default(),
    };
    config.seed.get_or_insert(cli.seed);

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            tracing::info!("shutting down after the current action...");
            shutdown.store(true, Ordering::Relaxed);
        })
        .context("installing Ctrl-C handler")?;
    }

    match cli.state.clone() {
        Some(path) => simulate(&cli, config, FileStateStore::new(path), shutdown),
        None => simulate(&cli, config, MemoryStateStore::new(), shutdown),
    }
}

fn simulate<S: StateStore>(
    cli: &Cli,
    config: BrainConfig,
    store: S,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    let mut brain = Brain::load(config, &store);
    if let Some(mode) = cli.mode {
        brain.set_mode(mode);
    }

    tracing::info!(
        epochs = cli.epochs,
        seed = cli.seed,
        mode = %cli.mode.unwrap_or(brain.mode()),
        "nextgen-sim starting"
    );

    let mut sim = Simulation::new(brain, EnvironmentConfig::reference(cli.seed), store)
        .with_shutdown(shutdown);
    let summaries = sim.run(cli.epochs)?;
    let report = sim.report(&summaries);

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
