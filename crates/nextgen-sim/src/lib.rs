//! Seeded radio-environment simulator for the decision engine.
//!
//! [`SimulatedEnvironment`] stands in for both the radio and the capture
//! watcher, so the whole epoch loop of `nextgen-brain` can run on a
//! laptop, deterministically, with its ground truth available for checks.

pub mod environment;

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::Result;
use crossbeam_channel::unbounded;
use serde::Serialize;

use nextgen_brain::endpoint::Encryption;
use nextgen_brain::persist::StateStore;
use nextgen_brain::runtime::{EpochRunner, EpochSummary};
use nextgen_brain::{Brain, BrainSummary, EndpointSnapshot};

pub use environment::{EnvironmentConfig, SimStats, SimulatedEnvironment};

/// Actions per epoch of a strategy that attacks every encrypted endpoint
/// every epoch: one deauth per client, or one association when clientless.
pub fn naive_actions_per_epoch(endpoints: &[EndpointSnapshot]) -> u64 {
    endpoints
        .iter()
        .filter(|ep| !Encryption::parse(&ep.encryption).is_open())
        .map(|ep| ep.clients.len().max(1) as u64)
        .sum()
}

/// Final report printed by the simulator binary.
#[derive(Debug, Clone, Serialize)]
pub struct SimReport {
    pub epochs: usize,
    pub interrupted: bool,
    pub actions: u64,
    pub naive_baseline: u64,
    pub new_captures: u64,
    pub environment: SimStats,
    pub brain: BrainSummary,
}

/// A brain wired to a simulated environment.
pub struct Simulation<S: StateStore> {
    runner: EpochRunner<SimulatedEnvironment, S>,
}

impl<S: StateStore> Simulation<S> {
    pub fn new(brain: Brain, environment: EnvironmentConfig, store: S) -> Self {
        let (tx, rx) = unbounded();
        let env = SimulatedEnvironment::new(environment, tx);
        Self {
            runner: EpochRunner::new(brain, env, store, rx),
        }
    }

    pub fn with_shutdown(self, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            runner: self.runner.with_shutdown(shutdown),
        }
    }

    pub fn run(&mut self, epochs: u64) -> Result<Vec<EpochSummary>> {
        self.runner.run(epochs)
    }

    pub fn brain(&self) -> &Brain {
        self.runner.brain()
    }

    pub fn brain_mut(&mut self) -> &mut Brain {
        self.runner.brain_mut()
    }

    pub fn environment(&self) -> &SimulatedEnvironment {
        self.runner.radio()
    }

    pub fn report(&self, summaries: &[EpochSummary]) -> SimReport {
        let env = self.environment();
        SimReport {
            epochs: summaries.len(),
            interrupted: summaries.last().is_some_and(|s| s.interrupted),
            actions: summaries.iter().map(|s| u64::from(s.outcomes.actions)).sum(),
            naive_baseline: naive_actions_per_epoch(env.endpoints()) * summaries.len() as u64,
            new_captures: summaries
                .iter()
                .map(|s| u64::from(s.outcomes.new_captures))
                .sum(),
            environment: env.stats(),
            brain: self.brain().summary(),
        }
    }
}
