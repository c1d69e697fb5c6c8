//! The decision orchestrator.
//!
//! [`Brain`] owns the channel bandit, the tactical engine and the timing
//! optimizer and is the only thing that moves data between them. One epoch
//! is always:
//!
//! ```text
//! plan_epoch(scan) ──► host executes plan ──► on_capture(..)* ──► report_outcomes(report)
//! ```
//!
//! `report_outcomes` may be called with a partial report (e.g. after a
//! shutdown signal); anything missing from it simply does not update.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use rand::RngExt;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::bandit::{BandStats, ChannelBandit};
use crate::channel::{Band, ChannelId};
use crate::config::BrainConfig;
use crate::endpoint::{Endpoint, EndpointSnapshot};
use crate::mac::MacAddr;
use crate::mode::Mode;
use crate::optimizer::{BayesianOptimizer, OptimizerConfig, ParamSpace, TimingParams};
use crate::persist::{BrainState, PersistError, STATE_VERSION, StateStore};
use crate::tactical::{
    CaptureEvent, CaptureOutcome, DescriptorError, EpochOutcomes, PlanEntry, TacticalEngine,
};

/// Warm-start prior per observed client, capped at [`MAX_PRIOR`].
const PRIOR_PER_CLIENT: f64 = 0.1;
const MAX_PRIOR: f64 = 0.5;
/// Successes credited to one channel per epoch at most.
const MAX_CHANNEL_CREDIT: u32 = 3;

/// What to do this epoch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpochPlan {
    pub epoch: u64,
    pub mode: Mode,
    /// Channels to focus on, best first.
    pub channels: Vec<ChannelId>,
    /// Actions on the focused channels, highest score first.
    pub attacks: Vec<PlanEntry>,
    pub timing: TimingParams,
}

impl EpochPlan {
    pub fn attacks_on(&self, channel: ChannelId) -> impl Iterator<Item = &PlanEntry> {
        self.attacks.iter().filter(move |e| e.channel == channel)
    }
}

/// Captures credited to one focused channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelOutcome {
    pub channel: ChannelId,
    pub new_captures: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpochReport {
    pub channels: Vec<ChannelOutcome>,
    pub outcomes: EpochOutcomes,
}

/// Snapshot for the host's status display.
#[derive(Debug, Clone, Serialize)]
pub struct BrainSummary {
    pub mode: Mode,
    pub status: &'static str,
    pub epochs: u64,
    pub arms: usize,
    pub captured_pairs: usize,
    pub captured_endpoints: usize,
    pub known_endpoints: usize,
    pub bands: BTreeMap<Band, BandStats>,
    pub timing: TimingParams,
    pub observations: usize,
    pub best_timing: Option<TimingParams>,
    pub best_reward: Option<f64>,
    pub last_reward: Option<f64>,
}

pub struct Brain {
    config: BrainConfig,
    mode: Mode,
    pending_mode: Option<Mode>,
    rng: StdRng,
    bandit: ChannelBandit,
    tactical: TacticalEngine,
    optimizer: Option<BayesianOptimizer>,
    timing: TimingParams,
    known_endpoints: BTreeSet<MacAddr>,
    /// Endpoint → channel from the latest scan, for capture attribution.
    last_scan: HashMap<MacAddr, ChannelId>,
    focused: Vec<ChannelId>,
    epoch: u64,
    new_endpoints: u32,
    last_reward: Option<f64>,
}

impl Brain {
    pub fn new(config: BrainConfig) -> Self {
        let seed = config
            .seed
            .unwrap_or_else(|| rand::rng().random::<u64>());
        let optimizer = config.optimize_timing.then(|| {
            BayesianOptimizer::new(ParamSpace::timing(), optimizer_config(&config))
        });
        let brain = Brain {
            mode: config.mode,
            pending_mode: None,
            rng: StdRng::seed_from_u64(seed),
            bandit: ChannelBandit::new(config.bandit_window),
            tactical: TacticalEngine::new(config.max_interactions_per_epoch),
            optimizer,
            timing: TimingParams::default(),
            known_endpoints: BTreeSet::new(),
            last_scan: HashMap::new(),
            focused: Vec::new(),
            epoch: 0,
            new_endpoints: 0,
            last_reward: None,
            config,
        };
        info!(mode = %brain.mode, "{}", brain.mode.banner());
        brain
    }

    /// Rebuild from saved state. The saved mode wins over the configured one.
    pub fn restore(config: BrainConfig, state: BrainState) -> Self {
        let mut brain = Brain::new(config);
        brain.mode = state.mode;
        brain.bandit = ChannelBandit::restore(state.bandit, brain.config.bandit_window);
        brain.tactical = TacticalEngine::restore(
            brain.config.max_interactions_per_epoch,
            state.ledger,
            state.interactions,
        );
        if brain.optimizer.is_some() {
            brain.optimizer = Some(BayesianOptimizer::restore(
                ParamSpace::timing(),
                optimizer_config(&brain.config),
                state.optimizer,
            ));
        }
        brain.timing = state.timing;
        let reset = brain.timing.sanitize();
        if !reset.is_empty() {
            warn!(fields = ?reset, "saved timing out of bounds, using defaults");
        }
        brain.known_endpoints = state.known_endpoints.into_iter().collect();
        brain.epoch = state.epoch;
        info!(
            mode = %brain.mode,
            arms = brain.bandit.arm_count(),
            captured = brain.tactical.ledger().pair_count(),
            epoch = brain.epoch,
            "restored brain state: {}",
            brain.mode.banner()
        );
        brain
    }

    /// Load from `store`, starting fresh if nothing usable is there.
    pub fn load(config: BrainConfig, store: &dyn StateStore) -> Self {
        let blob = match store.load() {
            Ok(Some(blob)) => blob,
            Ok(None) => return Brain::new(config),
            Err(e) => {
                warn!(error = %e, "could not read saved state, starting fresh");
                return Brain::new(config);
            }
        };
        match BrainState::from_bytes(&blob) {
            Ok(state) => Brain::restore(config, state),
            Err(e) => {
                warn!(error = %e, "ignoring undecodable saved state");
                Brain::new(config)
            }
        }
    }

    pub fn state(&self) -> BrainState {
        BrainState {
            version: STATE_VERSION,
            mode: self.pending_mode.unwrap_or(self.mode),
            bandit: self.bandit.state(),
            ledger: self.tactical.ledger().records(),
            interactions: self.tactical.interaction_entries(),
            optimizer: self
                .optimizer
                .as_ref()
                .map(BayesianOptimizer::state)
                .unwrap_or_default(),
            timing: self.timing,
            known_endpoints: self.known_endpoints.iter().copied().collect(),
            epoch: self.epoch,
        }
    }

    pub fn save(&self, store: &mut dyn StateStore) -> Result<(), PersistError> {
        store.save(&self.state().to_bytes()?)
    }

    // ─── Mode ───────────────────────────────────────────────────────────

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Switch mode from the next epoch on.
    pub fn set_mode(&mut self, mode: Mode) {
        if mode == self.mode {
            self.pending_mode = None;
            return;
        }
        info!(from = %self.mode, to = %mode, "mode change queued for next epoch");
        self.pending_mode = Some(mode);
    }

    pub fn status_code(&self) -> &'static str {
        self.mode.short_code()
    }

    // ─── Epoch ──────────────────────────────────────────────────────────

    pub fn plan_epoch(&mut self, scan: &[EndpointSnapshot]) -> EpochPlan {
        if let Some(mode) = self.pending_mode.take() {
            self.mode = mode;
            info!(mode = %mode, "{}", mode.banner());
        }
        self.epoch += 1;

        let endpoints: Vec<Endpoint> = scan
            .iter()
            .filter_map(|snap| {
                let ep = Endpoint::from_snapshot(snap);
                if ep.is_none() {
                    warn!(
                        bssid = %snap.bssid,
                        band = %snap.band,
                        channel = snap.channel,
                        "skipping endpoint on unknown channel"
                    );
                }
                ep
            })
            .collect();

        self.new_endpoints = endpoints
            .iter()
            .filter(|ep| self.known_endpoints.insert(ep.bssid))
            .count() as u32;
        self.last_scan = endpoints.iter().map(|ep| (ep.bssid, ep.channel)).collect();

        let mut clients_per_channel: BTreeMap<ChannelId, u32> = BTreeMap::new();
        for ep in &endpoints {
            *clients_per_channel.entry(ep.channel).or_insert(0) += ep.client_count() as u32;
        }
        for (&channel, &clients) in &clients_per_channel {
            self.bandit.record_client_activity(channel, clients);
            if clients > 0 {
                let weight = (PRIOR_PER_CLIENT * f64::from(clients)).min(MAX_PRIOR);
                self.bandit.apply_prior(channel, weight);
            }
        }

        let visible: Vec<ChannelId> = clients_per_channel.keys().copied().collect();
        let channels =
            self.bandit
                .select_channels(self.config.channels_per_epoch, &visible, &mut self.rng);
        self.focused = channels.clone();

        self.tactical.observe_scan(&endpoints);
        let attacks = if self.config.enabled {
            let focused: Vec<Endpoint> = endpoints
                .into_iter()
                .filter(|ep| channels.contains(&ep.channel))
                .collect();
            self.tactical
                .plan_epoch(&focused, self.mode, self.config.target_cap(self.mode))
        } else {
            Vec::new()
        };

        debug!(
            epoch = self.epoch,
            mode = %self.mode,
            visible = scan.len(),
            new_endpoints = self.new_endpoints,
            channels = ?channels.iter().map(ToString::to_string).collect::<Vec<_>>(),
            attacks = attacks.len(),
            "epoch planned"
        );

        EpochPlan {
            epoch: self.epoch,
            mode: self.mode,
            channels,
            attacks,
            timing: self.timing,
        }
    }

    /// Channel `bssid` was seen on in the latest scan.
    pub fn channel_of(&self, bssid: MacAddr) -> Option<ChannelId> {
        self.last_scan.get(&bssid).copied()
    }

    /// Record that an action was transmitted against `bssid`.
    pub fn record_interaction(&mut self, bssid: MacAddr) {
        self.tactical.record_interaction(bssid);
    }

    pub fn on_capture(&mut self, event: &CaptureEvent) -> CaptureOutcome {
        self.tactical.on_capture(event)
    }

    /// Parse and record a capture descriptor. Malformed descriptors are
    /// logged and dropped.
    pub fn on_capture_descriptor(
        &mut self,
        descriptor: &str,
    ) -> Result<CaptureOutcome, DescriptorError> {
        self.tactical.on_capture_descriptor(descriptor)
    }

    /// Close the epoch: credit channels, score the epoch, feed the optimizer.
    ///
    /// Returns the timing parameters to use next, or `None` when timing is
    /// not being optimised (disabled, or passive mode).
    pub fn report_outcomes(&mut self, report: &EpochReport) -> Option<TimingParams> {
        for outcome in &report.channels {
            if !self.focused.contains(&outcome.channel) {
                warn!(
                    channel = %outcome.channel,
                    "outcome for a channel outside this epoch's focus, ignoring"
                );
                continue;
            }
            if outcome.new_captures == 0 {
                self.bandit.record_outcome(outcome.channel, false);
            } else {
                for _ in 0..outcome.new_captures.min(MAX_CHANNEL_CREDIT) {
                    self.bandit.record_outcome(outcome.channel, true);
                }
            }
        }

        let mut outcomes = report.outcomes;
        outcomes.new_endpoints = outcomes.new_endpoints.max(self.new_endpoints);
        let reward = self.tactical.compute_reward(&outcomes);
        self.last_reward = Some(reward);
        self.tactical.end_epoch();

        info!(
            epoch = self.epoch,
            mode = %self.mode,
            reward,
            new_captures = outcomes.new_captures,
            actions = outcomes.actions,
            captured_pairs = self.tactical.ledger().pair_count(),
            "epoch complete"
        );

        if !self.mode.transmits() {
            return None;
        }
        let optimizer = self.optimizer.as_mut()?;
        optimizer.observe(&self.timing.to_vec(), reward);
        let next = optimizer.suggest(&mut self.rng);
        match TimingParams::from_slice(&next) {
            Some(timing) => {
                debug!(?timing, "next timing parameters");
                self.timing = timing;
                Some(timing)
            }
            None => {
                warn!(len = next.len(), "optimizer returned malformed timing vector");
                None
            }
        }
    }

    // ─── Introspection ──────────────────────────────────────────────────

    pub fn config(&self) -> &BrainConfig {
        &self.config
    }

    pub fn bandit(&self) -> &ChannelBandit {
        &self.bandit
    }

    pub fn tactical(&self) -> &TacticalEngine {
        &self.tactical
    }

    pub fn optimizer(&self) -> Option<&BayesianOptimizer> {
        self.optimizer.as_ref()
    }

    pub fn timing(&self) -> TimingParams {
        self.timing
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn summary(&self) -> BrainSummary {
        let best = self.optimizer.as_ref().and_then(BayesianOptimizer::best);
        BrainSummary {
            mode: self.mode,
            status: self.status_code(),
            epochs: self.epoch,
            arms: self.bandit.arm_count(),
            captured_pairs: self.tactical.ledger().pair_count(),
            captured_endpoints: self.tactical.ledger().endpoint_count(),
            known_endpoints: self.known_endpoints.len(),
            bands: self.bandit.band_stats(),
            timing: self.timing,
            observations: self.optimizer.as_ref().map_or(0, BayesianOptimizer::len),
            best_timing: best.as_ref().and_then(|(p, _)| TimingParams::from_slice(p)),
            best_reward: best.map(|(_, r)| r),
            last_reward: self.last_reward,
        }
    }
}

fn optimizer_config(config: &BrainConfig) -> OptimizerConfig {
    OptimizerConfig {
        max_observations: config.max_observations,
        initial_random: config.initial_random_epochs,
        candidates: config.acquisition_candidates,
        ..OptimizerConfig::default()
    }
}
