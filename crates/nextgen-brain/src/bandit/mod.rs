//! # Channel Bandit: Thompson Sampling over Wi-Fi Channels
//!
//! Every channel is an arm. Focusing an epoch on a channel pulls the arm;
//! the reward is whether captures came out of it. Each arm keeps a bounded
//! sliding window of evidence and the posterior is
//! `Beta(1 + Σ successes, 1 + Σ failures)` over that window only, so a channel
//! that goes quiet loses its old credit once it slides out.
//!
//! Warm-start priors ([`ChannelBandit::apply_prior`]) are fractional
//! pseudo-successes placed in the same window. They shift the posterior
//! before the arm has ever been pulled and age out with the rest of the
//! evidence.
//!
//! Band membership is tracked for diagnostics only; arms compete purely on
//! their sampled posterior.

pub mod beta;

use std::cmp::Ordering;
use std::collections::{BTreeMap, VecDeque};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::channel::{Band, ChannelId};
use beta::BetaParams;

/// One unit of evidence inside an arm's window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub success: f64,
    pub failure: f64,
}

impl Evidence {
    fn outcome(success: bool) -> Self {
        if success {
            Evidence {
                success: 1.0,
                failure: 0.0,
            }
        } else {
            Evidence {
                success: 0.0,
                failure: 1.0,
            }
        }
    }
}

/// Per-arm statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArmState {
    window: VecDeque<Evidence>,
    /// Real outcomes recorded (priors excluded), never windowed.
    total_scans: u64,
    client_activity: VecDeque<u32>,
}

impl ArmState {
    fn push(&mut self, evidence: Evidence, window: usize) {
        self.window.push_back(evidence);
        while self.window.len() > window {
            self.window.pop_front();
        }
    }

    fn trim(&mut self, window: usize) {
        while self.window.len() > window {
            self.window.pop_front();
        }
        while self.client_activity.len() > window {
            self.client_activity.pop_front();
        }
    }

    /// `(successes, failures)` summed over the window.
    pub fn windowed(&self) -> (f64, f64) {
        self.window.iter().fold((0.0, 0.0), |(s, f), e| {
            (s + e.success, f + e.failure)
        })
    }

    pub fn posterior(&self) -> BetaParams {
        let (s, f) = self.windowed();
        BetaParams::posterior(s, f)
    }

    pub fn total_scans(&self) -> u64 {
        self.total_scans
    }

    pub fn avg_client_activity(&self) -> f64 {
        if self.client_activity.is_empty() {
            return 0.0;
        }
        self.client_activity.iter().map(|&c| c as f64).sum::<f64>()
            / self.client_activity.len() as f64
    }
}

/// Diagnostic view of one arm.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArmStats {
    pub channel: ChannelId,
    pub band: Band,
    pub scans: u64,
    pub successes_windowed: f64,
    pub failures_windowed: f64,
    pub success_rate: f64,
    pub avg_client_activity: f64,
}

/// Aggregate over all arms of one band.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BandStats {
    pub channels: usize,
    pub total_scans: u64,
    pub successes: f64,
    pub failures: f64,
    pub success_rate: f64,
}

/// Persisted form of one arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmRecord {
    pub channel: ChannelId,
    pub state: ArmState,
}

/// Persisted form of the whole bandit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BanditState {
    pub arms: Vec<ArmRecord>,
    pub total_updates: u64,
}

/// Thompson Sampling channel selector.
#[derive(Debug, Clone)]
pub struct ChannelBandit {
    arms: BTreeMap<ChannelId, ArmState>,
    window: usize,
    total_updates: u64,
}

impl ChannelBandit {
    pub fn new(window: usize) -> Self {
        ChannelBandit {
            arms: BTreeMap::new(),
            window: window.max(1),
            total_updates: 0,
        }
    }

    /// Bandit with the given arms pre-registered at neutral priors.
    pub fn with_channels(channels: impl IntoIterator<Item = ChannelId>, window: usize) -> Self {
        let mut bandit = Self::new(window);
        for ch in channels {
            bandit.register(ch);
        }
        bandit
    }

    /// Rebuild from persisted state, re-trimming windows to `window`.
    pub fn restore(state: BanditState, window: usize) -> Self {
        let mut bandit = Self::new(window);
        for record in state.arms {
            let mut arm = record.state;
            arm.trim(bandit.window);
            bandit.arms.insert(record.channel, arm);
        }
        bandit.total_updates = state.total_updates;
        bandit
    }

    pub fn state(&self) -> BanditState {
        BanditState {
            arms: self
                .arms
                .iter()
                .map(|(&channel, state)| ArmRecord {
                    channel,
                    state: state.clone(),
                })
                .collect(),
            total_updates: self.total_updates,
        }
    }

    /// Register an arm with neutral priors. Returns `false` if already known.
    pub fn register(&mut self, channel: ChannelId) -> bool {
        if self.arms.contains_key(&channel) {
            return false;
        }
        self.arms.insert(channel, ArmState::default());
        true
    }

    fn arm_mut(&mut self, channel: ChannelId) -> &mut ArmState {
        if !self.arms.contains_key(&channel) {
            debug!(%channel, "auto-registering unseen channel");
        }
        self.arms.entry(channel).or_default()
    }

    /// Choose up to `k` distinct arms by posterior sampling.
    ///
    /// Channels in `visible` that are not yet arms are registered first, so
    /// traffic on a new channel makes it eligible immediately. `k == 0` is
    /// clamped to 1; `k` above the arm count returns every arm.
    pub fn select_channels(
        &mut self,
        k: usize,
        visible: &[ChannelId],
        rng: &mut impl Rng,
    ) -> Vec<ChannelId> {
        let k = if k == 0 {
            warn!("zero channels requested, clamping to 1");
            1
        } else {
            k
        };
        for &ch in visible {
            self.register(ch);
        }

        let mut scored: Vec<(ChannelId, f64)> = self
            .arms
            .iter()
            .map(|(&ch, arm)| (ch, arm.posterior().sample(rng)))
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);
        scored.into_iter().map(|(ch, _)| ch).collect()
    }

    /// Record the result of focusing an epoch on `channel`.
    pub fn record_outcome(&mut self, channel: ChannelId, success: bool) {
        let window = self.window;
        let arm = self.arm_mut(channel);
        arm.push(Evidence::outcome(success), window);
        arm.total_scans += 1;
        self.total_updates += 1;
    }

    /// Inject a warm-start bias: `weight` pseudo-successes for `channel`.
    ///
    /// Unlike [`record_outcome`](Self::record_outcome) this does not count as
    /// a scan. Non-finite or non-positive weights are ignored.
    pub fn apply_prior(&mut self, channel: ChannelId, weight: f64) {
        if !weight.is_finite() || weight <= 0.0 {
            warn!(%channel, weight, "ignoring invalid prior weight");
            return;
        }
        let window = self.window;
        self.arm_mut(channel).push(
            Evidence {
                success: weight,
                failure: 0.0,
            },
            window,
        );
    }

    /// Record how many clients a scan saw on `channel`.
    pub fn record_client_activity(&mut self, channel: ChannelId, clients: u32) {
        let window = self.window;
        let arm = self.arm_mut(channel);
        arm.client_activity.push_back(clients);
        while arm.client_activity.len() > window {
            arm.client_activity.pop_front();
        }
    }

    pub fn arm(&self, channel: ChannelId) -> Option<&ArmState> {
        self.arms.get(&channel)
    }

    pub fn channels(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.arms.keys().copied()
    }

    pub fn arm_count(&self) -> usize {
        self.arms.len()
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn total_updates(&self) -> u64 {
        self.total_updates
    }

    pub fn arm_stats(&self) -> Vec<ArmStats> {
        self.arms
            .iter()
            .map(|(&channel, arm)| {
                let (s, f) = arm.windowed();
                ArmStats {
                    channel,
                    band: channel.band(),
                    scans: arm.total_scans,
                    successes_windowed: s,
                    failures_windowed: f,
                    success_rate: if s + f > 0.0 { s / (s + f) } else { 0.0 },
                    avg_client_activity: arm.avg_client_activity(),
                }
            })
            .collect()
    }

    pub fn band_stats(&self) -> BTreeMap<Band, BandStats> {
        let mut out: BTreeMap<Band, BandStats> = BTreeMap::new();
        for (&channel, arm) in &self.arms {
            let (s, f) = arm.windowed();
            let entry = out.entry(channel.band()).or_default();
            entry.channels += 1;
            entry.total_scans += arm.total_scans;
            entry.successes += s;
            entry.failures += f;
        }
        for stats in out.values_mut() {
            let total = stats.successes + stats.failures;
            stats.success_rate = if total > 0.0 {
                stats.successes / total
            } else {
                0.0
            };
        }
        out
    }
}
