//! Drives whole epochs against a radio.
//!
//! [`EpochRunner`] glues a [`Brain`] to a [`RadioAdapter`], a capture
//! descriptor stream and a [`StateStore`]:
//!
//! ```text
//! scan ─► plan ─► for each channel: lock ─► transmit* ─► release
//!                                         │
//!            captures (crossbeam) ◄───────┘
//!                 │
//!                 ▼
//!              report ─► save
//! ```
//!
//! The shutdown flag is checked between channels and between actions. A
//! shutdown mid-epoch still reports what happened so far and saves state.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::brain::{Brain, ChannelOutcome, EpochReport};
use crate::channel::ChannelId;
use crate::mode::Mode;
use crate::optimizer::TimingParams;
use crate::persist::StateStore;
use crate::radio::{self, RadioAdapter};
use crate::tactical::{CaptureEvent, CaptureOutcome, EpochOutcomes};

/// What one epoch did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpochSummary {
    pub epoch: u64,
    pub mode: Mode,
    pub channels_visited: usize,
    pub planned: usize,
    pub outcomes: EpochOutcomes,
    pub next_timing: Option<TimingParams>,
    /// The shutdown flag cut the epoch short.
    pub interrupted: bool,
}

pub struct EpochRunner<R: RadioAdapter, S: StateStore> {
    brain: Brain,
    radio: R,
    store: S,
    captures: Receiver<String>,
    shutdown: Arc<AtomicBool>,
}

impl<R: RadioAdapter, S: StateStore> EpochRunner<R, S> {
    pub fn new(brain: Brain, radio: R, store: S, captures: Receiver<String>) -> Self {
        EpochRunner {
            brain,
            radio,
            store,
            captures,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share an externally owned shutdown flag (e.g. set by a signal handler).
    pub fn with_shutdown(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    fn stopping(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    pub fn brain(&self) -> &Brain {
        &self.brain
    }

    pub fn brain_mut(&mut self) -> &mut Brain {
        &mut self.brain
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn into_parts(self) -> (Brain, R, S) {
        (self.brain, self.radio, self.store)
    }

    /// Run one full epoch. Fails only when the scan fails, before anything
    /// is planned.
    pub fn run_epoch(&mut self) -> Result<EpochSummary> {
        let scan = self.radio.scan().context("radio scan failed")?;
        let plan = self.brain.plan_epoch(&scan);
        let dwell = dwell_time(plan.timing.hop_recon_time);

        let mut outcomes = EpochOutcomes::default();
        let mut visited: Vec<ChannelId> = Vec::with_capacity(plan.channels.len());
        let mut interrupted = false;

        'channels: for &channel in &plan.channels {
            if self.stopping() {
                interrupted = true;
                break;
            }
            if let Err(e) = radio::lock(&mut self.radio, channel, dwell) {
                warn!(%channel, error = %e, "channel lock failed, skipping channel");
                continue;
            }
            visited.push(channel);

            for entry in plan.attacks_on(channel) {
                if self.stopping() {
                    interrupted = true;
                    self.release();
                    break 'channels;
                }
                if !plan.mode.transmits() || !entry.action.transmits() {
                    continue;
                }
                match self
                    .radio
                    .transmit(entry.bssid, entry.action, entry.action.client())
                {
                    Ok(result) if result.sent => {
                        self.brain.record_interaction(entry.bssid);
                        outcomes.actions += 1;
                        if entry.uncaptured {
                            outcomes.uncaptured_actions += 1;
                        }
                        if result.reaction {
                            outcomes.reactions += 1;
                        }
                    }
                    Ok(_) => {
                        debug!(bssid = %entry.bssid, action = %entry.action, "action not sent");
                    }
                    Err(e) => {
                        warn!(
                            bssid = %entry.bssid,
                            action = %entry.action,
                            error = %e,
                            "transmit failed"
                        );
                    }
                }
            }
            self.release();
        }

        let per_channel = self.drain_captures(&mut outcomes);
        let report = EpochReport {
            channels: visited
                .iter()
                .map(|&channel| ChannelOutcome {
                    channel,
                    new_captures: per_channel.get(&channel).copied().unwrap_or(0),
                })
                .collect(),
            outcomes,
        };
        let next_timing = self.brain.report_outcomes(&report);
        self.save();

        let summary = EpochSummary {
            epoch: plan.epoch,
            mode: plan.mode,
            channels_visited: visited.len(),
            planned: plan.attacks.len(),
            outcomes: report.outcomes,
            next_timing,
            interrupted,
        };
        if interrupted {
            info!(
                epoch = summary.epoch,
                "epoch interrupted by shutdown, partial report submitted"
            );
        }
        Ok(summary)
    }

    /// Run up to `epochs` epochs, stopping early on shutdown. An epoch whose
    /// scan fails is skipped and produces no summary.
    pub fn run(&mut self, epochs: u64) -> Result<Vec<EpochSummary>> {
        let mut summaries = Vec::new();
        for attempt in 1..=epochs {
            if self.stopping() {
                break;
            }
            let summary = match self.run_epoch() {
                Ok(summary) => summary,
                Err(e) => {
                    warn!(attempt, error = %format!("{e:#}"), "epoch skipped");
                    continue;
                }
            };
            let interrupted = summary.interrupted;
            summaries.push(summary);
            if interrupted {
                break;
            }
        }
        self.save();
        Ok(summaries)
    }

    fn release(&mut self) {
        if let Err(e) = self.radio.release_channel_lock() {
            warn!(error = %e, "channel lock release failed");
        }
    }

    fn save(&mut self) {
        if let Err(e) = self.brain.save(&mut self.store) {
            warn!(error = %e, "failed to save brain state");
        }
    }

    /// Feed every pending capture descriptor into the brain. Returns new
    /// captures per channel.
    fn drain_captures(&mut self, outcomes: &mut EpochOutcomes) -> HashMap<ChannelId, u32> {
        let mut per_channel = HashMap::new();
        for descriptor in self.captures.try_iter() {
            let event: CaptureEvent = match descriptor.parse() {
                Ok(event) => event,
                Err(e) => {
                    warn!(%descriptor, error = %e, "dropping malformed capture descriptor");
                    continue;
                }
            };
            match self.brain.on_capture(&event) {
                CaptureOutcome::New => {
                    outcomes.new_captures += 1;
                    if let Some(channel) = self.brain.channel_of(event.endpoint) {
                        *per_channel.entry(channel).or_insert(0) += 1;
                    }
                }
                CaptureOutcome::Repeat => outcomes.repeat_captures += 1,
            }
        }
        per_channel
    }
}

/// Channel dwell for a hop. Hop times `Duration` cannot hold fall back to
/// the default.
fn dwell_time(hop_recon_time: f64) -> Duration {
    Duration::try_from_secs_f64(hop_recon_time).unwrap_or_else(|e| {
        let fallback = TimingParams::default().hop_recon_time;
        warn!(hop_recon_time, fallback, error = %e, "unusable hop time, using default dwell");
        Duration::from_secs_f64(fallback)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dwell_follows_hop_time() {
        assert_eq!(dwell_time(12.5), Duration::from_millis(12_500));
        assert_eq!(dwell_time(0.0), Duration::ZERO);
    }

    #[test]
    fn unrepresentable_hop_time_uses_default_dwell() {
        let fallback = Duration::from_secs_f64(TimingParams::default().hop_recon_time);
        assert_eq!(dwell_time(1e30), fallback);
        assert_eq!(dwell_time(-3.0), fallback);
        assert_eq!(dwell_time(f64::NAN), fallback);
        assert_eq!(dwell_time(f64::INFINITY), fallback);
    }
}
