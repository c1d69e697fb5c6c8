use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::{Result, bail};
use crossbeam_channel::Sender;
use rand::RngExt as _;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tracing::{debug, trace};

use nextgen_brain::radio::{RadioAdapter, TransmitOutcome};
use nextgen_brain::tactical::{AttackAction, CaptureEvent, SubEndpoint};
use nextgen_brain::{Band, ClientSnapshot, EndpointSnapshot, MacAddr};

/// Raw channels of the reference survey: all of 2.4 GHz plus the lower 5 GHz block.
const REFERENCE_CHANNELS: [(Band, u16); 25] = [
    (Band::TwoGhz, 1),
    (Band::TwoGhz, 2),
    (Band::TwoGhz, 3),
    (Band::TwoGhz, 4),
    (Band::TwoGhz, 5),
    (Band::TwoGhz, 6),
    (Band::TwoGhz, 7),
    (Band::TwoGhz, 8),
    (Band::TwoGhz, 9),
    (Band::TwoGhz, 10),
    (Band::TwoGhz, 11),
    (Band::TwoGhz, 12),
    (Band::TwoGhz, 13),
    (Band::TwoGhz, 14),
    (Band::FiveGhz, 36),
    (Band::FiveGhz, 40),
    (Band::FiveGhz, 44),
    (Band::FiveGhz, 48),
    (Band::FiveGhz, 52),
    (Band::FiveGhz, 56),
    (Band::FiveGhz, 60),
    (Band::FiveGhz, 64),
    (Band::FiveGhz, 100),
    (Band::FiveGhz, 104),
    (Band::FiveGhz, 108),
];

/// Capture epoch used for descriptor timestamps.
const START_TIMESTAMP: u64 = 1_772_000_000;

/// Configuration for a deterministic radio environment.
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub seed: u64,
    pub endpoints: Vec<EndpointSnapshot>,
    /// A deauthed client re-associates (and is heard doing so).
    pub reaction_probability: f64,
    /// A re-association yields a full handshake.
    pub handshake_probability: f64,
    /// An association attempt yields a PMKID.
    pub pmkid_probability: f64,
    /// Per uncaptured client per channel visit, a handshake heard without
    /// any transmission.
    pub ambient_capture_probability: f64,
}

impl EnvironmentConfig {
    /// The reference survey: 50 endpoints over 25 channels, 149 associated
    /// clients, 13 of the endpoints unencrypted.
    ///
    /// Layout is fixed; `seed` only varies signal strength, ages and the
    /// outcome draws.
    pub fn reference(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed ^ 0x5eed_5eed);
        let endpoints = (0..50u8)
            .map(|i| {
                let (band, channel) =
                    REFERENCE_CHANNELS[usize::from(i) % REFERENCE_CHANNELS.len()];
                let open = i % 3 == 2 && i <= 38;
                let clients = i % 6 + u8::from(i < 28);
                EndpointSnapshot {
                    bssid: MacAddr::new([0x02, 0x5e, 0x00, 0x00, 0x00, i]),
                    ssid: Some(format!("survey-{i:02}")),
                    band,
                    channel,
                    rssi: -40 - rng.random_range(0..45),
                    encryption: if open { "OPEN" } else { "WPA2 PSK" }.into(),
                    clients: (0..clients)
                        .map(|c| ClientSnapshot {
                            mac: MacAddr::new([0x06, 0x5e, 0x00, 0x00, i, c]),
                            age: Duration::from_secs(rng.random_range(0..90)),
                        })
                        .collect(),
                    age: Duration::from_secs(rng.random_range(0..30)),
                }
            })
            .collect();
        Self {
            seed,
            endpoints,
            ..Self::default()
        }
    }
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            endpoints: Vec::new(),
            reaction_probability: 0.8,
            handshake_probability: 0.75,
            pmkid_probability: 0.5,
            ambient_capture_probability: 0.02,
        }
    }
}

/// Running totals kept by the environment itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SimStats {
    pub scans: u64,
    pub locks: u64,
    pub transmissions: u64,
    /// Transmissions against an endpoint that had nothing left to capture.
    pub wasted: u64,
    /// Transmissions while parked on a different channel than the target.
    pub misdirected: u64,
    pub reactions: u64,
    pub captures: u64,
    pub ambient_captures: u64,
}

/// Deterministic stand-in for the radio and the capture watcher.
///
/// Captures are emitted as descriptors on `captures`, exactly as a file
/// watcher would report them.
pub struct SimulatedEnvironment {
    cfg: EnvironmentConfig,
    rng: StdRng,
    captures: Sender<String>,
    /// Ground truth of everything captured so far.
    captured: BTreeSet<(MacAddr, SubEndpoint)>,
    locked: Option<(Band, u16)>,
    clock: u64,
    stats: SimStats,
}

impl SimulatedEnvironment {
    pub fn new(cfg: EnvironmentConfig, captures: Sender<String>) -> Self {
        let rng = StdRng::seed_from_u64(cfg.seed);
        Self {
            cfg,
            rng,
            captures,
            captured: BTreeSet::new(),
            locked: None,
            clock: START_TIMESTAMP,
            stats: SimStats::default(),
        }
    }

    pub fn stats(&self) -> SimStats {
        self.stats
    }

    pub fn endpoints(&self) -> &[EndpointSnapshot] {
        &self.cfg.endpoints
    }

    /// Distinct (endpoint, sub-endpoint) pairs captured so far.
    pub fn captured_pairs(&self) -> usize {
        self.captured.len()
    }

    /// Whether `ep` still has anything to capture.
    pub fn has_outstanding(&self, ep: &EndpointSnapshot) -> bool {
        if !self
            .captured
            .iter()
            .any(|(bssid, _)| *bssid == ep.bssid)
        {
            return true;
        }
        ep.clients
            .iter()
            .any(|c| !self.captured.contains(&(ep.bssid, SubEndpoint::Client(c.mac))))
    }

    fn endpoint(&self, bssid: MacAddr) -> Option<&EndpointSnapshot> {
        self.cfg.endpoints.iter().find(|ep| ep.bssid == bssid)
    }

    fn emit(&mut self, bssid: MacAddr, sub: SubEndpoint) -> Result<()> {
        self.clock += 1;
        self.captured.insert((bssid, sub));
        self.stats.captures += 1;
        let descriptor = CaptureEvent::new(bssid, sub, self.clock).to_descriptor();
        trace!(%descriptor, "capture");
        self.captures.send(descriptor)?;
        Ok(())
    }

    /// Deauth `client` and maybe hear its handshake. Returns whether it reacted.
    fn deauth(&mut self, bssid: MacAddr, client: MacAddr) -> Result<bool> {
        if !self.rng.random_bool(self.cfg.reaction_probability) {
            return Ok(false);
        }
        self.stats.reactions += 1;
        if self.rng.random_bool(self.cfg.handshake_probability) {
            self.emit(bssid, SubEndpoint::Client(client))?;
        }
        Ok(true)
    }
}

impl RadioAdapter for SimulatedEnvironment {
    fn scan(&mut self) -> Result<Vec<EndpointSnapshot>> {
        self.stats.scans += 1;
        Ok(self.cfg.endpoints.clone())
    }

    fn lock_channel(&mut self, band: Band, raw_channel: u16, _dwell: Duration) -> Result<()> {
        if !band.raw_range().contains(&raw_channel) {
            bail!("raw channel {raw_channel} is not in {band}");
        }
        self.stats.locks += 1;
        self.locked = Some((band, raw_channel));
        Ok(())
    }

    /// Leaving a channel also collects whatever was overheard while parked.
    fn release_channel_lock(&mut self) -> Result<()> {
        let Some((band, channel)) = self.locked.take() else {
            return Ok(());
        };
        let overheard: Vec<(MacAddr, MacAddr)> = self
            .cfg
            .endpoints
            .iter()
            .filter(|ep| ep.band == band && ep.channel == channel)
            .flat_map(|ep| ep.clients.iter().map(move |c| (ep.bssid, c.mac)))
            .filter(|&(bssid, client)| {
                !self.captured.contains(&(bssid, SubEndpoint::Client(client)))
            })
            .collect();
        for (bssid, client) in overheard {
            if self.rng.random_bool(self.cfg.ambient_capture_probability) {
                self.stats.ambient_captures += 1;
                self.emit(bssid, SubEndpoint::Client(client))?;
            }
        }
        Ok(())
    }

    fn transmit(
        &mut self,
        endpoint: MacAddr,
        action: AttackAction,
        client: Option<MacAddr>,
    ) -> Result<TransmitOutcome> {
        let Some(ep) = self.endpoint(endpoint).cloned() else {
            bail!("no such endpoint {endpoint}");
        };
        if self.locked != Some((ep.band, ep.channel)) {
            self.stats.misdirected += 1;
            debug!(%endpoint, "transmit on the wrong channel");
            return Ok(TransmitOutcome {
                sent: false,
                reaction: false,
            });
        }

        self.stats.transmissions += 1;
        if !self.has_outstanding(&ep) {
            self.stats.wasted += 1;
        }

        let reaction = match (action, client) {
            (AttackAction::TargetedDeauth { .. }, Some(client)) => self.deauth(endpoint, client)?,
            (AttackAction::BroadcastDeauth, _) => {
                let mut any = false;
                for c in &ep.clients {
                    any |= self.deauth(endpoint, c.mac)?;
                }
                any
            }
            (AttackAction::Associate, _) => {
                if self.rng.random_bool(self.cfg.pmkid_probability) {
                    self.emit(endpoint, SubEndpoint::Whole)?;
                }
                false
            }
            _ => false,
        };
        Ok(TransmitOutcome {
            sent: true,
            reaction,
        })
    }
}
