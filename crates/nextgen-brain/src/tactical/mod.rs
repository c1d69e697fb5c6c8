//! Tactical planning: which endpoints to act on this epoch, and how.
//!
//! The engine owns the capture ledger and per-endpoint interaction history.
//! Each epoch it
//!
//! 1. drops open endpoints,
//! 2. works out what is still outstanding on every endpoint from the ledger,
//! 3. scores what is left and excludes anything at or below the skip
//!    threshold (exhausted targets, stale targets, per-epoch cap reached),
//! 4. routes each survivor to a concrete [`AttackAction`],
//! 5. returns the best `cap` entries, highest score first.
//!
//! Passive mode returns an empty plan before any of this happens.

pub mod action;
pub mod descriptor;
pub mod ledger;
pub mod reward;
pub mod scoring;

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::channel::ChannelId;
use crate::endpoint::Endpoint;
use crate::mac::MacAddr;
use crate::mode::Mode;

pub use action::{ActionIntent, AttackAction, Outstanding};
pub use descriptor::{CaptureEvent, CaptureKind, DescriptorError};
pub use ledger::{CaptureLedger, LedgerRecord, SubEndpoint};
pub use reward::{EpochOutcomes, RewardWeights, compute_reward};
pub use scoring::ScoreWeights;

/// One planned action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanEntry {
    pub bssid: MacAddr,
    pub channel: ChannelId,
    pub action: AttackAction,
    pub score: f64,
    /// Nothing at all was captured for this endpoint at plan time.
    pub uncaptured: bool,
}

/// Long-lived interaction history for one endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionRecord {
    /// Actions transmitted against the endpoint this session.
    pub session: u32,
    /// Actions since the endpoint last yielded a new capture.
    pub fruitless: u32,
}

/// Persisted form of an endpoint's interaction history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEntry {
    pub endpoint: MacAddr,
    #[serde(flatten)]
    pub record: InteractionRecord,
}

/// Result of feeding a capture into the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    New,
    Repeat,
}

#[derive(Debug, Clone)]
pub struct TacticalEngine {
    ledger: CaptureLedger,
    interactions: BTreeMap<MacAddr, InteractionRecord>,
    epoch_interactions: HashMap<MacAddr, u32>,
    /// Clients seen on each endpoint in the most recent scan.
    seen_clients: HashMap<MacAddr, Vec<MacAddr>>,
    weights: ScoreWeights,
    reward_weights: RewardWeights,
    max_interactions_per_epoch: u32,
}

impl TacticalEngine {
    pub fn new(max_interactions_per_epoch: u32) -> Self {
        TacticalEngine {
            ledger: CaptureLedger::new(),
            interactions: BTreeMap::new(),
            epoch_interactions: HashMap::new(),
            seen_clients: HashMap::new(),
            weights: ScoreWeights::default(),
            reward_weights: RewardWeights::default(),
            max_interactions_per_epoch: max_interactions_per_epoch.max(1),
        }
    }

    pub fn with_weights(mut self, weights: ScoreWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn restore(
        max_interactions_per_epoch: u32,
        ledger: Vec<LedgerRecord>,
        interactions: Vec<InteractionEntry>,
    ) -> Self {
        let mut engine = Self::new(max_interactions_per_epoch);
        engine.ledger = CaptureLedger::from_records(ledger);
        engine.interactions = interactions
            .into_iter()
            .map(|e| (e.endpoint, e.record))
            .collect();
        engine
    }

    pub fn ledger(&self) -> &CaptureLedger {
        &self.ledger
    }

    pub fn interaction_entries(&self) -> Vec<InteractionEntry> {
        self.interactions
            .iter()
            .map(|(&endpoint, &record)| InteractionEntry { endpoint, record })
            .collect()
    }

    pub fn interaction(&self, bssid: MacAddr) -> InteractionRecord {
        self.interactions.get(&bssid).copied().unwrap_or_default()
    }

    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    // ─── Ledger view ────────────────────────────────────────────────────

    /// What is left to capture on `ep`.
    pub fn outstanding(&self, ep: &Endpoint) -> Outstanding {
        let visible = ep.clients.iter().map(|c| &c.mac);
        if !self.ledger.has_any(ep.bssid) {
            return Outstanding::Fresh {
                clients: visible.copied().collect(),
            };
        }
        let new = self.ledger.new_clients(ep.bssid, visible);
        if new.is_empty() {
            Outstanding::Nothing
        } else {
            Outstanding::NewClients(new)
        }
    }

    /// Clients seen on `endpoint` in the latest scan that are not yet captured.
    pub fn get_new_clients(&self, endpoint: MacAddr) -> Vec<MacAddr> {
        match self.seen_clients.get(&endpoint) {
            Some(seen) => self.ledger.new_clients(endpoint, seen),
            None => Vec::new(),
        }
    }

    pub fn has_outstanding(&self, ep: &Endpoint) -> bool {
        !self.outstanding(ep).is_nothing()
    }

    /// Remember which clients the latest scan showed on each endpoint.
    pub fn observe_scan(&mut self, endpoints: &[Endpoint]) {
        self.seen_clients.clear();
        for ep in endpoints {
            self.seen_clients
                .insert(ep.bssid, ep.clients.iter().map(|c| c.mac).collect());
        }
    }

    // ─── Planning ───────────────────────────────────────────────────────

    /// Rank `endpoints` and return at most `cap` entries, best first, one per
    /// endpoint. Endpoints already touched `max_interactions_per_epoch` times
    /// since the last [`end_epoch`](Self::end_epoch) are left out, which
    /// matters to hosts that re-plan between actions.
    pub fn plan_epoch(&self, endpoints: &[Endpoint], mode: Mode, cap: usize) -> Vec<PlanEntry> {
        self.plan_epoch_with_intent(endpoints, mode, cap, |_| ActionIntent::Auto)
    }

    /// As [`plan_epoch`](Self::plan_epoch), with an upstream intent per endpoint.
    pub fn plan_epoch_with_intent(
        &self,
        endpoints: &[Endpoint],
        mode: Mode,
        cap: usize,
        intent: impl Fn(&Endpoint) -> ActionIntent,
    ) -> Vec<PlanEntry> {
        if !mode.transmits() || cap == 0 {
            return Vec::new();
        }

        let mut plan: Vec<PlanEntry> = endpoints
            .iter()
            .filter(|ep| !ep.encryption.is_open())
            .filter_map(|ep| self.plan_entry(ep, intent(ep)))
            .collect();

        plan.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.bssid.cmp(&b.bssid))
        });
        let mut seen = HashSet::new();
        plan.retain(|e| seen.insert(e.bssid));
        plan.truncate(cap);

        debug!(
            visible = endpoints.len(),
            planned = plan.len(),
            cap,
            mode = %mode,
            "tactical plan built"
        );
        plan
    }

    fn plan_entry(&self, ep: &Endpoint, intent: ActionIntent) -> Option<PlanEntry> {
        if self.epoch_interactions.get(&ep.bssid).copied().unwrap_or(0)
            >= self.max_interactions_per_epoch
        {
            return None;
        }
        let outstanding = self.outstanding(ep);
        let fruitless = self.interaction(ep.bssid).fruitless;
        let score = self.weights.score(ep, &outstanding, fruitless);
        if self.weights.is_skipped(score) {
            return None;
        }
        let action = action::route(intent, &outstanding);
        if !action.transmits() {
            return None;
        }
        Some(PlanEntry {
            bssid: ep.bssid,
            channel: ep.channel,
            action,
            score,
            uncaptured: matches!(outstanding, Outstanding::Fresh { .. }),
        })
    }

    // ─── Interactions ───────────────────────────────────────────────────

    /// Record that an action was transmitted against `bssid`.
    pub fn record_interaction(&mut self, bssid: MacAddr) {
        *self.epoch_interactions.entry(bssid).or_insert(0) += 1;
        let record = self.interactions.entry(bssid).or_default();
        record.session = record.session.saturating_add(1);
        record.fruitless = record.fruitless.saturating_add(1);
    }

    pub fn epoch_interactions(&self, bssid: MacAddr) -> u32 {
        self.epoch_interactions.get(&bssid).copied().unwrap_or(0)
    }

    /// Forget per-epoch interaction counts.
    pub fn end_epoch(&mut self) {
        self.epoch_interactions.clear();
    }

    // ─── Captures ───────────────────────────────────────────────────────

    pub fn on_capture(&mut self, event: &CaptureEvent) -> CaptureOutcome {
        if self.ledger.record(event.endpoint, event.sub_endpoint) {
            if let Some(record) = self.interactions.get_mut(&event.endpoint) {
                record.fruitless = 0;
            }
            debug!(
                endpoint = %event.endpoint,
                sub = ?event.sub_endpoint,
                "new capture recorded"
            );
            CaptureOutcome::New
        } else {
            CaptureOutcome::Repeat
        }
    }

    /// Parse a capture descriptor and record it. Malformed input is logged
    /// and reported, never recorded.
    pub fn on_capture_descriptor(
        &mut self,
        descriptor: &str,
    ) -> Result<CaptureOutcome, DescriptorError> {
        match descriptor.parse::<CaptureEvent>() {
            Ok(event) => Ok(self.on_capture(&event)),
            Err(e) => {
                warn!(descriptor, error = %e, "dropping malformed capture descriptor");
                Err(e)
            }
        }
    }

    pub fn compute_reward(&self, outcomes: &EpochOutcomes) -> f64 {
        self.reward_weights.reward(outcomes)
    }

    /// Forget every capture. Only for an explicit operator reset.
    pub fn clear_ledger(&mut self) {
        self.ledger.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Band;
    use crate::endpoint::{ClientSnapshot, Encryption};
    use proptest::prelude::*;
    use std::time::Duration;

    fn mac(a: u8, b: u8) -> MacAddr {
        MacAddr::new([0x02, 0, 0, 0, a, b])
    }

    fn endpoint(id: u8, enc: Encryption, clients: &[u8], rssi: i16) -> Endpoint {
        Endpoint {
            bssid: mac(0, id),
            channel: ChannelId::new(Band::TwoGhz, 1 + (id as u16 % 11)).unwrap(),
            rssi,
            encryption: enc,
            clients: clients
                .iter()
                .map(|&c| ClientSnapshot {
                    mac: mac(id, c),
                    age: Duration::from_secs(20),
                })
                .collect(),
            age: Duration::from_secs(10),
        }
    }

    fn capture(ep: &Endpoint, client: Option<u8>) -> CaptureEvent {
        let sub = match client {
            Some(c) => SubEndpoint::Client(mac(ep.bssid.octets()[5], c)),
            None => SubEndpoint::Whole,
        };
        CaptureEvent::new(ep.bssid, sub, 1)
    }

    #[test]
    fn passive_mode_plans_nothing() {
        let engine = TacticalEngine::new(3);
        let eps = vec![
            endpoint(1, Encryption::Wpa2, &[1, 2], -50),
            endpoint(2, Encryption::Wpa2, &[], -60),
        ];
        assert!(engine.plan_epoch(&eps, Mode::Passive, 20).is_empty());
        assert_eq!(engine.plan_epoch(&eps, Mode::Active, 20).len(), 2);
    }

    #[test]
    fn open_endpoints_are_filtered() {
        let engine = TacticalEngine::new(3);
        let eps = vec![endpoint(1, Encryption::Open, &[1, 2, 3], -40)];
        assert!(engine.plan_epoch(&eps, Mode::Active, 20).is_empty());
    }

    #[test]
    fn plan_is_sorted_and_capped() {
        let engine = TacticalEngine::new(3);
        let eps: Vec<Endpoint> = (1..=6)
            .map(|i| endpoint(i, Encryption::Wpa2, &(0..i).collect::<Vec<_>>(), -70))
            .collect();
        let plan = engine.plan_epoch(&eps, Mode::Active, 4);
        assert_eq!(plan.len(), 4);
        assert!(plan.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(plan[0].bssid, mac(0, 6));
    }

    #[test]
    fn assist_cap_admits_more() {
        let engine = TacticalEngine::new(3);
        let eps: Vec<Endpoint> = (1..=30)
            .map(|i| endpoint(i, Encryption::Wpa2, &[1], -60))
            .collect();
        let cfg = crate::config::BrainConfig::default();
        let active = engine.plan_epoch(&eps, Mode::Active, cfg.target_cap(Mode::Active));
        let assist = engine.plan_epoch(&eps, Mode::Assist, cfg.target_cap(Mode::Assist));
        assert_eq!(active.len(), 20);
        assert_eq!(assist.len(), 30);
    }

    #[test]
    fn exhausted_endpoint_excluded_and_new_client_reduced() {
        let mut engine = TacticalEngine::new(3);
        let captured = endpoint(1, Encryption::Wpa2, &[1, 2], -60);
        engine.on_capture(&capture(&captured, Some(1)));
        engine.on_capture(&capture(&captured, Some(2)));
        assert!(engine.plan_epoch(&[captured.clone()], Mode::Active, 20).is_empty());

        // Same endpoint, one extra uncaptured client.
        let returning = endpoint(1, Encryption::Wpa2, &[1, 2, 3], -60);
        let plan = engine.plan_epoch(&[returning.clone()], Mode::Active, 20);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].action, AttackAction::TargetedDeauth { client: mac(1, 3) });
        assert!(!plan[0].uncaptured);

        // Otherwise identical endpoint with nothing captured.
        let fresh_engine = TacticalEngine::new(3);
        let fresh = fresh_engine.plan_epoch(&[returning], Mode::Active, 20);
        assert!(plan[0].score > 0.0);
        assert!(plan[0].score < fresh[0].score);
        assert!(fresh[0].uncaptured);
    }

    #[test]
    fn whole_capture_leaves_clients_outstanding() {
        let mut engine = TacticalEngine::new(3);
        let ep = endpoint(4, Encryption::Wpa2, &[7], -60);
        engine.on_capture(&capture(&ep, None));
        assert_eq!(engine.outstanding(&ep), Outstanding::NewClients(vec![mac(4, 7)]));

        let clientless = endpoint(4, Encryption::Wpa2, &[], -60);
        assert!(!engine.has_outstanding(&clientless));
    }

    #[test]
    fn routing_follows_client_presence() {
        let engine = TacticalEngine::new(3);
        let eps = vec![
            endpoint(1, Encryption::Wpa2, &[], -50),
            endpoint(2, Encryption::Wpa2, &[5, 6], -50),
        ];
        let plan = engine.plan_epoch(&eps, Mode::Active, 20);
        let by_bssid: HashMap<MacAddr, AttackAction> =
            plan.iter().map(|e| (e.bssid, e.action)).collect();
        assert_eq!(by_bssid[&mac(0, 1)], AttackAction::Associate);
        assert_eq!(
            by_bssid[&mac(0, 2)],
            AttackAction::TargetedDeauth { client: mac(2, 5) }
        );
    }

    #[test]
    fn channel_switch_intent_becomes_broadcast() {
        let engine = TacticalEngine::new(3);
        let eps = vec![endpoint(1, Encryption::Wpa2, &[1, 2, 3], -50)];
        let plan = engine.plan_epoch_with_intent(&eps, Mode::Active, 5, |_| {
            ActionIntent::ChannelSwitch
        });
        assert_eq!(plan[0].action, AttackAction::BroadcastDeauth);
    }

    #[test]
    fn per_epoch_interaction_cap_skips() {
        let mut engine = TacticalEngine::new(2);
        let ep = endpoint(1, Encryption::Wpa2, &[1], -40);
        engine.record_interaction(ep.bssid);
        assert_eq!(engine.plan_epoch(&[ep.clone()], Mode::Active, 5).len(), 1);
        engine.record_interaction(ep.bssid);
        assert!(engine.plan_epoch(&[ep.clone()], Mode::Active, 5).is_empty());
        engine.end_epoch();
        assert_eq!(engine.plan_epoch(&[ep], Mode::Active, 5).len(), 1);
    }

    #[test]
    fn replanning_within_an_epoch_stops_at_the_cap() {
        let mut engine = TacticalEngine::new(3);
        let eps = vec![
            endpoint(1, Encryption::Wpa2, &[1, 2], -40),
            endpoint(2, Encryption::Wpa2, &[3], -60),
        ];
        let mut rounds = 0;
        loop {
            let plan = engine.plan_epoch(&eps, Mode::Active, 5);
            if plan.is_empty() {
                break;
            }
            assert_eq!(plan.len(), 2);
            for entry in &plan {
                engine.record_interaction(entry.bssid);
            }
            rounds += 1;
            assert!(rounds <= 3);
        }
        assert_eq!(rounds, 3);
        for ep in &eps {
            assert_eq!(engine.epoch_interactions(ep.bssid), 3);
            assert_eq!(engine.interaction(ep.bssid).session, 3);
        }

        engine.end_epoch();
        assert_eq!(engine.plan_epoch(&eps, Mode::Active, 5).len(), 2);
    }

    #[test]
    fn fruitless_attempts_suppress_then_capture_resets() {
        let mut engine = TacticalEngine::new(100);
        let ep = endpoint(1, Encryption::Wpa2, &[1, 2], -60);
        for _ in 0..8 {
            engine.record_interaction(ep.bssid);
        }
        assert_eq!(engine.interaction(ep.bssid).fruitless, 8);
        assert!(engine.plan_epoch(&[ep.clone()], Mode::Active, 5).is_empty());

        assert_eq!(engine.on_capture(&capture(&ep, Some(1))), CaptureOutcome::New);
        assert_eq!(engine.interaction(ep.bssid).fruitless, 0);
        assert_eq!(engine.interaction(ep.bssid).session, 8);
        assert_eq!(engine.plan_epoch(&[ep], Mode::Active, 5).len(), 1);
    }

    #[test]
    fn descriptors_feed_the_ledger() {
        let mut engine = TacticalEngine::new(3);
        let ep = endpoint(1, Encryption::Wpa2, &[1, 2], -60);
        engine.observe_scan(std::slice::from_ref(&ep));
        assert_eq!(engine.get_new_clients(ep.bssid).len(), 2);

        let desc = format!(
            "1772260468_{}_{}_handshake.22000",
            ep.bssid.to_compact(),
            mac(1, 1).to_compact()
        );
        assert_eq!(engine.on_capture_descriptor(&desc), Ok(CaptureOutcome::New));
        assert_eq!(engine.on_capture_descriptor(&desc), Ok(CaptureOutcome::Repeat));
        assert_eq!(engine.get_new_clients(ep.bssid), vec![mac(1, 2)]);

        assert!(engine.on_capture_descriptor("garbage").is_err());
        assert_eq!(engine.ledger().pair_count(), 1);
    }

    #[test]
    fn restore_keeps_ledger_and_history() {
        let mut engine = TacticalEngine::new(3);
        let ep = endpoint(1, Encryption::Wpa2, &[1], -60);
        engine.record_interaction(ep.bssid);
        engine.on_capture(&capture(&ep, Some(1)));
        let back = TacticalEngine::restore(
            3,
            engine.ledger().records(),
            engine.interaction_entries(),
        );
        assert_eq!(back.ledger(), engine.ledger());
        assert_eq!(back.interaction(ep.bssid).session, 1);
        assert!(!back.has_outstanding(&ep));
    }

    proptest! {
        #[test]
        fn no_entry_targets_exhausted_endpoint(
            caps in prop::collection::vec((1u8..8, prop::option::of(0u8..4)), 0..24)
        ) {
            let mut engine = TacticalEngine::new(3);
            let eps: Vec<Endpoint> = (1u8..8)
                .map(|i| endpoint(i, Encryption::Wpa2, &(0..(i % 4)).collect::<Vec<_>>(), -60))
                .collect();
            for (id, client) in caps {
                let ep = &eps[(id - 1) as usize];
                engine.on_capture(&capture(ep, client));
            }
            let plan = engine.plan_epoch(&eps, Mode::Active, 20);
            for entry in &plan {
                let ep = eps.iter().find(|e| e.bssid == entry.bssid).unwrap();
                prop_assert!(engine.has_outstanding(ep));
                if let AttackAction::TargetedDeauth { client } = entry.action {
                    prop_assert!(!engine.ledger().has_client(ep.bssid, client));
                }
            }
        }
    }
}
