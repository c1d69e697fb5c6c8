//! Target scoring.
//!
//! A fresh endpoint is scored on encryption class, client count, recently
//! active clients, signal strength and how recently it was heard. An
//! endpoint that was captured before only earns a small score per new
//! client. Both are then decayed by repeated fruitless attempts.

use std::time::Duration;

use crate::endpoint::{Encryption, Endpoint};
use crate::tactical::action::Outstanding;

/// Tunable scoring constants.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreWeights {
    pub wpa2: f64,
    pub wpa: f64,
    pub wpa3: f64,
    pub wep: f64,
    pub per_client: f64,
    pub client_cap: f64,
    pub per_active_client: f64,
    /// Clients heard within this window count as active.
    pub active_window: Duration,
    /// `(rssi_floor_dbm, bonus)` pairs, strongest first; first match wins.
    pub rssi_buckets: [(i16, f64); 4],
    /// `(max_age, bonus)` pairs, freshest first; first match wins.
    pub freshness: [(Duration, f64); 2],
    pub per_new_client: f64,
    pub new_client_cap: f64,
    /// Multiplier applied once per fruitless attempt.
    pub fruitless_decay: f64,
    /// Scores at or below this are excluded from the plan.
    pub skip_threshold: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        ScoreWeights {
            wpa2: 10.0,
            wpa: 10.0,
            wpa3: 3.0,
            wep: 1.0,
            per_client: 3.0,
            client_cap: 15.0,
            per_active_client: 2.0,
            active_window: Duration::from_secs(120),
            rssi_buckets: [(-50, 5.0), (-65, 3.0), (-75, 1.5), (-85, 0.5)],
            freshness: [(Duration::from_secs(60), 3.0), (Duration::from_secs(300), 1.0)],
            per_new_client: 2.0,
            new_client_cap: 8.0,
            fruitless_decay: 0.5,
            skip_threshold: 1.0,
        }
    }
}

impl ScoreWeights {
    fn encryption(&self, enc: Encryption) -> f64 {
        match enc {
            Encryption::Open => 0.0,
            Encryption::Wep => self.wep,
            Encryption::Wpa => self.wpa,
            Encryption::Wpa2 => self.wpa2,
            Encryption::Wpa3 => self.wpa3,
        }
    }

    fn signal(&self, rssi: i16) -> f64 {
        self.rssi_buckets
            .iter()
            .find(|(floor, _)| rssi > *floor)
            .map_or(0.0, |(_, bonus)| *bonus)
    }

    fn recency(&self, age: Duration) -> f64 {
        self.freshness
            .iter()
            .find(|(max_age, _)| age < *max_age)
            .map_or(0.0, |(_, bonus)| *bonus)
    }

    /// Score of an endpoint with nothing captured yet.
    pub fn fresh_score(&self, ep: &Endpoint) -> f64 {
        let clients = ep.client_count() as f64;
        let active = ep
            .clients
            .iter()
            .filter(|c| c.age < self.active_window)
            .count() as f64;
        self.encryption(ep.encryption)
            + (self.per_client * clients).min(self.client_cap)
            + self.per_active_client * active
            + self.signal(ep.rssi)
            + self.recency(ep.age)
    }

    /// Score of an endpoint captured before that shows `new_clients` uncaptured clients.
    pub fn reattack_score(&self, new_clients: usize) -> f64 {
        (self.per_new_client * new_clients as f64).min(self.new_client_cap)
    }

    /// Final score, zero for open endpoints and endpoints with nothing outstanding.
    pub fn score(&self, ep: &Endpoint, outstanding: &Outstanding, fruitless: u32) -> f64 {
        if ep.encryption.is_open() {
            return 0.0;
        }
        let base = match outstanding {
            Outstanding::Nothing => return 0.0,
            Outstanding::Fresh { .. } => self.fresh_score(ep),
            Outstanding::NewClients(clients) => self.reattack_score(clients.len()),
        };
        base * self.fruitless_decay.powi(fruitless.min(64) as i32)
    }

    pub fn is_skipped(&self, score: f64) -> bool {
        score <= self.skip_threshold
    }
}
