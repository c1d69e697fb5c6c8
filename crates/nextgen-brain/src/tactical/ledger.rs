//! Capture ledger: which (endpoint, sub-endpoint) pairs are already done.
//!
//! The ledger only grows. Recording a pair twice is a no-op and nothing
//! except [`CaptureLedger::clear`] (an explicit external reset) removes an
//! entry.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::mac::MacAddr;

/// Capture granularity below an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubEndpoint {
    /// Endpoint-level capture (e.g. PMKID) with no client attached.
    Whole,
    Client(MacAddr),
}

/// Persisted form of one endpoint's entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub endpoint: MacAddr,
    pub captured: Vec<SubEndpoint>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureLedger {
    entries: BTreeMap<MacAddr, BTreeSet<SubEndpoint>>,
}

impl CaptureLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<LedgerRecord>) -> Self {
        let mut ledger = Self::new();
        for record in records {
            for sub in record.captured {
                ledger.record(record.endpoint, sub);
            }
        }
        ledger
    }

    pub fn records(&self) -> Vec<LedgerRecord> {
        self.entries
            .iter()
            .map(|(&endpoint, subs)| LedgerRecord {
                endpoint,
                captured: subs.iter().copied().collect(),
            })
            .collect()
    }

    /// Record a capture. Returns `true` if the pair was not yet known.
    pub fn record(&mut self, endpoint: MacAddr, sub: SubEndpoint) -> bool {
        self.entries.entry(endpoint).or_default().insert(sub)
    }

    pub fn contains(&self, endpoint: MacAddr, sub: SubEndpoint) -> bool {
        self.entries
            .get(&endpoint)
            .is_some_and(|subs| subs.contains(&sub))
    }

    /// Whether anything at all has been captured for `endpoint`.
    pub fn has_any(&self, endpoint: MacAddr) -> bool {
        self.entries.get(&endpoint).is_some_and(|s| !s.is_empty())
    }

    pub fn has_client(&self, endpoint: MacAddr, client: MacAddr) -> bool {
        self.contains(endpoint, SubEndpoint::Client(client))
    }

    /// Clients in `seen` with no capture recorded against `endpoint`.
    pub fn new_clients<'a>(
        &self,
        endpoint: MacAddr,
        seen: impl IntoIterator<Item = &'a MacAddr>,
    ) -> Vec<MacAddr> {
        let captured = self.entries.get(&endpoint);
        let mut out: Vec<MacAddr> = seen
            .into_iter()
            .filter(|mac| !captured.is_some_and(|s| s.contains(&SubEndpoint::Client(**mac))))
            .copied()
            .collect();
        out.dedup();
        out
    }

    /// Number of endpoints with at least one capture.
    pub fn endpoint_count(&self) -> usize {
        self.entries.values().filter(|s| !s.is_empty()).count()
    }

    /// Total captured (endpoint, sub-endpoint) pairs.
    pub fn pair_count(&self) -> usize {
        self.entries.values().map(BTreeSet::len).sum()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn mac(last: u8) -> MacAddr {
        MacAddr::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, last])
    }

    #[test]
    fn record_reports_novelty() {
        let mut ledger = CaptureLedger::new();
        assert!(ledger.record(mac(1), SubEndpoint::Client(mac(9))));
        assert!(!ledger.record(mac(1), SubEndpoint::Client(mac(9))));
        assert!(ledger.record(mac(1), SubEndpoint::Whole));
        assert_eq!(ledger.pair_count(), 2);
        assert_eq!(ledger.endpoint_count(), 1);
    }

    #[test]
    fn new_clients_excludes_captured() {
        let mut ledger = CaptureLedger::new();
        ledger.record(mac(1), SubEndpoint::Client(mac(10)));
        let seen = [mac(10), mac(11), mac(12)];
        assert_eq!(ledger.new_clients(mac(1), &seen), vec![mac(11), mac(12)]);
        assert_eq!(ledger.new_clients(mac(2), &seen).len(), 3);
    }

    #[test]
    fn whole_sentinel_is_not_a_client() {
        let mut ledger = CaptureLedger::new();
        ledger.record(mac(1), SubEndpoint::Whole);
        assert!(ledger.has_any(mac(1)));
        assert!(!ledger.has_client(mac(1), mac(10)));
        assert_eq!(ledger.new_clients(mac(1), &[mac(10)]), vec![mac(10)]);
    }

    #[test]
    fn records_roundtrip() {
        let mut ledger = CaptureLedger::new();
        ledger.record(mac(1), SubEndpoint::Whole);
        ledger.record(mac(1), SubEndpoint::Client(mac(7)));
        ledger.record(mac(2), SubEndpoint::Client(mac(8)));
        let json = serde_json::to_string(&ledger.records()).unwrap();
        let back: Vec<LedgerRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(CaptureLedger::from_records(back), ledger);
    }

    proptest! {
        #[test]
        fn ledger_is_monotone(ops in prop::collection::vec((0u8..6, prop::option::of(0u8..6)), 1..64)) {
            let mut ledger = CaptureLedger::new();
            let mut seen: Vec<(MacAddr, SubEndpoint)> = Vec::new();
            for (ep, client) in ops {
                let sub = client.map_or(SubEndpoint::Whole, |c| SubEndpoint::Client(mac(100 + c)));
                ledger.record(mac(ep), sub);
                seen.push((mac(ep), sub));
                for (e, s) in &seen {
                    prop_assert!(ledger.contains(*e, *s));
                }
            }
        }
    }
}
