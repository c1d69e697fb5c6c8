//! Access points ("endpoints") and their clients as seen by a scan.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::channel::{Band, ChannelId};
use crate::mac::MacAddr;

/// Encryption class advertised by an access point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encryption {
    Open,
    Wep,
    Wpa,
    Wpa2,
    Wpa3,
}

impl Encryption {
    /// Classify a scanner's free-form encryption string (`"WPA2 PSK"`,
    /// `"WPA2/WPA3"`, `"OPEN"`, ...). Unrecognised non-empty strings are
    /// treated as WPA2-class.
    pub fn parse(raw: &str) -> Encryption {
        let upper = raw.trim().to_ascii_uppercase();
        if upper.is_empty() || upper == "OPEN" || upper == "NONE" {
            Encryption::Open
        } else if upper.contains("WPA3") || upper.contains("SAE") {
            Encryption::Wpa3
        } else if upper.contains("WPA2") {
            Encryption::Wpa2
        } else if upper.contains("WPA") {
            Encryption::Wpa
        } else if upper.contains("WEP") {
            Encryption::Wep
        } else {
            Encryption::Wpa2
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Encryption::Open)
    }
}

/// A client station associated with an access point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSnapshot {
    pub mac: MacAddr,
    /// Time since the client was last heard.
    pub age: Duration,
}

/// One access point as reported by the radio adapter's scan.
///
/// Channel numbers are raw hardware numbers; they only become bandit arms
/// after translation through [`ChannelId::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointSnapshot {
    pub bssid: MacAddr,
    pub ssid: Option<String>,
    pub band: Band,
    pub channel: u16,
    /// Signal strength in dBm.
    pub rssi: i16,
    pub encryption: String,
    pub clients: Vec<ClientSnapshot>,
    /// Time since the access point was last heard.
    pub age: Duration,
}

/// An access point after channel canonicalisation.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub bssid: MacAddr,
    pub channel: ChannelId,
    pub rssi: i16,
    pub encryption: Encryption,
    pub clients: Vec<ClientSnapshot>,
    pub age: Duration,
}

impl Endpoint {
    /// Canonicalise a scan entry. `None` if its channel is not valid for its band.
    pub fn from_snapshot(snapshot: &EndpointSnapshot) -> Option<Endpoint> {
        let channel = ChannelId::new(snapshot.band, snapshot.channel)?;
        Some(Endpoint {
            bssid: snapshot.bssid,
            channel,
            rssi: snapshot.rssi,
            encryption: Encryption::parse(&snapshot.encryption),
            clients: snapshot.clients.clone(),
            age: snapshot.age,
        })
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encryption_classification() {
        assert_eq!(Encryption::parse(""), Encryption::Open);
        assert_eq!(Encryption::parse("open"), Encryption::Open);
        assert_eq!(Encryption::parse("WPA2 PSK"), Encryption::Wpa2);
        assert_eq!(Encryption::parse("WPA2/WPA3"), Encryption::Wpa3);
        assert_eq!(Encryption::parse("sae"), Encryption::Wpa3);
        assert_eq!(Encryption::parse("WPA"), Encryption::Wpa);
        assert_eq!(Encryption::parse("WEP"), Encryption::Wep);
        assert_eq!(Encryption::parse("mystery"), Encryption::Wpa2);
    }

    #[test]
    fn snapshot_with_invalid_channel_is_dropped() {
        let snap = EndpointSnapshot {
            bssid: MacAddr::new([1, 2, 3, 4, 5, 6]),
            ssid: None,
            band: Band::TwoGhz,
            channel: 36,
            rssi: -60,
            encryption: "WPA2".into(),
            clients: vec![],
            age: Duration::ZERO,
        };
        assert!(Endpoint::from_snapshot(&snap).is_none());

        let six = EndpointSnapshot {
            band: Band::SixGhz,
            channel: 5,
            ..snap
        };
        let ep = Endpoint::from_snapshot(&six).unwrap();
        assert_eq!(ep.channel.band(), Band::SixGhz);
        assert_eq!(ep.channel.raw(), 5);
        assert_eq!(ep.encryption, Encryption::Wpa2);
    }
}
