//! # Channel Catalog and Canonical Channel Ids
//!
//! Wi-Fi channel numbers are only unique within a band: 6 GHz reuses the
//! small integers of 2.4 GHz (and overlaps 5 GHz numbering further up).
//! The bandit needs one key per physical channel, so every `(band, raw)`
//! pair is mapped onto a single internal id:
//!
//! | Band     | Raw channels | Internal id          |
//! |----------|--------------|----------------------|
//! | 2.4 GHz  | 1–14         | raw                  |
//! | 5 GHz    | 32–177       | raw                  |
//! | 6 GHz    | 1–233        | raw + [`SIX_GHZ_OFFSET`] |
//!
//! The offset is larger than the largest raw number of any band, so the
//! mapping is a total bijection over valid pairs and [`ChannelId::raw`]
//! recovers the hardware number when commanding the radio.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Added to raw 6 GHz channel numbers to form internal ids.
pub const SIX_GHZ_OFFSET: u16 = 256;

/// Standard 2.4 GHz channels.
pub const CHANNELS_2G: &[u16] = &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14];

/// Standard 5 GHz channels.
pub const CHANNELS_5G: &[u16] = &[
    36, 40, 44, 48, 52, 56, 60, 64, 100, 104, 108, 112, 116, 120, 124, 128, 132, 136, 140, 144,
    149, 153, 157, 161, 165, 169, 173, 177,
];

/// Raw 6 GHz channels in the UNII-5 sub-band.
pub const CHANNELS_6G_RAW: &[u16] = &[
    1, 5, 9, 13, 17, 21, 25, 29, 33, 37, 41, 45, 49, 53, 57, 61, 65, 69, 73, 77, 81, 85, 89, 93,
];

const RANGE_2G: std::ops::RangeInclusive<u16> = 1..=14;
const RANGE_5G: std::ops::RangeInclusive<u16> = 32..=177;
const RANGE_6G: std::ops::RangeInclusive<u16> = 1..=233;

// ─── Band ───────────────────────────────────────────────────────────────────

/// Frequency band a channel belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Band {
    #[serde(rename = "2g")]
    TwoGhz,
    #[serde(rename = "5g")]
    FiveGhz,
    #[serde(rename = "6g")]
    SixGhz,
}

impl Band {
    pub const ALL: [Band; 3] = [Band::TwoGhz, Band::FiveGhz, Band::SixGhz];

    /// Classify a centre frequency in MHz.
    pub fn from_frequency_mhz(freq_mhz: u32) -> Option<Band> {
        match freq_mhz {
            2400..=2500 => Some(Band::TwoGhz),
            4900..=5924 => Some(Band::FiveGhz),
            5925..=7125 => Some(Band::SixGhz),
            _ => None,
        }
    }

    /// Range of raw channel numbers valid in this band.
    pub fn raw_range(&self) -> std::ops::RangeInclusive<u16> {
        match self {
            Band::TwoGhz => RANGE_2G,
            Band::FiveGhz => RANGE_5G,
            Band::SixGhz => RANGE_6G,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Band::TwoGhz => "2g",
            Band::FiveGhz => "5g",
            Band::SixGhz => "6g",
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Band::TwoGhz => write!(f, "2.4GHz"),
            Band::FiveGhz => write!(f, "5GHz"),
            Band::SixGhz => write!(f, "6GHz"),
        }
    }
}

// ─── Channel Id ─────────────────────────────────────────────────────────────

/// Canonical internal channel identifier (one bandit arm).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct ChannelId(u16);

impl ChannelId {
    /// Map a hardware `(band, raw)` pair to its internal id.
    ///
    /// Returns `None` when `raw` is outside the band's valid range.
    pub fn new(band: Band, raw: u16) -> Option<ChannelId> {
        if !band.raw_range().contains(&raw) {
            return None;
        }
        Some(match band {
            Band::TwoGhz | Band::FiveGhz => ChannelId(raw),
            Band::SixGhz => ChannelId(raw + SIX_GHZ_OFFSET),
        })
    }

    /// Recover a channel from its internal id.
    pub fn from_internal(id: u16) -> Option<ChannelId> {
        if RANGE_2G.contains(&id) || RANGE_5G.contains(&id) {
            return Some(ChannelId(id));
        }
        let six_lo = SIX_GHZ_OFFSET + RANGE_6G.start();
        let six_hi = SIX_GHZ_OFFSET + RANGE_6G.end();
        (six_lo..=six_hi).contains(&id).then_some(ChannelId(id))
    }

    /// Derive the channel from a centre frequency in MHz.
    pub fn from_frequency_mhz(freq_mhz: u32) -> Option<ChannelId> {
        let band = Band::from_frequency_mhz(freq_mhz)?;
        let raw = match band {
            Band::TwoGhz if freq_mhz == 2484 => 14,
            Band::TwoGhz => freq_mhz.checked_sub(2407)? / 5,
            Band::FiveGhz => freq_mhz.checked_sub(5000)? / 5,
            // 6 GHz channel 2 sits below the regular grid.
            Band::SixGhz if freq_mhz == 5935 => 2,
            Band::SixGhz => freq_mhz.checked_sub(5950)? / 5,
        };
        ChannelId::new(band, u16::try_from(raw).ok()?)
    }

    pub fn internal(&self) -> u16 {
        self.0
    }

    pub fn band(&self) -> Band {
        if self.0 > SIX_GHZ_OFFSET {
            Band::SixGhz
        } else if RANGE_5G.contains(&self.0) {
            Band::FiveGhz
        } else {
            Band::TwoGhz
        }
    }

    /// Hardware channel number for the radio adapter.
    pub fn raw(&self) -> u16 {
        match self.band() {
            Band::SixGhz => self.0 - SIX_GHZ_OFFSET,
            _ => self.0,
        }
    }
}

impl TryFrom<u16> for ChannelId {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        ChannelId::from_internal(value).ok_or_else(|| format!("invalid channel id {value}"))
    }
}

impl From<ChannelId> for u16 {
    fn from(ch: ChannelId) -> Self {
        ch.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.band().as_str(), self.raw())
    }
}

/// The standard catalog across all three bands.
pub fn standard_channels() -> Vec<ChannelId> {
    CHANNELS_2G
        .iter()
        .filter_map(|&raw| ChannelId::new(Band::TwoGhz, raw))
        .chain(
            CHANNELS_5G
                .iter()
                .filter_map(|&raw| ChannelId::new(Band::FiveGhz, raw)),
        )
        .chain(
            CHANNELS_6G_RAW
                .iter()
                .filter_map(|&raw| ChannelId::new(Band::SixGhz, raw)),
        )
        .collect()
}
