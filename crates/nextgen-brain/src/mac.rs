//! Hardware (MAC) addresses for access points and their clients.
//!
//! Scan results and capture descriptors report addresses in several textual
//! forms (`aa:bb:cc:dd:ee:ff`, `AA-BB-CC-DD-EE-FF`, `AABBCCDDEEFF`). All of
//! them parse into the same [`MacAddr`], which always displays as lowercase
//! colon-separated hex so that ledger keys compare reliably.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A 48-bit IEEE 802 hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddr([u8; 6]);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MacParseError {
    #[error("expected 12 hex digits, got {0} characters")]
    Length(usize),
    #[error("invalid hex digit in address: {0:?}")]
    Hex(String),
}

impl MacAddr {
    /// The broadcast address `ff:ff:ff:ff:ff:ff`.
    pub const BROADCAST: MacAddr = MacAddr([0xff; 6]);

    pub const fn new(octets: [u8; 6]) -> Self {
        MacAddr(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Compact form without separators, as used in capture file names.
    pub fn to_compact(&self) -> String {
        self.0.iter().map(|b| format!("{b:02X}")).collect()
    }
}

impl FromStr for MacAddr {
    type Err = MacParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits: String = trimmed.chars().filter(|c| *c != ':' && *c != '-').collect();
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(MacParseError::Hex(trimmed.to_string()));
        }
        if digits.len() != 12 {
            return Err(MacParseError::Length(digits.len()));
        }
        // Separators, when present, must sit between every octet.
        let separators = trimmed.len() - digits.len();
        if separators != 0 && separators != 5 {
            return Err(MacParseError::Hex(trimmed.to_string()));
        }

        let mut octets = [0u8; 6];
        for (i, octet) in octets.iter_mut().enumerate() {
            let pair = &digits[i * 2..i * 2 + 2];
            *octet =
                u8::from_str_radix(pair, 16).map_err(|_| MacParseError::Hex(trimmed.to_string()))?;
        }
        Ok(MacAddr(octets))
    }
}

impl TryFrom<String> for MacAddr {
    type Error = MacParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MacAddr> for String {
    fn from(mac: MacAddr) -> Self {
        mac.to_string()
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_textual_forms() {
        let expected = MacAddr::new([0x14, 0x21, 0x03, 0xb0, 0x47, 0x21]);
        assert_eq!("14:21:03:b0:47:21".parse::<MacAddr>().unwrap(), expected);
        assert_eq!("14-21-03-B0-47-21".parse::<MacAddr>().unwrap(), expected);
        assert_eq!("142103B04721".parse::<MacAddr>().unwrap(), expected);
    }

    #[test]
    fn displays_lowercase_colon_form() {
        let mac: MacAddr = "84F3EBEE271E".parse().unwrap();
        assert_eq!(mac.to_string(), "84:f3:eb:ee:27:1e");
        assert_eq!(mac.to_compact(), "84F3EBEE271E");
    }

    #[test]
    fn rejects_malformed() {
        assert!(matches!(
            "aa:bb:cc".parse::<MacAddr>(),
            Err(MacParseError::Length(6))
        ));
        assert!("zz:bb:cc:dd:ee:ff".parse::<MacAddr>().is_err());
        assert!("aabb:ccdd:eeff".parse::<MacAddr>().is_err());
    }

    #[test]
    fn serde_uses_text_form() {
        let mac = MacAddr::new([0xaa, 0xbb, 0xcc, 0xdd, 0x00, 0xff]);
        let json = serde_json::to_string(&mac).unwrap();
        assert_eq!(json, "\"aa:bb:cc:dd:00:ff\"");
        let back: MacAddr = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mac);
    }
}
