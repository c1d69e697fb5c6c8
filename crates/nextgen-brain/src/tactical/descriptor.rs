//! Capture descriptors.
//!
//! The capture tool names each capture after what it contains:
//!
//! ```text
//! descriptor := timestamp "_" endpoint [ "_" sub ] [ "_" kind ] [ "." ext ]
//! timestamp  := decimal seconds since the epoch
//! endpoint   := mac
//! sub        := mac
//! mac        := 12 hex digits | six hex pairs joined by ':' or '-'
//! kind       := "handshake" | "pmkid" | any other tag
//! ```
//!
//! e.g. `1772260468_142103B04721_84F3EBEE271E_handshake.22000`.
//!
//! A descriptor without a client address (PMKID captures) records the
//! endpoint-level sentinel. Only the final path component is considered.

use std::str::FromStr;

use thiserror::Error;

use crate::mac::MacAddr;
use crate::tactical::ledger::SubEndpoint;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    #[error("empty descriptor")]
    Empty,
    #[error("missing endpoint field in {0:?}")]
    MissingEndpoint(String),
    #[error("invalid timestamp field {0:?}")]
    Timestamp(String),
    #[error("invalid endpoint address {0:?}")]
    Endpoint(String),
}

/// What kind of credential material a capture holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    Handshake,
    Pmkid,
    Unknown,
}

/// A parsed capture descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureEvent {
    pub timestamp: u64,
    pub endpoint: MacAddr,
    pub sub_endpoint: SubEndpoint,
    pub kind: CaptureKind,
}

impl CaptureEvent {
    pub fn new(endpoint: MacAddr, sub_endpoint: SubEndpoint, timestamp: u64) -> Self {
        let kind = match sub_endpoint {
            SubEndpoint::Whole => CaptureKind::Pmkid,
            SubEndpoint::Client(_) => CaptureKind::Handshake,
        };
        CaptureEvent {
            timestamp,
            endpoint,
            sub_endpoint,
            kind,
        }
    }

    /// Render in the canonical descriptor form.
    pub fn to_descriptor(&self) -> String {
        match self.sub_endpoint {
            SubEndpoint::Client(client) => format!(
                "{}_{}_{}_handshake.22000",
                self.timestamp,
                self.endpoint.to_compact(),
                client.to_compact()
            ),
            SubEndpoint::Whole => format!(
                "{}_{}_pmkid.22000",
                self.timestamp,
                self.endpoint.to_compact()
            ),
        }
    }
}

impl FromStr for CaptureEvent {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().rsplit(['/', '\\']).next().unwrap_or_default();
        if name.is_empty() {
            return Err(DescriptorError::Empty);
        }
        let stem = name.split_once('.').map_or(name, |(stem, _ext)| stem);

        let mut fields = stem.split('_');
        let ts_field = fields.next().unwrap_or_default();
        let timestamp: u64 = ts_field
            .parse()
            .map_err(|_| DescriptorError::Timestamp(ts_field.to_string()))?;

        let ep_field = fields
            .next()
            .filter(|f| !f.is_empty())
            .ok_or_else(|| DescriptorError::MissingEndpoint(name.to_string()))?;
        let endpoint: MacAddr = ep_field
            .parse()
            .map_err(|_| DescriptorError::Endpoint(ep_field.to_string()))?;

        let mut sub_endpoint = SubEndpoint::Whole;
        let mut kind = CaptureKind::Unknown;
        for field in fields {
            if let Ok(client) = field.parse::<MacAddr>() {
                if sub_endpoint == SubEndpoint::Whole && !client.is_broadcast() {
                    sub_endpoint = SubEndpoint::Client(client);
                }
                continue;
            }
            match field.to_ascii_lowercase().as_str() {
                "handshake" | "eapol" => kind = CaptureKind::Handshake,
                "pmkid" => kind = CaptureKind::Pmkid,
                _ => {}
            }
        }
        if kind == CaptureKind::Unknown {
            kind = match sub_endpoint {
                SubEndpoint::Whole => CaptureKind::Pmkid,
                SubEndpoint::Client(_) => CaptureKind::Handshake,
            };
        }

        Ok(CaptureEvent {
            timestamp,
            endpoint,
            sub_endpoint,
            kind,
        })
    }
}
