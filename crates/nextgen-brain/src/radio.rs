//! Boundary to the radio hardware.
//!
//! The brain never talks to hardware itself. A host supplies a
//! [`RadioAdapter`]; the brain works in canonical [`ChannelId`]s and this
//! module translates back to the raw (band, number) pair the adapter speaks.

use std::time::Duration;

use anyhow::Result;

use crate::channel::{Band, ChannelId};
use crate::endpoint::EndpointSnapshot;
use crate::mac::MacAddr;
use crate::tactical::AttackAction;

/// What the adapter observed after transmitting an action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransmitOutcome {
    /// Whether the frames were actually sent.
    pub sent: bool,
    /// A client reacted (e.g. re-associated) after the action.
    pub reaction: bool,
}

/// Radio hardware as seen by the epoch runner.
///
/// Implementations are external collaborators and their failures are
/// opaque, hence `anyhow::Result`.
pub trait RadioAdapter: Send {
    /// Everything currently visible. Channel numbers are raw hardware numbers.
    fn scan(&mut self) -> Result<Vec<EndpointSnapshot>>;

    /// Park the radio on a raw channel for roughly `dwell`.
    fn lock_channel(&mut self, band: Band, raw_channel: u16, dwell: Duration) -> Result<()>;

    fn release_channel_lock(&mut self) -> Result<()>;

    fn transmit(
        &mut self,
        endpoint: MacAddr,
        action: AttackAction,
        client: Option<MacAddr>,
    ) -> Result<TransmitOutcome>;
}

/// Lock the radio onto a canonical channel.
pub fn lock(adapter: &mut dyn RadioAdapter, channel: ChannelId, dwell: Duration) -> Result<()> {
    adapter.lock_channel(channel.band(), channel.raw(), dwell)
}
