//! The closed action set and intent routing.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::mac::MacAddr;

/// What the radio is asked to do against one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttackAction {
    /// Associate to elicit a PMKID. Used when no clients are visible.
    Associate,
    /// Deauthenticate one client to force a fresh handshake.
    TargetedDeauth { client: MacAddr },
    /// Deauthenticate every client of the endpoint at once.
    BroadcastDeauth,
    /// Nothing worth doing. Never transmitted.
    Skip,
}

impl AttackAction {
    pub fn transmits(&self) -> bool {
        !matches!(self, AttackAction::Skip)
    }

    pub fn client(&self) -> Option<MacAddr> {
        match self {
            AttackAction::TargetedDeauth { client } => Some(*client),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttackAction::Associate => "associate",
            AttackAction::TargetedDeauth { .. } => "targeted_deauth",
            AttackAction::BroadcastDeauth => "broadcast_deauth",
            AttackAction::Skip => "skip",
        }
    }
}

impl fmt::Display for AttackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttackAction::TargetedDeauth { client } => write!(f, "targeted_deauth({client})"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// What upstream logic would like to happen to a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionIntent {
    /// Let the router pick from the target's capture state.
    #[default]
    Auto,
    /// Channel-switch announcement. No radio adapter in this deployment can
    /// send one, so it is served by a broadcast deauth.
    ChannelSwitch,
}

/// Work left to do on an endpoint, derived from the ledger and the scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outstanding {
    /// Everything visible is already captured.
    Nothing,
    /// No capture of any kind yet; `clients` are the visible ones.
    Fresh { clients: Vec<MacAddr> },
    /// Captured before, but these visible clients are not in the ledger.
    NewClients(Vec<MacAddr>),
}

impl Outstanding {
    pub fn is_nothing(&self) -> bool {
        matches!(self, Outstanding::Nothing)
    }

    pub fn clients(&self) -> &[MacAddr] {
        match self {
            Outstanding::Nothing => &[],
            Outstanding::Fresh { clients } => clients,
            Outstanding::NewClients(clients) => clients,
        }
    }
}

/// Map an intent and the target's outstanding work to a concrete action.
pub fn route(intent: ActionIntent, outstanding: &Outstanding) -> AttackAction {
    if outstanding.is_nothing() {
        return AttackAction::Skip;
    }
    if intent == ActionIntent::ChannelSwitch {
        return AttackAction::BroadcastDeauth;
    }
    match outstanding.clients().first() {
        Some(&client) => AttackAction::TargetedDeauth { client },
        None => AttackAction::Associate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mac(last: u8) -> MacAddr {
        MacAddr::new([2, 0, 0, 0, 0, last])
    }

    #[test]
    fn clientless_target_associates() {
        let action = route(ActionIntent::Auto, &Outstanding::Fresh { clients: vec![] });
        assert_eq!(action, AttackAction::Associate);
        assert_eq!(action.client(), None);
    }

    #[test]
    fn first_outstanding_client_is_deauthed() {
        let fresh = Outstanding::Fresh {
            clients: vec![mac(1), mac(2)],
        };
        assert_eq!(
            route(ActionIntent::Auto, &fresh),
            AttackAction::TargetedDeauth { client: mac(1) }
        );
        let again = Outstanding::NewClients(vec![mac(5)]);
        assert_eq!(
            route(ActionIntent::Auto, &again),
            AttackAction::TargetedDeauth { client: mac(5) }
        );
    }

    #[test]
    fn channel_switch_falls_back_to_broadcast() {
        let fresh = Outstanding::Fresh {
            clients: vec![mac(1)],
        };
        assert_eq!(
            route(ActionIntent::ChannelSwitch, &fresh),
            AttackAction::BroadcastDeauth
        );
    }

    #[test]
    fn nothing_outstanding_skips() {
        assert_eq!(route(ActionIntent::Auto, &Outstanding::Nothing), AttackAction::Skip);
        assert_eq!(
            route(ActionIntent::ChannelSwitch, &Outstanding::Nothing),
            AttackAction::Skip
        );
        assert!(!AttackAction::Skip.transmits());
        assert!(AttackAction::BroadcastDeauth.transmits());
    }

    #[test]
    fn action_serializes_tagged() {
        let json = serde_json::to_string(&AttackAction::TargetedDeauth { client: mac(1) }).unwrap();
        assert_eq!(json, r#"{"kind":"targeted_deauth","client":"02:00:00:00:00:01"}"#);
    }
}
