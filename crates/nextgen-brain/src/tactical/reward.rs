//! Epoch reward.

use serde::{Deserialize, Serialize};

/// What one epoch produced, as reported by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochOutcomes {
    /// Captures of (endpoint, sub-endpoint) pairs not in the ledger before.
    pub new_captures: u32,
    pub repeat_captures: u32,
    /// Deauths followed by an observable client reaction.
    pub reactions: u32,
    /// Actions actually transmitted.
    pub actions: u32,
    /// Transmitted actions whose target had no capture at plan time.
    pub uncaptured_actions: u32,
    /// Endpoints seen for the first time this session.
    pub new_endpoints: u32,
}

impl EpochOutcomes {
    pub fn is_idle(&self) -> bool {
        self.new_captures == 0 && self.repeat_captures == 0 && self.reactions == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RewardWeights {
    pub new_capture: f64,
    pub repeat_capture: f64,
    pub reaction: f64,
    pub efficiency: f64,
    pub discovery: f64,
    pub discovery_per_endpoint: f64,
    pub discovery_cap: f64,
    pub idle_penalty: f64,
}

impl Default for RewardWeights {
    fn default() -> Self {
        RewardWeights {
            new_capture: 1.0,
            repeat_capture: 0.1,
            reaction: 0.2,
            efficiency: 0.3,
            discovery: 0.1,
            discovery_per_endpoint: 0.1,
            discovery_cap: 0.3,
            idle_penalty: -0.5,
        }
    }
}

impl RewardWeights {
    pub fn reward(&self, o: &EpochOutcomes) -> f64 {
        let mut reward = self.new_capture * f64::from(o.new_captures)
            + self.repeat_capture * f64::from(o.repeat_captures)
            + self.reaction * f64::from(o.reactions);

        if o.actions > 0 {
            let efficiency = f64::from(o.uncaptured_actions.min(o.actions)) / f64::from(o.actions);
            reward += self.efficiency * efficiency;
        }

        let discovery =
            (self.discovery_per_endpoint * f64::from(o.new_endpoints)).min(self.discovery_cap);
        reward += self.discovery * discovery;

        if o.is_idle() {
            reward += self.idle_penalty;
        }
        reward
    }
}

/// Reward with the default weights.
pub fn compute_reward(outcomes: &EpochOutcomes) -> f64 {
    RewardWeights::default().reward(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_epoch_is_penalized() {
        let r = compute_reward(&EpochOutcomes::default());
        assert!((r + 0.5).abs() < 1e-12);
    }

    #[test]
    fn captures_dominate() {
        let o = EpochOutcomes {
            new_captures: 2,
            repeat_captures: 1,
            reactions: 3,
            actions: 4,
            uncaptured_actions: 2,
            new_endpoints: 10,
        };
        // 2.0 + 0.1 + 0.6 + 0.3 * 0.5 + 0.3 * 0.1
        assert!((compute_reward(&o) - 2.88).abs() < 1e-9);
    }

    #[test]
    fn reaction_only_epoch_is_not_idle() {
        let o = EpochOutcomes {
            reactions: 1,
            actions: 1,
            ..Default::default()
        };
        assert!(!o.is_idle());
        assert!(compute_reward(&o) > 0.0);
    }

    #[test]
    fn new_capture_outweighs_repeat() {
        let new = EpochOutcomes {
            new_captures: 1,
            ..Default::default()
        };
        let repeat = EpochOutcomes {
            repeat_captures: 1,
            ..Default::default()
        };
        assert!(compute_reward(&new) > compute_reward(&repeat));
    }
}
