//! Brain configuration.
//!
//! Parsed from TOML into [`BrainConfigInput`] (every field optional) and then
//! resolved into a validated [`BrainConfig`]. Out-of-range values are clamped
//! to a safe minimum with a warning instead of failing, so a bad option never
//! stops the decision loop.

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::mode::Mode;

pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unsupported config version {0}")]
    UnsupportedVersion(u32),
    #[error("invalid config TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BrainConfigInput {
    pub version: u32,
    pub enabled: Option<bool>,
    pub mode: Option<String>,
    pub channels_per_epoch: Option<i64>,
    pub max_targets_per_epoch: Option<i64>,
    pub assist_target_multiplier: Option<i64>,
    pub max_interactions_per_epoch: Option<i64>,
    pub optimize_timing: Option<bool>,
    pub bandit_window: Option<i64>,
    pub initial_random_epochs: Option<i64>,
    pub max_observations: Option<i64>,
    pub acquisition_candidates: Option<i64>,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct BrainConfig {
    pub version: u32,
    pub enabled: bool,
    pub mode: Mode,
    /// Bandit arms focused per epoch.
    pub channels_per_epoch: usize,
    /// Plan length cap in `Active` mode.
    pub max_targets_per_epoch: usize,
    /// `Assist` mode cap = `max_targets_per_epoch × assist_target_multiplier`.
    pub assist_target_multiplier: usize,
    /// Actions against one endpoint within a single epoch before it is skipped.
    /// A plan holds one entry per endpoint, so this binds only for hosts that
    /// re-plan between actions within an epoch.
    pub max_interactions_per_epoch: u32,
    pub optimize_timing: bool,
    /// Sliding window length (outcomes) per bandit arm.
    pub bandit_window: usize,
    /// Optimizer suggestions drawn at random before the GP is consulted.
    pub initial_random_epochs: usize,
    /// Observation capacity of the optimizer.
    ///
    /// Fitting the GP costs O(n³) in this value. 80 keeps a fit within a
    /// few seconds on a slow single-core ARM host; faster hosts can raise it.
    pub max_observations: usize,
    /// Random candidates scored by the acquisition function per suggestion.
    pub acquisition_candidates: usize,
    /// Fixed RNG seed for reproducible runs; random when `None`.
    pub seed: Option<u64>,
}

impl Default for BrainConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            enabled: true,
            mode: Mode::Active,
            channels_per_epoch: 5,
            max_targets_per_epoch: 20,
            assist_target_multiplier: 2,
            max_interactions_per_epoch: 3,
            optimize_timing: true,
            bandit_window: 30,
            initial_random_epochs: 10,
            max_observations: 80,
            acquisition_candidates: 200,
            seed: None,
        }
    }
}

/// Clamp an optional integer option to `min`, logging when it was out of range.
fn clamp_option(name: &str, value: Option<i64>, default: usize, min: usize) -> usize {
    match value {
        None => default,
        Some(v) if v < min as i64 => {
            warn!(option = name, value = v, min, "config value below minimum, clamping");
            min
        }
        Some(v) => usize::try_from(v).unwrap_or(default),
    }
}

impl BrainConfigInput {
    pub fn resolve(self) -> Result<BrainConfig, ConfigError> {
        let version = if self.version == 0 {
            CONFIG_VERSION
        } else {
            self.version
        };
        if version != CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion(version));
        }

        let defaults = BrainConfig::default();
        let mode = match self.mode.as_deref().map(str::parse::<Mode>) {
            None => defaults.mode,
            Some(Ok(mode)) => mode,
            Some(Err(e)) => {
                warn!(error = %e, "invalid mode, falling back to active");
                Mode::Active
            }
        };

        Ok(BrainConfig {
            version,
            enabled: self.enabled.unwrap_or(defaults.enabled),
            mode,
            channels_per_epoch: clamp_option(
                "channels_per_epoch",
                self.channels_per_epoch,
                defaults.channels_per_epoch,
                1,
            ),
            max_targets_per_epoch: clamp_option(
                "max_targets_per_epoch",
                self.max_targets_per_epoch,
                defaults.max_targets_per_epoch,
                0,
            ),
            assist_target_multiplier: clamp_option(
                "assist_target_multiplier",
                self.assist_target_multiplier,
                defaults.assist_target_multiplier,
                1,
            ),
            max_interactions_per_epoch: u32::try_from(clamp_option(
                "max_interactions_per_epoch",
                self.max_interactions_per_epoch,
                defaults.max_interactions_per_epoch as usize,
                1,
            ))
            .unwrap_or(u32::MAX),
            optimize_timing: self.optimize_timing.unwrap_or(defaults.optimize_timing),
            bandit_window: clamp_option(
                "bandit_window",
                self.bandit_window,
                defaults.bandit_window,
                1,
            ),
            initial_random_epochs: clamp_option(
                "initial_random_epochs",
                self.initial_random_epochs,
                defaults.initial_random_epochs,
                0,
            ),
            max_observations: clamp_option(
                "max_observations",
                self.max_observations,
                defaults.max_observations,
                2,
            ),
            acquisition_candidates: clamp_option(
                "acquisition_candidates",
                self.acquisition_candidates,
                defaults.acquisition_candidates,
                1,
            ),
            seed: self.seed,
        })
    }
}

impl BrainConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        if input.trim().is_empty() {
            return Ok(BrainConfig::default());
        }
        let parsed: BrainConfigInput = toml::from_str(input)?;
        parsed.resolve()
    }

    /// Plan length cap for the given mode.
    pub fn target_cap(&self, mode: Mode) -> usize {
        match mode {
            Mode::Active => self.max_targets_per_epoch,
            Mode::Assist => self
                .max_targets_per_epoch
                .saturating_mul(self.assist_target_multiplier),
            Mode::Passive => 0,
        }
    }
}
