//! Operational mode of the brain.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How aggressively the rig acts on what it sees.
///
/// The mode is process-wide state owned by [`crate::brain::Brain`]: it is
/// read from configuration (or restored from saved state), changed only via
/// `Brain::set_mode`, and takes effect at the start of the next epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Full planning and transmission.
    #[default]
    Active,
    /// Listen only. Channel selection still runs, nothing is transmitted.
    Passive,
    /// Same scoring as `Active` with a higher per-epoch target cap.
    Assist,
}

impl Mode {
    /// Three-letter code for the status display.
    pub fn short_code(&self) -> &'static str {
        match self {
            Mode::Active => "ACT",
            Mode::Passive => "PAS",
            Mode::Assist => "AST",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Active => "active",
            Mode::Passive => "passive",
            Mode::Assist => "assist",
        }
    }

    /// Whether plans produced in this mode may transmit.
    pub fn transmits(&self) -> bool {
        !matches!(self, Mode::Passive)
    }

    pub(crate) fn banner(&self) -> &'static str {
        match self {
            Mode::Active => "ACTIVE: full planning and transmission",
            Mode::Passive => "PASSIVE: monitor only, zero transmissions",
            Mode::Assist => "ASSIST: raised target cap for flushing clients",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Mode::Active),
            "passive" => Ok(Mode::Passive),
            "assist" => Ok(Mode::Assist),
            other => Err(format!("unknown mode: {other}")),
        }
    }
}
