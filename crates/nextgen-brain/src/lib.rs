//! Decision engine for an epoch-driven wireless capture rig.
//!
//! Each epoch the rig scans, picks a few channels to focus on, acts against
//! the most promising endpoints on them, and learns from what came back:
//!
//! - **Channel bandit** ([`bandit`]): Thompson sampling over channels with
//!   sliding-window evidence and client-density warm starts
//! - **Tactical engine** ([`tactical`]): capture ledger, target scoring,
//!   skip rules, action routing and the epoch reward
//! - **Timing optimizer** ([`optimizer`]): Gaussian-process Bayesian
//!   optimisation of recon/TTL timings over a bounded observation window
//! - **Orchestrator** ([`brain`]): owns all three, plus mode and persisted state
//!
//! The radio itself sits behind [`radio::RadioAdapter`]; [`runtime::EpochRunner`]
//! drives whole epochs against one.

pub mod bandit;
pub mod brain;
pub mod channel;
pub mod config;
pub mod endpoint;
pub mod mac;
pub mod mode;
pub mod optimizer;
pub mod persist;
pub mod radio;
pub mod runtime;
pub mod tactical;

pub use brain::{Brain, BrainSummary, ChannelOutcome, EpochPlan, EpochReport};
pub use channel::{Band, ChannelId};
pub use config::{BrainConfig, ConfigError};
pub use endpoint::{ClientSnapshot, EndpointSnapshot};
pub use mac::MacAddr;
pub use mode::Mode;
