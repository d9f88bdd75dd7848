//! qscale-core — shared domain types and configuration for QScale.
//!
//! QScale is a reinforcement-learning-driven autoscaler: it observes a
//! workload's operating metrics, picks a discrete replica delta with an
//! epsilon-greedy policy over a learned value function, hands the target
//! replica count to an external orchestrator, and learns from the outcome.
//!
//! This crate holds what every other QScale crate needs: the observation
//! and transition types, the fixed action set, the reward shaping function,
//! and the TOML configuration surface.

pub mod config;
pub mod reward;
pub mod types;

pub use config::{
    AgentConfig, ConfigError, MetricsConfig, QscaleConfig, ScalingConfig,
    parse_duration,
};
pub use reward::shaped_reward;
pub use types::*;
