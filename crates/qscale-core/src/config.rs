//! qscale.toml configuration parser.
//!
//! All sections are optional in the file; missing fields fall back to the
//! defaults the original deployment ran with. `validate()` must pass before
//! the control loop is constructed — a bad exploration table or a batch
//! size larger than the replay memory is a startup failure, not something
//! to discover mid-flight.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::types::ACTION_COUNT;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QscaleConfig {
    pub agent: AgentConfig,
    pub scaling: ScalingConfig,
    pub metrics: MetricsConfig,
}

/// Hyperparameters for the learning agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Discount factor for bootstrapped returns.
    pub gamma: f64,
    /// Initial exploration rate.
    pub epsilon: f64,
    /// Floor the exploration rate never decays below.
    pub epsilon_min: f64,
    /// Multiplicative decay applied to epsilon once per decision cycle.
    pub epsilon_decay: f64,
    /// Adam step size for value-network updates.
    pub learning_rate: f64,
    /// Replay memory capacity; oldest transitions are evicted first.
    pub memory_capacity: usize,
    /// Transitions sampled per training step.
    pub batch_size: usize,
    /// Train every this many decision cycles.
    pub replay_frequency: u64,
    /// Sync the target network every this many decision cycles.
    pub target_update_frequency: u64,
    /// Exploration draw probabilities over the action set, in action
    /// order. Must sum to 1. The defaults favor "hold" and small steps;
    /// large jumps are risky.
    pub exploration_weights: Vec<f64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            gamma: 0.9,
            epsilon: 1.0,
            epsilon_min: 0.01,
            epsilon_decay: 0.995,
            learning_rate: 0.001,
            memory_capacity: 2000,
            batch_size: 64,
            replay_frequency: 64,
            target_update_frequency: 50,
            exploration_weights: vec![0.15, 0.25, 0.30, 0.20, 0.10],
        }
    }
}

/// Actuation and convergence parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalingConfig {
    /// Upper replica bound; targets are clamped into [1, max_replicas].
    pub max_replicas: u32,
    /// Where the `{"action": N}` handoff record is written for the
    /// external orchestrator to reconcile.
    pub handoff_path: String,
    /// How often to re-check the live replica count while converging.
    pub poll_interval: String,
    /// Give up on a single actuation attempt after this long.
    pub convergence_deadline: String,
    /// Sleep after convergence so metrics stabilize before the next
    /// observation.
    pub settle_delay: String,
    /// Abandon the cycle after this many convergence timeouts.
    /// 0 retries forever — some orchestration backends get stuck
    /// scaling down from the maximum and need the full decide→apply
    /// cycle retried.
    pub max_actuation_retries: u32,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            max_replicas: 10,
            handoff_path: "/var/run/qscale/handoff.json".to_string(),
            poll_interval: "5s".to_string(),
            convergence_deadline: "60s".to_string(),
            settle_delay: "180s".to_string(),
            max_actuation_retries: 0,
        }
    }
}

impl ScalingConfig {
    pub fn poll_interval(&self) -> Option<Duration> {
        parse_duration(&self.poll_interval)
    }

    pub fn convergence_deadline(&self) -> Option<Duration> {
        parse_duration(&self.convergence_deadline)
    }

    pub fn settle_delay(&self) -> Option<Duration> {
        parse_duration(&self.settle_delay)
    }
}

/// Where observations come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Base URL of the Prometheus-compatible query API.
    pub prometheus_url: String,
    /// Instant query for the primary load signal (CPU %).
    pub utilization_query: String,
    /// Instant query for request round-trip time in milliseconds.
    pub rtt_query: String,
    /// Instant query for the live replica count.
    pub replicas_query: String,
    /// Per-request timeout.
    pub request_timeout: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            prometheus_url: "http://127.0.0.1:9090".to_string(),
            utilization_query: concat!(
                "avg(sum by (pod) (rate(container_cpu_usage_seconds_total",
                "{pod=~'workload.*'}[1m])) / sum by (pod) ",
                "(kube_pod_container_resource_requests",
                "{pod=~'workload.*',unit='core'}) * 100)",
            )
            .to_string(),
            rtt_query: "avg(request_rtt_milliseconds)".to_string(),
            replicas_query: "count(kube_pod_status_ready{pod=~'workload.*'})"
                .to_string(),
            request_timeout: "5s".to_string(),
        }
    }
}

impl MetricsConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        parse_duration(&self.request_timeout)
    }
}

impl Default for QscaleConfig {
    fn default() -> Self {
        Self {
            agent: AgentConfig::default(),
            scaling: ScalingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl QscaleConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: QscaleConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Scaffold the default config, ready to be written to qscale.toml.
    pub fn scaffold() -> Self {
        Self::default()
    }

    /// Reject configurations the control loop cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let a = &self.agent;

        if !(0.0..=1.0).contains(&a.epsilon) {
            return Err(invalid(format!(
                "agent.epsilon must be in [0, 1], got {}",
                a.epsilon
            )));
        }
        if a.epsilon_min > a.epsilon {
            return Err(invalid(format!(
                "agent.epsilon_min ({}) exceeds agent.epsilon ({})",
                a.epsilon_min, a.epsilon
            )));
        }
        if !(0.0..=1.0).contains(&a.epsilon_decay) {
            return Err(invalid(format!(
                "agent.epsilon_decay must be in [0, 1], got {}",
                a.epsilon_decay
            )));
        }
        if !(0.0..=1.0).contains(&a.gamma) {
            return Err(invalid(format!(
                "agent.gamma must be in [0, 1], got {}",
                a.gamma
            )));
        }
        if a.batch_size == 0 || a.batch_size > a.memory_capacity {
            return Err(invalid(format!(
                "agent.batch_size ({}) must be in [1, memory_capacity ({})]",
                a.batch_size, a.memory_capacity
            )));
        }
        if a.replay_frequency == 0 || a.target_update_frequency == 0 {
            return Err(invalid(
                "agent.replay_frequency and agent.target_update_frequency \
                 must be nonzero"
                    .to_string(),
            ));
        }
        if a.exploration_weights.len() != ACTION_COUNT {
            return Err(invalid(format!(
                "agent.exploration_weights must have {} entries, got {}",
                ACTION_COUNT,
                a.exploration_weights.len()
            )));
        }
        let weight_sum: f64 = a.exploration_weights.iter().sum();
        if (weight_sum - 1.0).abs() > 1e-6 {
            return Err(invalid(format!(
                "agent.exploration_weights must sum to 1, got {weight_sum}"
            )));
        }
        if a.exploration_weights.iter().any(|w| *w < 0.0) {
            return Err(invalid(
                "agent.exploration_weights must be non-negative".to_string(),
            ));
        }

        let s = &self.scaling;
        if s.max_replicas == 0 {
            return Err(invalid("scaling.max_replicas must be at least 1".to_string()));
        }
        for (name, value) in [
            ("scaling.poll_interval", &s.poll_interval),
            ("scaling.convergence_deadline", &s.convergence_deadline),
            ("scaling.settle_delay", &s.settle_delay),
            ("metrics.request_timeout", &self.metrics.request_timeout),
        ] {
            match parse_duration(value) {
                Some(d) if !d.is_zero() || name == "scaling.settle_delay" => {}
                Some(_) => {
                    return Err(invalid(format!("{name} must be nonzero")));
                }
                None => {
                    return Err(invalid(format!(
                        "{name}: cannot parse duration {value:?}"
                    )));
                }
            }
        }

        Ok(())
    }
}

fn invalid(reason: String) -> ConfigError {
    ConfigError::Invalid(reason)
}

/// Parse a duration string like "5s", "500ms", "3m".
///
/// A bare number is taken as seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
