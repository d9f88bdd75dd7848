//! Error types for the learning core.

use thiserror::Error;

/// Errors raised by the agent components.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Sampling or training was attempted before enough experience
    /// exists. Recoverable: the caller skips the operation this cycle.
    #[error("not enough experience: need {needed}, have {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The exploration probability table is unusable.
    #[error("invalid exploration weights: {reason}")]
    InvalidExplorationWeights { reason: String },
}
