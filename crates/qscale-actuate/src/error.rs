//! Actuation error types.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while applying an action or waiting for convergence.
#[derive(Debug, Error)]
pub enum ActuateError {
    /// The live replica count did not reach the target in time.
    /// Recoverable: retry the whole decide→apply cycle.
    #[error("replicas did not converge to {target} within {}s", .waited.as_secs())]
    ConvergenceTimeout { target: u32, waited: Duration },

    /// The handoff record could not be written.
    #[error("handoff write failed: {0}")]
    Handoff(#[from] std::io::Error),

    /// The handoff record could not be serialized.
    #[error("handoff encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}
