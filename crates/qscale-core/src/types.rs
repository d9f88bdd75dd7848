//! Domain types shared across QScale crates.
//!
//! The state space is a fixed three-dimensional metrics snapshot and the
//! action space is a fixed, ordered set of replica deltas. The value
//! network scores action *indices* into [`ACTION_DELTAS`].

use serde::{Deserialize, Serialize};

/// Number of features in an observation vector.
pub const STATE_SIZE: usize = 3;

/// The fixed, ordered action set: replica deltas the policy can choose.
pub const ACTION_DELTAS: [i32; 5] = [-2, -1, 0, 1, 2];

/// Number of actions the value network scores.
pub const ACTION_COUNT: usize = ACTION_DELTAS.len();

/// A workload never scales below one replica.
pub const MIN_REPLICAS: u32 = 1;

// ── Observation ────────────────────────────────────────────────────

/// A metrics snapshot of the scaled workload, captured fresh per query.
///
/// Immutable once captured; the control loop never reuses an observation
/// across cycles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Primary load signal: CPU utilization of the workload, in percent.
    pub utilization: f64,
    /// Request round-trip time in milliseconds.
    pub rtt_ms: f64,
    /// Replica count currently live in the cluster.
    pub replicas: u32,
}

impl Observation {
    /// Flatten into the feature vector the value network consumes.
    ///
    /// Order is load-bearing: `[utilization, rtt_ms, replicas]`.
    pub fn as_features(&self) -> [f64; STATE_SIZE] {
        [self.utilization, self.rtt_ms, self.replicas as f64]
    }
}

// ── Transition ─────────────────────────────────────────────────────

/// One experience record: what we saw, what we did, what it earned,
/// and what we saw afterwards.
///
/// `action` is an index into [`ACTION_DELTAS`], not a raw delta.
/// `next_state` is always the observation captured after convergence
/// and the settle delay of the same cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: Observation,
    pub action: usize,
    pub reward: f64,
    pub next_state: Observation,
}
