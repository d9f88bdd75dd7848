//! Reward shaping for scaling decisions.
//!
//! Dense-but-clipped: in-range utilization earns its own value, low
//! latency earns a bonus that shrinks smoothly as RTT grows, and crossing
//! the latency threshold earns a flat penalty that dominates whatever
//! throughput the decision bought.

use crate::types::Observation;

/// RTT at or above this many milliseconds trips the flat penalty.
pub const RTT_PENALTY_THRESHOLD_MS: f64 = 250.0;

/// Penalty applied once the latency threshold is crossed.
pub const RTT_PENALTY: f64 = -2.0;

/// Latency component of the reward.
///
/// `1 / (1 + rtt/250)` below the threshold, [`RTT_PENALTY`] at or above it.
pub fn latency_bonus(rtt_ms: f64) -> f64 {
    if rtt_ms < RTT_PENALTY_THRESHOLD_MS {
        1.0 / (1.0 + rtt_ms / RTT_PENALTY_THRESHOLD_MS)
    } else {
        RTT_PENALTY
    }
}

/// Reward for the observation captured after an action converged and
/// metrics settled.
pub fn shaped_reward(obs: &Observation) -> f64 {
    obs.utilization + latency_bonus(obs.rtt_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(utilization: f64, rtt_ms: f64) -> Observation {
        Observation {
            utilization,
            rtt_ms,
            replicas: 3,
        }
    }

    #[test]
    fn zero_rtt_earns_full_bonus() {
        assert_eq!(latency_bonus(0.0), 1.0);
        assert_eq!(shaped_reward(&obs(0.5, 0.0)), 1.5);
    }

    #[test]
    fn threshold_rtt_takes_the_penalty_branch() {
        assert_eq!(latency_bonus(250.0), RTT_PENALTY);
        assert_eq!(shaped_reward(&obs(0.5, 250.0)), 0.5 + RTT_PENALTY);
    }

    #[test]
    fn just_under_threshold_still_earns_a_bonus() {
        // 1 / (1 + 249/250) ≈ 0.501
        let bonus = latency_bonus(249.0);
        assert!((bonus - 0.501).abs() < 1e-3, "bonus was {bonus}");
    }

    #[test]
    fn bonus_decreases_monotonically_below_threshold() {
        assert!(latency_bonus(10.0) > latency_bonus(100.0));
        assert!(latency_bonus(100.0) > latency_bonus(249.0));
    }

    #[test]
    fn penalty_is_flat_above_threshold() {
        assert_eq!(latency_bonus(251.0), latency_bonus(10_000.0));
    }
}
