//! Epsilon-greedy action selection with a non-uniform exploration prior.
//!
//! Exploration does not draw uniformly: the table favors "hold" and
//! small steps over the extremes, encoding that large replica jumps are
//! risky even while exploring.

use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};

use qscale_core::config::AgentConfig;
use qscale_core::{ACTION_COUNT, Observation};

use crate::error::AgentError;
use crate::network::QNetwork;

/// Epsilon-greedy policy over the fixed action set.
pub struct EpsilonGreedy {
    epsilon: f64,
    epsilon_min: f64,
    decay_factor: f64,
    weights: Vec<f64>,
    explore: WeightedIndex<f64>,
}

impl EpsilonGreedy {
    /// Build from agent config, validating the exploration table.
    pub fn new(config: &AgentConfig) -> Result<Self, AgentError> {
        let weights = config.exploration_weights.clone();
        if weights.len() != ACTION_COUNT {
            return Err(AgentError::InvalidExplorationWeights {
                reason: format!(
                    "expected {} entries, got {}",
                    ACTION_COUNT,
                    weights.len()
                ),
            });
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(AgentError::InvalidExplorationWeights {
                reason: format!("entries sum to {sum}, expected 1"),
            });
        }
        let explore = WeightedIndex::new(weights.iter().copied()).map_err(|e| {
            AgentError::InvalidExplorationWeights {
                reason: e.to_string(),
            }
        })?;
        Ok(Self {
            epsilon: config.epsilon,
            epsilon_min: config.epsilon_min,
            decay_factor: config.epsilon_decay,
            weights,
            explore,
        })
    }

    /// Pick an action index for the observation.
    ///
    /// With probability epsilon, draw from the exploration table;
    /// otherwise take the argmax of the online value estimates, ties
    /// to the lowest index.
    pub fn select<R: Rng>(
        &self,
        network: &QNetwork,
        observation: &Observation,
        rng: &mut R,
    ) -> usize {
        if rng.gen_range(0.0..1.0) < self.epsilon {
            self.explore.sample(rng)
        } else {
            greedy(&network.evaluate(&observation.as_features()))
        }
    }

    /// Decay epsilon once per decision cycle, floored at `epsilon_min`.
    pub fn decay(&mut self) {
        self.epsilon = (self.epsilon * self.decay_factor).max(self.epsilon_min);
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// The exploration probability table, in action order.
    pub fn exploration_weights(&self) -> &[f64] {
        &self.weights
    }
}

/// Index of the maximum value, first occurrence on ties.
pub fn greedy(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate().skip(1) {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use qscale_core::config::AgentConfig;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn observation() -> Observation {
        Observation {
            utilization: 0.6,
            rtt_ms: 90.0,
            replicas: 4,
        }
    }

    fn policy_with_epsilon(epsilon: f64) -> EpsilonGreedy {
        let config = AgentConfig {
            epsilon,
            epsilon_min: 0.01,
            ..AgentConfig::default()
        };
        EpsilonGreedy::new(&config).unwrap()
    }

    #[test]
    fn rejects_bad_weight_table() {
        let mut config = AgentConfig::default();
        config.exploration_weights = vec![0.9, 0.1];
        assert!(matches!(
            EpsilonGreedy::new(&config),
            Err(AgentError::InvalidExplorationWeights { .. })
        ));

        config.exploration_weights = vec![0.5, 0.2, 0.1, 0.1, 0.05];
        assert!(EpsilonGreedy::new(&config).is_err());
    }

    #[test]
    fn greedy_takes_maximum() {
        assert_eq!(greedy(&[0.1, 0.9, 0.3, -2.0, 0.89]), 1);
    }

    #[test]
    fn greedy_breaks_ties_to_lowest_index() {
        assert_eq!(greedy(&[0.5, 0.5, 0.5, 0.5, 0.5]), 0);
        assert_eq!(greedy(&[0.1, 0.7, 0.7, 0.2, 0.3]), 1);
    }

    #[test]
    fn zero_epsilon_is_deterministic_and_greedy() {
        let policy = policy_with_epsilon(0.0);
        let mut net_rng = StdRng::seed_from_u64(3);
        let net = QNetwork::new(0.001, &mut net_rng);
        let obs = observation();

        let expected = greedy(&net.evaluate(&obs.as_features()));
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..50 {
            assert_eq!(policy.select(&net, &obs, &mut rng), expected);
        }
    }

    #[test]
    fn full_epsilon_matches_exploration_weights() {
        let policy = policy_with_epsilon(1.0);
        let mut net_rng = StdRng::seed_from_u64(3);
        let net = QNetwork::new(0.001, &mut net_rng);
        let obs = observation();

        let trials = 50_000;
        let mut counts = [0usize; ACTION_COUNT];
        let mut rng = StdRng::seed_from_u64(12);
        for _ in 0..trials {
            counts[policy.select(&net, &obs, &mut rng)] += 1;
        }

        for (count, weight) in counts.iter().zip(policy.exploration_weights()) {
            let observed = *count as f64 / trials as f64;
            assert!(
                (observed - weight).abs() < 0.01,
                "observed {observed}, expected {weight}"
            );
        }
    }

    #[test]
    fn decay_is_multiplicative_with_floor() {
        let mut policy = policy_with_epsilon(1.0);

        // Expected value follows the same sequential product.
        let mut expected = 1.0f64;
        for _ in 0..100 {
            policy.decay();
            expected = (expected * 0.995).max(0.01);
            assert_eq!(policy.epsilon(), expected);
        }
    }

    #[test]
    fn decay_floors_at_epsilon_min() {
        let mut policy = policy_with_epsilon(1.0);
        for _ in 0..5000 {
            policy.decay();
        }
        assert_eq!(policy.epsilon(), 0.01);
    }

    #[test]
    fn epsilon_never_increases() {
        let mut policy = policy_with_epsilon(0.8);
        let mut previous = policy.epsilon();
        for _ in 0..200 {
            policy.decay();
            assert!(policy.epsilon() <= previous);
            previous = policy.epsilon();
        }
    }
}
