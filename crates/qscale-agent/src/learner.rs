//! Experience replay training.
//!
//! Each training step samples a batch, computes one-step bootstrapped
//! targets against the frozen network, and applies one update per
//! example. Loss/reward history is kept in a bounded window — this
//! process runs for months, not episodes.

use std::collections::VecDeque;

use rand::Rng;
use tracing::debug;

use crate::error::AgentError;
use crate::network::QNetwork;
use crate::replay::ReplayMemory;

/// How many recent losses/rewards the stats window retains.
const STATS_WINDOW: usize = 256;

/// Summary of one training step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainReport {
    /// Number of single-example updates issued.
    pub examples: usize,
    pub mean_loss: f64,
    pub mean_reward: f64,
}

/// Bounded window of recent training statistics. Observability only —
/// nothing downstream keys off these numbers.
#[derive(Debug, Default)]
pub struct TrainStats {
    losses: VecDeque<f64>,
    rewards: VecDeque<f64>,
}

impl TrainStats {
    fn push(&mut self, loss: f64, reward: f64) {
        if self.losses.len() == STATS_WINDOW {
            self.losses.pop_front();
        }
        if self.rewards.len() == STATS_WINDOW {
            self.rewards.pop_front();
        }
        self.losses.push_back(loss);
        self.rewards.push_back(reward);
    }

    pub fn mean_loss(&self) -> Option<f64> {
        mean(&self.losses)
    }

    pub fn mean_reward(&self) -> Option<f64> {
        mean(&self.rewards)
    }

    pub fn len(&self) -> usize {
        self.losses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.losses.is_empty()
    }
}

fn mean(window: &VecDeque<f64>) -> Option<f64> {
    if window.is_empty() {
        None
    } else {
        Some(window.iter().sum::<f64>() / window.len() as f64)
    }
}

/// Samples replayed experience and updates the online value network.
pub struct Learner {
    gamma: f64,
    stats: TrainStats,
}

impl Learner {
    pub fn new(gamma: f64) -> Self {
        Self {
            gamma,
            stats: TrainStats::default(),
        }
    }

    /// One replay pass: sample `batch_size` transitions and issue one
    /// network update per transition.
    ///
    /// Training only makes sense once the memory holds *more* than a
    /// batch; below that this fails with `InsufficientData` and the
    /// caller skips the cycle. The memory itself is never drained.
    pub fn train_step<R: Rng>(
        &mut self,
        memory: &ReplayMemory,
        network: &mut QNetwork,
        batch_size: usize,
        rng: &mut R,
    ) -> Result<TrainReport, AgentError> {
        if memory.len() <= batch_size {
            return Err(AgentError::InsufficientData {
                needed: batch_size + 1,
                available: memory.len(),
            });
        }

        let batch = memory.sample(batch_size, rng)?;
        let mut loss_sum = 0.0;
        let mut reward_sum = 0.0;

        for transition in &batch {
            let next_values =
                network.evaluate_target(&transition.next_state.as_features());
            let max_next = next_values
                .iter()
                .copied()
                .fold(f64::NEG_INFINITY, f64::max);
            let target = transition.reward + self.gamma * max_next;

            let loss = network.fit(
                &transition.state.as_features(),
                transition.action,
                target,
            );
            loss_sum += loss;
            reward_sum += transition.reward;
            self.stats.push(loss, transition.reward);
        }

        let report = TrainReport {
            examples: batch.len(),
            mean_loss: loss_sum / batch.len() as f64,
            mean_reward: reward_sum / batch.len() as f64,
        };
        debug!(
            examples = report.examples,
            mean_loss = report.mean_loss,
            mean_reward = report.mean_reward,
            "training step complete"
        );
        Ok(report)
    }

    pub fn stats(&self) -> &TrainStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qscale_core::{Observation, Transition};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn transition(tag: u32) -> Transition {
        let obs = Observation {
            utilization: tag as f64 * 0.01,
            rtt_ms: 50.0,
            replicas: 3,
        };
        Transition {
            state: obs,
            action: (tag as usize) % 5,
            reward: 0.7,
            next_state: obs,
        }
    }

    fn filled_memory(n: u32) -> ReplayMemory {
        let mut memory = ReplayMemory::new(2000);
        for tag in 0..n {
            memory.push(transition(tag));
        }
        memory
    }

    #[test]
    fn refuses_to_train_until_memory_exceeds_batch() {
        let mut learner = Learner::new(0.9);
        let mut rng = StdRng::seed_from_u64(5);
        let mut net = QNetwork::new(0.001, &mut rng);

        // Exactly batch_size transitions is still not enough.
        let memory = filled_memory(64);
        let err = learner
            .train_step(&memory, &mut net, 64, &mut rng)
            .unwrap_err();
        assert!(matches!(
            err,
            AgentError::InsufficientData {
                needed: 65,
                available: 64
            }
        ));
    }

    #[test]
    fn one_step_trains_a_full_batch_without_draining_memory() {
        let mut learner = Learner::new(0.9);
        let mut rng = StdRng::seed_from_u64(5);
        let mut net = QNetwork::new(0.001, &mut rng);

        let memory = filled_memory(65);
        let report = learner
            .train_step(&memory, &mut net, 64, &mut rng)
            .unwrap();

        assert_eq!(report.examples, 64);
        assert_eq!(memory.len(), 65);
        assert!(report.mean_loss.is_finite());
        assert!((report.mean_reward - 0.7).abs() < 1e-9);
    }

    #[test]
    fn stats_window_is_bounded() {
        let mut learner = Learner::new(0.9);
        let mut rng = StdRng::seed_from_u64(5);
        let mut net = QNetwork::new(0.001, &mut rng);

        let memory = filled_memory(200);
        for _ in 0..5 {
            learner
                .train_step(&memory, &mut net, 128, &mut rng)
                .unwrap();
        }
        // 5 × 128 = 640 examples pushed, window holds the last 256.
        assert_eq!(learner.stats().len(), STATS_WINDOW);
        assert!(learner.stats().mean_loss().unwrap().is_finite());
    }
}
