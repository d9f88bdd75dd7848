//! Bounded experience replay memory.

use std::collections::VecDeque;

use rand::Rng;

use qscale_core::Transition;

use crate::error::AgentError;

/// FIFO ring buffer of transitions.
///
/// Once full, appending evicts the oldest entry. Sampling draws
/// uniformly without replacement and never consumes entries.
#[derive(Debug)]
pub struct ReplayMemory {
    buffer: VecDeque<Transition>,
    capacity: usize,
}

impl ReplayMemory {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a transition, evicting the oldest if at capacity.
    pub fn push(&mut self, transition: Transition) {
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(transition);
    }

    /// Draw `k` distinct transitions uniformly at random.
    ///
    /// No ordering guarantee on the returned batch.
    pub fn sample<R: Rng>(
        &self,
        k: usize,
        rng: &mut R,
    ) -> Result<Vec<Transition>, AgentError> {
        if k > self.buffer.len() {
            return Err(AgentError::InsufficientData {
                needed: k,
                available: self.buffer.len(),
            });
        }
        let indices = rand::seq::index::sample(rng, self.buffer.len(), k);
        Ok(indices.into_iter().map(|i| self.buffer[i].clone()).collect())
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether a given transition is still held (oldest entries fall out
    /// as new ones arrive).
    pub fn contains(&self, transition: &Transition) -> bool {
        self.buffer.contains(transition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qscale_core::Observation;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn transition(tag: u32) -> Transition {
        let obs = Observation {
            utilization: tag as f64,
            rtt_ms: 10.0,
            replicas: 3,
        };
        Transition {
            state: obs,
            action: 2,
            reward: 0.5,
            next_state: obs,
        }
    }

    #[test]
    fn evicts_oldest_once_full() {
        let mut memory = ReplayMemory::new(5);
        for tag in 0..6 {
            memory.push(transition(tag));
        }

        assert_eq!(memory.len(), 5);
        assert!(!memory.contains(&transition(0)));
        for tag in 1..6 {
            assert!(memory.contains(&transition(tag)));
        }
    }

    #[test]
    fn size_stays_at_capacity_under_sustained_inserts() {
        let mut memory = ReplayMemory::new(10);
        for tag in 0..100 {
            memory.push(transition(tag));
            assert!(memory.len() <= 10);
        }
        assert_eq!(memory.len(), 10);
        // Only the newest ten survive.
        assert!(!memory.contains(&transition(89)));
        assert!(memory.contains(&transition(90)));
    }

    #[test]
    fn sample_more_than_stored_fails() {
        let mut memory = ReplayMemory::new(10);
        memory.push(transition(0));
        let mut rng = StdRng::seed_from_u64(7);

        let err = memory.sample(2, &mut rng).unwrap_err();
        assert!(matches!(
            err,
            AgentError::InsufficientData {
                needed: 2,
                available: 1
            }
        ));
    }

    #[test]
    fn sample_returns_k_distinct_stored_transitions() {
        let mut memory = ReplayMemory::new(20);
        for tag in 0..20 {
            memory.push(transition(tag));
        }
        let mut rng = StdRng::seed_from_u64(7);

        let batch = memory.sample(8, &mut rng).unwrap();
        assert_eq!(batch.len(), 8);

        // All distinct (tags are unique per transition).
        let mut tags: Vec<u64> = batch
            .iter()
            .map(|t| t.state.utilization as u64)
            .collect();
        tags.sort_unstable();
        tags.dedup();
        assert_eq!(tags.len(), 8);

        // All actually stored.
        for t in &batch {
            assert!(memory.contains(t));
        }
    }

    #[test]
    fn sampling_does_not_consume() {
        let mut memory = ReplayMemory::new(10);
        for tag in 0..10 {
            memory.push(transition(tag));
        }
        let mut rng = StdRng::seed_from_u64(7);

        memory.sample(10, &mut rng).unwrap();
        assert_eq!(memory.len(), 10);
    }
}
