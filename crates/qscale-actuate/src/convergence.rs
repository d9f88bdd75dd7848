//! Deadline-bounded convergence tracking.
//!
//! The tracker is a pure state machine over a logical clock: every poll
//! advances it one interval. Deadline behavior is therefore testable
//! without real sleeps; only [`await_convergence`] touches wall time.

use std::time::Duration;

use tracing::{debug, warn};

use qscale_metrics::MetricsSource;

use crate::error::ActuateError;

/// Outcome of a single poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollVerdict {
    /// Live replica count matches the target.
    Converged,
    /// Not there yet; poll again after one interval.
    Waiting,
    /// The deadline has been exceeded. Strictly after, never before.
    TimedOut,
}

/// Tracks one actuation attempt against its deadline.
#[derive(Debug)]
pub struct ConvergenceTracker {
    target: u32,
    deadline: Duration,
    interval: Duration,
    elapsed: Duration,
}

impl ConvergenceTracker {
    pub fn new(target: u32, deadline: Duration, interval: Duration) -> Self {
        Self {
            target,
            deadline,
            interval,
            elapsed: Duration::ZERO,
        }
    }

    /// Record an observed replica count.
    pub fn record(&mut self, replicas: u32) -> PollVerdict {
        if replicas == self.target {
            return PollVerdict::Converged;
        }
        self.tick()
    }

    /// Advance one poll without a usable replica count (e.g. the
    /// metrics query failed). A broken observation is a missed poll,
    /// not a converged one.
    pub fn tick(&mut self) -> PollVerdict {
        if self.elapsed > self.deadline {
            return PollVerdict::TimedOut;
        }
        self.elapsed += self.interval;
        PollVerdict::Waiting
    }

    pub fn target(&self) -> u32 {
        self.target
    }

    /// Logical time spent polling so far.
    pub fn waited(&self) -> Duration {
        self.elapsed
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// Poll the metrics source until the tracker converges or times out.
///
/// A timeout is returned as [`ActuateError::ConvergenceTimeout`] — the
/// caller retries the whole decide→apply cycle rather than treating it
/// as fatal.
pub async fn await_convergence<S: MetricsSource>(
    source: &S,
    mut tracker: ConvergenceTracker,
) -> Result<(), ActuateError> {
    loop {
        let verdict = match source.observe().await {
            Ok(obs) => {
                debug!(
                    replicas = obs.replicas,
                    target = tracker.target(),
                    waited_secs = tracker.waited().as_secs(),
                    "convergence poll"
                );
                tracker.record(obs.replicas)
            }
            Err(e) => {
                warn!(error = %e, "metrics query failed during convergence wait");
                tracker.tick()
            }
        };

        match verdict {
            PollVerdict::Converged => return Ok(()),
            PollVerdict::TimedOut => {
                return Err(ActuateError::ConvergenceTimeout {
                    target: tracker.target(),
                    waited: tracker.waited(),
                });
            }
            PollVerdict::Waiting => {
                tokio::time::sleep(tracker.interval()).await;
            }
        }
    }
}
