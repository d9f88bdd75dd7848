//! Doubling retry backoff for metrics-source outages.

use std::time::Duration;

/// Tracks how long to wait before the next retry.
///
/// Each failure doubles the interval up to `max`; a single success
/// resets it to `base`.
#[derive(Debug)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            current: base,
        }
    }

    /// Defaults matched to metrics-scrape cadence: 1s base, 60s cap.
    pub fn for_metrics() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60))
    }

    /// Record a failure. Returns the interval to wait before retrying.
    pub fn failure(&mut self) -> Duration {
        let wait = self.current;
        self.current = (self.current * 2).min(self.max);
        wait
    }

    /// Record a success, resetting the interval.
    pub fn success(&mut self) {
        self.current = self.base;
    }

    /// The interval the next failure would return.
    pub fn current(&self) -> Duration {
        self.current
    }
}
