//! Bounded retry policy for eventually-consistent control plane state
//!
//! The one retried operation in this tool is function creation, which can be
//! rejected while a freshly created execution role propagates through the
//! identity system. The budget is a fixed attempt count with an exponential
//! backoff ceiling; exhaustion is a hard error.

use backon::{BackoffBuilder, ExponentialBuilder};
use std::time::Duration;

/// Retry budget: attempt count plus backoff shape
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Initial delay between attempts
    pub initial_delay: Duration,
    /// Cap for exponential delay growth
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Exponential delay sequence with jitter, capped at `max_delay`.
    ///
    /// The iterator never ends; callers stop at `max_attempts`.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + use<> {
        let max_delay = self.max_delay;
        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.initial_delay)
            .with_max_delay(self.max_delay)
            .with_factor(2.0)
            .with_jitter()
            .without_max_times()
            .build();
        backoff.map(move |d| d.min(max_delay))
    }

    /// Policy tuned for tests: immediate retries.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_stay_under_the_ceiling() {
        let policy = RetryPolicy {
            max_attempts: 6,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(400),
        };
        for delay in policy.delays().take(16) {
            assert!(delay <= Duration::from_millis(400));
        }
    }

    #[test]
    fn delay_sequence_is_unbounded_in_length() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delays().take(64).count(), 64);
    }
}
