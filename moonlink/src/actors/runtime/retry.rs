//! Bounded exponential backoff for routed calls.

use std::time::Duration;

/// Retry policy applied by the router to retryable failures.
///
/// Attempt `n` (1-based) that fails waits `initial_backoff * factor^(n-1)`,
/// capped at `max_backoff`, before attempt `n + 1`. After `max_attempts`
/// failed attempts the call surfaces `Unavailable`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay after the first failure.
    pub initial_backoff: Duration,
    /// Multiplier applied per additional failure.
    pub backoff_factor: f64,
    /// Upper bound for a single delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(50),
            backoff_factor: 2.0,
            max_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait after `failures` failed attempts, or `None` when the
    /// budget is spent.
    pub fn backoff(&self, failures: u32) -> Option<Duration> {
        if failures == 0 || failures >= self.max_attempts {
            return None;
        }
        let exponent = i32::try_from(failures - 1).unwrap_or(i32::MAX);
        let secs = self.initial_backoff.as_secs_f64() * self.backoff_factor.powi(exponent);
        if !secs.is_finite() || secs >= self.max_backoff.as_secs_f64() {
            return Some(self.max_backoff);
        }
        Some(Duration::from_secs_f64(secs.max(0.0)))
    }
}
