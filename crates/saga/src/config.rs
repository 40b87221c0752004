//! Registration process configuration.

use std::time::Duration;

/// Longest payment window handed to a booked order.
///
/// Larger configured windows are capped so deadlines stay representable.
pub const MAX_ORDER_EXPIRY: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Exponential backoff for seat release retries.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,

    /// Delay before the first retry.
    pub initial_delay: Duration,

    /// Cap for the growing delay.
    pub max_delay: Duration,

    /// Factor the delay grows by on each retry.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (zero-based).
    ///
    /// `initial_delay * multiplier^retry`, capped at `max_delay`.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        if retry == 0 {
            return self.initial_delay.min(self.max_delay);
        }

        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let delay_ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let max_ms = self.max_delay.as_millis() as f64;

        if !delay_ms.is_finite() || delay_ms >= max_ms {
            self.max_delay
        } else {
            Duration::from_millis(delay_ms as u64)
        }
    }
}

/// Timing configuration for the registration process.
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    /// How long to wait for a reservation outcome before rejecting the order.
    pub reservation_timeout: Duration,

    /// Payment window granted to a booked order.
    pub order_expiry: Duration,

    /// Backoff for failed seat releases.
    pub release_retry: RetryPolicy,

    /// How long a rejected or expired order's reservation is kept to answer
    /// late inventory outcomes.
    pub settled_retention: Duration,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            reservation_timeout: Duration::from_secs(30),
            order_expiry: Duration::from_secs(15 * 60),
            release_retry: RetryPolicy::default(),
            settled_retention: Duration::from_secs(60),
        }
    }
}
