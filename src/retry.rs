//! Retry logic with exponential backoff and jitter.
//!
//! Only failures the reconcilers classify as retryable are retried; fatal
//! failures are returned to the caller on the first attempt.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::time::Duration;

use rand::Rng;
use workshop_reconciler::Error;

/// Default retry configuration.
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_BASE_DELAY_MS: u64 = 100;
const DEFAULT_MAX_DELAY_MS: u64 = 10000;
const DEFAULT_JITTER_FACTOR: f64 = 0.1;

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Base delay for exponential backoff (milliseconds)
    pub base_delay_ms: u64,
    /// Maximum delay between retries (milliseconds)
    pub max_delay_ms: u64,
    /// Jitter factor to add randomness (0.0 - 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            jitter_factor: DEFAULT_JITTER_FACTOR,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy with custom settings.
    pub const fn new(max_retries: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            max_delay_ms,
            jitter_factor: DEFAULT_JITTER_FACTOR,
        }
    }

    /// Set jitter factor.
    #[must_use]
    pub const fn with_jitter(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor;
        self
    }

    /// Delay before retry number `attempt` (0-indexed).
    ///
    /// Delay formula: min(base_delay * 2^attempt, max_delay) + jitter
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponential_delay = self
            .base_delay_ms
            .saturating_mul(2_u64.saturating_pow(attempt));
        let capped_delay = exponential_delay.min(self.max_delay_ms);

        // Add jitter to prevent thundering herd
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let jitter_ms = {
            let jitter_range = (capped_delay as f64) * self.jitter_factor;
            if jitter_range > 0.0 {
                rand::thread_rng().gen_range(0.0..jitter_range).floor() as u64
            } else {
                0
            }
        };

        Duration::from_millis(capped_delay.saturating_add(jitter_ms))
    }

    /// Determine if an error should be retried after `attempt` retries.
    pub fn should_retry(&self, error: &Error, attempt: u32) -> bool {
        error.is_retryable() && attempt < self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use workshop_reconciler::{PolicyViolation, StoreError};

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = RetryPolicy::new(5, 100, 1000).with_jitter(0.0);
        assert_eq!(policy.calculate_delay(0), Duration::from_millis(100));
        assert_eq!(policy.calculate_delay(1), Duration::from_millis(200));
        assert_eq!(policy.calculate_delay(3), Duration::from_millis(800));
        assert_eq!(policy.calculate_delay(4), Duration::from_millis(1000));
        assert_eq!(policy.calculate_delay(200), Duration::from_millis(1000));
    }

    #[test]
    fn test_zero_base_delay_has_no_jitter() {
        let policy = RetryPolicy::new(3, 0, 0);
        assert_eq!(policy.calculate_delay(2), Duration::ZERO);
    }

    #[test]
    fn test_jitter_stays_within_factor() {
        let policy = RetryPolicy::new(3, 1000, 10_000).with_jitter(0.5);
        let delay = policy.calculate_delay(0);
        assert!(delay >= Duration::from_millis(1000));
        assert!(delay < Duration::from_millis(1500));
    }

    #[test]
    fn test_only_retryable_errors_are_retried() {
        let policy = RetryPolicy::new(2, 0, 0);
        let retryable = Error::policy_violation("env", PolicyViolation::TokenMismatch);
        let fatal = Error::from(StoreError::unavailable("get", "down"));

        assert!(policy.should_retry(&retryable, 0));
        assert!(policy.should_retry(&retryable, 1));
        assert!(!policy.should_retry(&retryable, 2));
        assert!(!policy.should_retry(&fatal, 0));
    }
}
