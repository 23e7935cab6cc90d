//! Retry policy for dispatch.
//!
//! # Responsibilities
//! - Bound the number of attempts per dispatch
//! - Compute the pause between attempts
//!
//! # Design Decisions
//! - Every attempt re-resolves an endpoint, so retries spread across instances
//! - Circuit-open rejections count against the attempt budget like any failure
//! - Built from the live config on every dispatch, so reloads apply immediately

use std::time::Duration;

use crate::config::RetryConfig;
use crate::resilience::backoff::calculate_backoff;

/// Attempt budget and backoff for one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Pause before attempt number `attempt` (1-based). The first attempt never waits.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt.saturating_sub(1), self.base_delay, self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_attempt_has_no_delay() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_before(1), Duration::ZERO);
        assert!(policy.delay_before(2) >= Duration::from_millis(50));
        assert!(policy.delay_before(3) >= Duration::from_millis(100));
    }

    #[test]
    fn test_zero_attempts_clamped() {
        let config = RetryConfig {
            max_attempts: 0,
            ..RetryConfig::default()
        };
        assert_eq!(RetryPolicy::from(&config).max_attempts, 1);
    }

    #[test]
    fn test_zero_base_delay_never_waits() {
        let config = RetryConfig {
            max_attempts: 5,
            base_delay_ms: 0,
            ..RetryConfig::default()
        };
        let policy = RetryPolicy::from(&config);
        assert!((1..=5).all(|attempt| policy.delay_before(attempt).is_zero()));
    }
}
