//! Attempt timeout and exponential backoff for speech provider calls

use std::time::Duration;

use crate::config::ResilienceConfig;

/// Retry policy for speech provider calls
///
/// Each attempt runs under `attempt_timeout`. A call makes at most
/// `max_retries + 1` attempts, sleeping `2^attempt` seconds after each
/// failed one.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Hard deadline for a single attempt
    pub attempt_timeout: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay unit; doubles per attempt
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(30),
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl From<&ResilienceConfig> for RetryPolicy {
    fn from(config: &ResilienceConfig) -> Self {
        Self {
            attempt_timeout: config.attempt_timeout,
            max_retries: config.max_retries,
            ..Self::default()
        }
    }
}

impl RetryPolicy {
    /// Total attempts including the first
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay after failed attempt `attempt` (1-based): 2, 4, 8 ... units
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- delay_after ----------------------------------------------------------

    #[test]
    fn delays_double_from_two_seconds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(2));
        assert_eq!(policy.delay_after(2), Duration::from_secs(4));
        assert_eq!(policy.delay_after(3), Duration::from_secs(8));
    }

    #[test]
    fn delay_saturates() {
        let policy = RetryPolicy::default();
        assert!(policy.delay_after(64) >= Duration::from_secs(u64::from(u32::MAX)));
    }

    // -- max_attempts ---------------------------------------------------------

    #[test]
    fn attempts_include_first_call() {
        assert_eq!(RetryPolicy::default().max_attempts(), 4);

        let policy = RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.max_attempts(), 1);
    }

    #[test]
    fn built_from_config() {
        let config = ResilienceConfig {
            attempt_timeout: Duration::from_secs(5),
            max_retries: 1,
            ..ResilienceConfig::default()
        };
        let policy = RetryPolicy::from(&config);
        assert_eq!(policy.attempt_timeout, Duration::from_secs(5));
        assert_eq!(policy.max_attempts(), 2);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
    }
}
