//! Retry policy for transient remote failures.

use std::time::Duration;

use crate::error::ApiError;

/// Retry policy applied by [`GridClient`](crate::GridClient) to every request.
///
/// Upserts and deletes are idempotent per id, so every call kind may be
/// retried. Delays double from `initial_delay` up to `max_delay`.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use kgrid_lib::rate_limit::RetryConfig;
///
/// let config = RetryConfig::default()
///     .max_retries(5)
///     .initial_delay(Duration::from_millis(200));
/// assert_eq!(config.delay_for(2), Duration::from_millis(800));
///
/// let no_retry = RetryConfig::no_retry();
/// assert_eq!(no_retry.max_retries, 0);
/// ```
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first try.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Whether HTTP 429 responses are retried (honouring `Retry-After`).
    pub retry_on_429: bool,
    /// Whether HTTP 5xx responses and network errors are retried.
    pub retry_on_transient: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            retry_on_429: true,
            retry_on_transient: true,
        }
    }
}

impl RetryConfig {
    /// Creates a config with all retries disabled.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            retry_on_429: false,
            retry_on_transient: false,
            ..Default::default()
        }
    }

    /// Sets the maximum number of retries.
    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Sets the delay before the first retry.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay between retries.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Returns the backoff before retry number `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Returns `true` if `error` should be retried after `attempts` retries.
    pub fn should_retry(&self, error: &ApiError, attempts: u32) -> bool {
        if attempts >= self.max_retries {
            return false;
        }
        match error {
            ApiError::Http { status: 429, .. } => self.retry_on_429,
            ApiError::Http { status, .. } if *status >= 500 => self.retry_on_transient,
            ApiError::Network(_) | ApiError::Timeout(_) => self.retry_on_transient,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_is_capped() {
        let config = RetryConfig::default()
            .initial_delay(Duration::from_secs(1))
            .max_delay(Duration::from_secs(5));

        assert_eq!(config.delay_for(0), Duration::from_secs(1));
        assert_eq!(config.delay_for(1), Duration::from_secs(2));
        assert_eq!(config.delay_for(3), Duration::from_secs(5));
        assert_eq!(config.delay_for(40), Duration::from_secs(5));
    }

    #[test]
    fn test_should_retry_respects_kind_and_budget() {
        let config = RetryConfig::default().max_retries(1);

        assert!(config.should_retry(&ApiError::http(503, "down"), 0));
        assert!(!config.should_retry(&ApiError::http(503, "down"), 1));
        assert!(!config.should_retry(&ApiError::http(400, "bad"), 0));
        assert!(!RetryConfig::no_retry().should_retry(&ApiError::http(429, "slow"), 0));
    }
}
