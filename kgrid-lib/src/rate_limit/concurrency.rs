//! Bound on simultaneous requests.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::sync::SemaphorePermit;

use crate::error::ApiError;

/// Caps how many requests one client keeps in flight.
///
/// Rapid page navigation can fire several scrolls at once; the permit is held
/// for the whole request including retries.
///
/// # Example
///
/// ```
/// use kgrid_lib::rate_limit::ConcurrencyLimiter;
///
/// let limiter = ConcurrencyLimiter::new(4);
/// assert_eq!(limiter.limit(), 4);
/// assert_eq!(limiter.available(), 4);
/// ```
#[derive(Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

impl ConcurrencyLimiter {
    /// Creates a limiter allowing `limit` concurrent requests (minimum one).
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    /// Acquires a permit, waiting if necessary. Released on drop.
    pub async fn acquire(&self) -> Result<SemaphorePermit<'_>, ApiError> {
        self.semaphore
            .acquire()
            .await
            .map_err(|_| ApiError::Unavailable("request limiter closed".to_string()))
    }

    /// Returns the configured limit.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Returns the number of available permits.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

impl Default for ConcurrencyLimiter {
    fn default() -> Self {
        Self::new(6)
    }
}
