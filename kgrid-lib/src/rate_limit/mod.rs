//! Retry policy and request concurrency bounds.

mod concurrency;
mod retry;

pub use concurrency::ConcurrencyLimiter;
pub use retry::RetryConfig;
