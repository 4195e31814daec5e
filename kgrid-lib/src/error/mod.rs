//! Error types

mod api;
mod auth;
mod store;

pub use api::*;
pub use auth::*;
pub use store::*;

use std::time::Duration;

use crate::grid::OperationKind;

/// Top-level error for every grid and client operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The remote store call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// No usable access token.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The local overlay store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The remote store kept answering 429 after all retries.
    #[error("Rate limited (retry after {retry_after:?})")]
    RateLimit { retry_after: Option<Duration> },

    /// Page size must be greater than zero.
    #[error("Page size must be greater than zero")]
    InvalidPageSize,

    /// No row with this id is loaded or pending.
    #[error("Unknown row '{0}'")]
    UnknownRow(String),

    /// Another mutation currently holds this row.
    #[error("Row '{0}' is locked by an in-flight mutation")]
    RowLocked(String),

    /// The same kind of operation is already in flight.
    #[error("{0} already in progress")]
    Busy(OperationKind),
}

impl Error {
    /// Returns `true` if repeating the operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Api(e) => e.is_retryable(),
            Self::RateLimit { .. } | Self::RowLocked(_) | Self::Busy(_) => true,
            _ => false,
        }
    }
}
