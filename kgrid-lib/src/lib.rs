//! Knowledge-table grid engine
//!
//! Presents a remotely stored table through cursor pagination, overlays
//! local row additions, edits and deletions on top of the server pages,
//! filters the combined rows and keeps unsynced changes in a local store
//! until the server confirms them.
//!
//! The entry point is [`KnowledgeGrid`]. It runs against any
//! [`RemoteStore`](remote::RemoteStore): the HTTP [`GridClient`] or the
//! in-process [`MemoryRemote`](remote::MemoryRemote).

pub mod api;
pub mod auth;
pub mod error;
pub mod filter;
pub mod grid;
pub mod model;
pub mod overlay;
pub mod page;
pub mod rate_limit;
pub mod remote;
pub mod response;
pub mod store;

mod client;

pub use client::*;
pub use error::Error;
pub use grid::GridConfig;
pub use grid::KnowledgeGrid;
pub use response::CacheStatus;
pub use response::Response;
