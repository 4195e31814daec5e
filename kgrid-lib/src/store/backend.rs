//! Raw key-value backend trait.

use async_trait::async_trait;

use crate::error::StoreError;

/// Raw string storage behind an [`OverlayStore`](super::OverlayStore).
///
/// Implementations only move strings; the store owns key naming and the
/// snapshot encoding.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Returns the value for a key.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Writes the value for a key.
    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// Deletes a key. Missing keys are not an error.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// A backend that remembers nothing.
///
/// For sessions that must not persist unsynced edits.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBackend;

#[async_trait]
impl StoreBackend for NoopBackend {
    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: String) -> Result<(), StoreError> {
        Ok(())
    }

    async fn remove(&self, _key: &str) -> Result<(), StoreError> {
        Ok(())
    }
}
