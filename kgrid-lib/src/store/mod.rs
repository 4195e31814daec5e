//! Local persistence of unsynced overlay state.
//!
//! The grid writes an [`OverlaySnapshot`] after every overlay mutation and
//! reads it back once when it mounts, so rows that the server has not yet
//! confirmed survive a reload. Storage is injected: any [`StoreBackend`]
//! works, including [`NoopBackend`] when nothing should persist.
//!
//! Two sessions sharing one backend and table write the same key; the last
//! writer wins and no merge is attempted.

mod backend;
mod memory;
mod sqlite;

pub use backend::*;
pub use memory::*;
pub use sqlite::*;

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

use crate::error::StoreError;
use crate::model::Row;

/// Prefix of every snapshot key.
pub const STORAGE_KEY_PREFIX: &str = "tdg_cache_";

/// Returns the storage key for a table.
///
/// ```
/// assert_eq!(kgrid_lib::store::storage_key("t-42"), "tdg_cache_t-42");
/// ```
pub fn storage_key(table_id: &str) -> String {
    format!("{STORAGE_KEY_PREFIX}{table_id}")
}

/// Serialised overlay state for one table.
///
/// Encoded as JSON `{ newRows, newRowIds, deletedRowIds }`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlaySnapshot {
    #[serde(default)]
    pub new_rows: Vec<Row>,
    #[serde(default)]
    pub new_row_ids: Vec<String>,
    #[serde(default)]
    pub deleted_row_ids: Vec<String>,
}

impl OverlaySnapshot {
    /// Returns `true` if the snapshot carries no state.
    pub fn is_empty(&self) -> bool {
        self.new_rows.is_empty() && self.new_row_ids.is_empty() && self.deleted_row_ids.is_empty()
    }
}

/// Typed snapshot storage keyed by table id.
///
/// # Example
///
/// ```
/// # async fn demo() -> Result<(), kgrid_lib::error::StoreError> {
/// use kgrid_lib::store::{MemoryBackend, OverlaySnapshot, OverlayStore};
///
/// let store = OverlayStore::new(MemoryBackend::new());
/// store.save("t-1", &OverlaySnapshot::default()).await?;
/// assert_eq!(store.load("t-1").await?, Some(OverlaySnapshot::default()));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct OverlayStore {
    backend: Arc<dyn StoreBackend>,
}

impl OverlayStore {
    /// Creates a store over the given backend.
    pub fn new(backend: impl StoreBackend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// Creates a store over a shared backend.
    pub fn from_arc(backend: Arc<dyn StoreBackend>) -> Self {
        Self { backend }
    }

    /// Creates a store that persists nothing.
    pub fn disabled() -> Self {
        Self::new(NoopBackend)
    }

    /// Reads the snapshot of a table.
    pub async fn load(&self, table_id: &str) -> Result<Option<OverlaySnapshot>, StoreError> {
        match self.backend.get(&storage_key(table_id)).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Writes the snapshot of a table.
    pub async fn save(&self, table_id: &str, snapshot: &OverlaySnapshot) -> Result<(), StoreError> {
        let json = serde_json::to_string(snapshot)?;
        self.backend.set(&storage_key(table_id), json).await
    }

    /// Deletes the snapshot of a table.
    pub async fn clear(&self, table_id: &str) -> Result<(), StoreError> {
        self.backend.remove(&storage_key(table_id)).await
    }
}

impl std::fmt::Debug for OverlayStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_json_shape() {
        let snapshot = OverlaySnapshot {
            new_rows: vec![Row::new("tmp-1").set("Name", "Acme")],
            new_row_ids: vec!["tmp-1".to_string()],
            deleted_row_ids: vec!["q-7".to_string()],
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "newRows": [{"id": "tmp-1", "Name": "Acme"}],
                "newRowIds": ["tmp-1"],
                "deletedRowIds": ["q-7"],
            })
        );
    }

    #[tokio::test]
    async fn test_store_uses_prefixed_key() {
        let backend = MemoryBackend::new();
        let store = OverlayStore::new(backend.clone());

        store.save("t-1", &OverlaySnapshot::default()).await.unwrap();
        assert!(backend.raw("tdg_cache_t-1").is_some());

        store.clear("t-1").await.unwrap();
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_an_error() {
        let backend = MemoryBackend::new();
        backend.set("tdg_cache_t-1", "{not json".to_string()).await.unwrap();

        let result = OverlayStore::new(backend).load("t-1").await;
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_disabled_store_forgets() {
        let store = OverlayStore::disabled();
        let snapshot = OverlaySnapshot {
            new_row_ids: vec!["x".to_string()],
            ..Default::default()
        };

        store.save("t", &snapshot).await.unwrap();
        assert_eq!(store.load("t").await.unwrap(), None);
    }
}
