//! In-process remote store

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use super::Point;
use super::RemoteStore;
use super::ScrollPage;
use super::SourceKey;
use crate::error::ApiError;
use crate::error::Error;
use crate::model::RawRecord;
use crate::model::TableMetadata;
use crate::page::Cursor;

/// Call kinds of a [`RemoteStore`], used to target injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteCall {
    Scroll,
    Upsert,
    Delete,
    Metadata,
    PutMetadata,
}

#[derive(Debug, Clone)]
struct StoredPoint {
    qdrant_id: String,
    original_id: String,
    data: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Default)]
struct Tables {
    points: HashMap<String, Vec<StoredPoint>>,
    metadata: HashMap<String, TableMetadata>,
    failures: HashMap<RemoteCall, usize>,
}

/// A [`RemoteStore`] kept in memory.
///
/// Scrolling source `s` reads table `s`. Cursors are stringified row offsets.
/// Upserts match existing rows on their durable id and otherwise insert with
/// a fresh point id, so point ids and durable ids differ the way they do on
/// the real server.
///
/// Cheap to clone; clones share the same tables.
///
/// # Example
///
/// ```
/// # async fn demo() -> Result<(), kgrid_lib::Error> {
/// use kgrid_lib::remote::{MemoryRemote, RemoteStore, SourceKey};
///
/// let remote = MemoryRemote::new();
/// remote.insert("t-1", "q-1", Some("acme"), serde_json::Map::new());
///
/// let page = remote.scroll(&SourceKey::new("t-1", ""), None, 20).await?;
/// assert_eq!(page.rows.len(), 1);
/// assert_eq!(page.next_cursor, None);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryRemote {
    tables: Arc<Mutex<Tables>>,
    scroll_calls: Arc<AtomicUsize>,
    latency: Arc<Mutex<Option<Duration>>>,
}

impl MemoryRemote {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts a server row directly.
    pub fn insert(
        &self,
        table_id: &str,
        qdrant_id: impl Into<String>,
        original_id: Option<&str>,
        data: serde_json::Map<String, serde_json::Value>,
    ) {
        let qdrant_id = qdrant_id.into();
        let original_id = original_id.map_or_else(|| qdrant_id.clone(), str::to_string);
        self.tables()
            .points
            .entry(table_id.to_string())
            .or_default()
            .push(StoredPoint {
                qdrant_id,
                original_id,
                data,
            });
    }

    /// Returns the number of rows stored for a table.
    pub fn row_count(&self, table_id: &str) -> usize {
        self.tables().points.get(table_id).map_or(0, Vec::len)
    }

    /// Returns the data stored under a durable id.
    pub fn get(&self, table_id: &str, original_id: &str) -> Option<serde_json::Map<String, serde_json::Value>> {
        self.tables()
            .points
            .get(table_id)?
            .iter()
            .find(|p| p.original_id == original_id)
            .map(|p| p.data.clone())
    }

    /// Returns `true` if a row with this point id or durable id exists.
    pub fn contains(&self, table_id: &str, id: &str) -> bool {
        self.tables()
            .points
            .get(table_id)
            .is_some_and(|points| points.iter().any(|p| p.qdrant_id == id || p.original_id == id))
    }

    /// Sets the stored metadata record directly.
    pub fn set_metadata(&self, table_id: &str, metadata: TableMetadata) {
        self.tables().metadata.insert(table_id.to_string(), metadata);
    }

    /// Returns the stored metadata record.
    pub fn stored_metadata(&self, table_id: &str) -> Option<TableMetadata> {
        self.tables().metadata.get(table_id).cloned()
    }

    /// Returns how many scroll calls were served.
    pub fn scroll_calls(&self) -> usize {
        self.scroll_calls.load(Ordering::SeqCst)
    }

    /// Makes the next call of this kind fail with [`ApiError::Unavailable`].
    pub fn fail_next(&self, call: RemoteCall) {
        *self.tables().failures.entry(call).or_default() += 1;
    }

    /// Delays every call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().unwrap_or_else(PoisonError::into_inner) = latency;
    }

    async fn enter(&self, call: RemoteCall) -> Result<(), Error> {
        let latency = *self.latency.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut tables = self.tables();
        if let Some(remaining) = tables.failures.get_mut(&call)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(ApiError::Unavailable(format!("injected {call:?} failure")).into());
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn scroll(
        &self,
        source: &SourceKey,
        cursor: Option<&Cursor>,
        limit: usize,
    ) -> Result<ScrollPage, Error> {
        self.enter(RemoteCall::Scroll).await?;
        self.scroll_calls.fetch_add(1, Ordering::SeqCst);

        let offset = match cursor {
            Some(c) => c
                .as_str()
                .parse::<usize>()
                .map_err(|_| ApiError::http(400, format!("Invalid cursor '{c}'")))?,
            None => 0,
        };

        let tables = self.tables();
        let points = tables
            .points
            .get(&source.source_name)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let columns: BTreeSet<&String> = points.iter().flat_map(|p| p.data.keys()).collect();
        let end = offset.saturating_add(limit).min(points.len());
        let slice = points.get(offset..end).unwrap_or_default();

        let rows = slice
            .iter()
            .map(|p| {
                let mut row = p.data.clone();
                row.insert("id".to_string(), p.qdrant_id.clone().into());
                row
            })
            .collect();
        let records = slice
            .iter()
            .map(|p| RawRecord::new(p.qdrant_id.clone()).with_original_id(p.original_id.clone()))
            .collect();

        Ok(ScrollPage {
            columns: std::iter::once("id".to_string())
                .chain(columns.into_iter().filter(|c| c.as_str() != "id").cloned())
                .collect(),
            rows,
            next_cursor: (end < points.len()).then(|| Cursor::new(end.to_string())),
            records,
        })
    }

    async fn upsert(&self, table_id: &str, points: Vec<Point>) -> Result<(), Error> {
        self.enter(RemoteCall::Upsert).await?;

        let mut tables = self.tables();
        let stored = tables.points.entry(table_id.to_string()).or_default();
        for point in points {
            match stored.iter_mut().find(|p| p.original_id == point.id) {
                Some(existing) => existing.data = point.data,
                None => stored.push(StoredPoint {
                    qdrant_id: Uuid::new_v4().to_string(),
                    original_id: point.id,
                    data: point.data,
                }),
            }
        }
        Ok(())
    }

    async fn delete(&self, table_id: &str, ids: Vec<String>) -> Result<(), Error> {
        self.enter(RemoteCall::Delete).await?;

        let mut tables = self.tables();
        if let Some(stored) = tables.points.get_mut(table_id) {
            stored.retain(|p| !ids.iter().any(|id| *id == p.original_id || *id == p.qdrant_id));
        }
        Ok(())
    }

    async fn metadata(&self, table_id: &str) -> Result<Option<TableMetadata>, Error> {
        self.enter(RemoteCall::Metadata).await?;
        Ok(self.stored_metadata(table_id))
    }

    async fn put_metadata(&self, table_id: &str, metadata: &TableMetadata) -> Result<(), Error> {
        self.enter(RemoteCall::PutMetadata).await?;
        self.set_metadata(table_id, metadata.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(n: usize) -> MemoryRemote {
        let remote = MemoryRemote::new();
        for i in 0..n {
            let mut data = serde_json::Map::new();
            data.insert("name".to_string(), format!("row {i}").into());
            remote.insert("t", format!("q-{i}"), Some(format!("o-{i}").as_str()), data);
        }
        remote
    }

    #[tokio::test]
    async fn test_scroll_pages_with_offset_cursors() {
        let remote = seeded(25);
        let source = SourceKey::new("t", "");

        let first = remote.scroll(&source, None, 20).await.unwrap();
        assert_eq!(first.rows.len(), 20);
        assert_eq!(first.next_cursor, Some(Cursor::new("20")));
        assert_eq!(first.columns, vec!["id", "name"]);

        let second = remote.scroll(&source, first.next_cursor.as_ref(), 20).await.unwrap();
        assert_eq!(second.rows.len(), 5);
        assert_eq!(second.next_cursor, None);
        assert_eq!(second.records[0].original_id(), Some("o-20"));
        assert_eq!(remote.scroll_calls(), 2);
    }

    #[tokio::test]
    async fn test_upsert_matches_durable_id() {
        let remote = seeded(1);
        let mut data = serde_json::Map::new();
        data.insert("name".to_string(), "renamed".into());

        remote
            .upsert("t", vec![Point::new("o-0", "t", data.clone()), Point::new("new", "t", data)])
            .await
            .unwrap();

        assert_eq!(remote.row_count("t"), 2);
        assert_eq!(remote.get("t", "o-0").unwrap()["name"], "renamed");
    }

    #[tokio::test]
    async fn test_delete_accepts_point_or_durable_ids() {
        let remote = seeded(3);

        remote
            .delete("t", vec!["o-0".to_string(), "q-1".to_string()])
            .await
            .unwrap();

        assert_eq!(remote.row_count("t"), 1);
        assert!(remote.contains("t", "q-2"));
    }

    #[tokio::test]
    async fn test_injected_failure_is_one_shot() {
        let remote = seeded(1);
        remote.fail_next(RemoteCall::Delete);

        assert!(remote.delete("t", vec!["o-0".to_string()]).await.is_err());
        assert_eq!(remote.row_count("t"), 1);
        assert!(remote.delete("t", vec!["o-0".to_string()]).await.is_ok());
        assert_eq!(remote.row_count("t"), 0);
    }
}
