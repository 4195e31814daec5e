//! Remote table store abstraction.
//!
//! The grid only needs three data operations from the server (scroll,
//! upsert and delete by id) plus a metadata side channel. [`RemoteStore`]
//! captures exactly that, so the grid runs against the HTTP
//! [`GridClient`](crate::GridClient) or the in-process [`MemoryRemote`].
//!
//! Batches are all-or-nothing from the caller's point of view: an `Err`
//! means the grid applies none of the batch locally.

mod memory;

pub use memory::*;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;

use crate::error::ApiError;
use crate::error::Error;
use crate::model::ColumnMapper;
use crate::model::RawRecord;
use crate::model::Row;
use crate::model::TableMetadata;
use crate::page::Cursor;
use crate::page::Page;

/// Identifies the dataset a table scrolls over.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceKey {
    pub source_name: String,
    pub context_id: String,
}

impl SourceKey {
    /// Creates a source key.
    pub fn new(source_name: impl Into<String>, context_id: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            context_id: context_id.into(),
        }
    }
}

/// One scroll result as the server returned it, before column mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrollPage {
    /// Backend column ids in server order.
    pub columns: Vec<String>,
    /// Raw rows keyed by backend column id.
    pub rows: Vec<serde_json::Map<String, serde_json::Value>>,
    /// Cursor of the following page; `None` on the last page.
    pub next_cursor: Option<Cursor>,
    /// Raw records aligned with `rows`.
    pub records: Vec<RawRecord>,
}

impl ScrollPage {
    /// Materialises the scroll result into a display [`Page`].
    ///
    /// A row's id is its `id` field, or the point id of the record at the
    /// same position when the field is missing.
    pub fn into_page(self, cursor: Option<Cursor>, mapper: &ColumnMapper) -> Result<Page, ApiError> {
        let display_columns = mapper.display_columns(&self.columns);
        let rows = self
            .rows
            .into_iter()
            .enumerate()
            .map(|(i, raw)| {
                let id = row_id(&raw)
                    .or_else(|| self.records.get(i).map(|r| r.qdrant_id.clone()))
                    .ok_or_else(|| ApiError::parse(format!("Scroll row {i} has no id")))?;
                Ok(Row::with_fields(id, mapper.to_display(raw)))
            })
            .collect::<Result<Vec<_>, ApiError>>()?;

        Ok(Page::new(cursor, rows)
            .with_records(self.records)
            .with_display_columns(display_columns)
            .with_next_cursor(self.next_cursor))
    }
}

fn row_id(raw: &serde_json::Map<String, serde_json::Value>) -> Option<String> {
    match raw.get("id")? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A row write addressed by durable id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub id: String,
    pub table_id: String,
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl Point {
    /// Creates a point.
    pub fn new(
        id: impl Into<String>,
        table_id: impl Into<String>,
        data: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: id.into(),
            table_id: table_id.into(),
            data,
        }
    }
}

/// Server-side table operations the grid depends on.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Reads one page of rows starting at `cursor`.
    async fn scroll(
        &self,
        source: &SourceKey,
        cursor: Option<&Cursor>,
        limit: usize,
    ) -> Result<ScrollPage, Error>;

    /// Creates or replaces rows. Idempotent per point id.
    async fn upsert(&self, table_id: &str, points: Vec<Point>) -> Result<(), Error>;

    /// Deletes rows by durable id.
    async fn delete(&self, table_id: &str, ids: Vec<String>) -> Result<(), Error>;

    /// Reads the table metadata record, if one exists.
    async fn metadata(&self, table_id: &str) -> Result<Option<TableMetadata>, Error>;

    /// Writes the table metadata record.
    async fn put_metadata(&self, table_id: &str, metadata: &TableMetadata) -> Result<(), Error>;
}
