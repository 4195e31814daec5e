//! Cursor-paged table data.
//!
//! A [`Page`] is one scroll result materialised into display rows. Pages are
//! immutable once built; edits and deletions derive a new page that replaces
//! the old one in the [`PageCache`].

mod cache;

pub use cache::*;

use std::collections::HashMap;
use std::collections::HashSet;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::model::RawRecord;
use crate::model::Row;
use crate::model::RowId;
use crate::model::Value;

/// Opaque pagination token issued by the server.
///
/// The first page has no cursor; it is modelled as `Option<Cursor>::None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    /// Wraps a server token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A page of rows with the cursor that produced it and the one that follows.
///
/// # Example
///
/// ```
/// use kgrid_lib::model::{RawRecord, Row};
/// use kgrid_lib::page::{Cursor, Page};
///
/// let page = Page::new(None, vec![Row::new("q-1")])
///     .with_records(vec![RawRecord::new("q-1").with_original_id("acme")])
///     .with_next_cursor(Some(Cursor::new("20")));
///
/// assert!(page.has_more());
/// assert_eq!(page.original_id("q-1"), Some("acme"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    cursor: Option<Cursor>,
    rows: Vec<Row>,
    records: Vec<RawRecord>,
    display_columns: Vec<String>,
    next_cursor: Option<Cursor>,
    record_index: HashMap<String, usize>,
}

impl Page {
    /// Creates a page fetched at `cursor`.
    pub fn new(cursor: Option<Cursor>, rows: Vec<Row>) -> Self {
        Self {
            cursor,
            rows,
            records: Vec::new(),
            display_columns: Vec::new(),
            next_cursor: None,
            record_index: HashMap::new(),
        }
    }

    /// Sets the raw records backing the rows.
    pub fn with_records(mut self, records: Vec<RawRecord>) -> Self {
        self.record_index = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.qdrant_id.clone(), i))
            .collect();
        self.records = records;
        self
    }

    /// Sets the display column order.
    pub fn with_display_columns(mut self, columns: Vec<String>) -> Self {
        self.display_columns = columns;
        self
    }

    /// Sets the cursor of the following page.
    pub fn with_next_cursor(mut self, next_cursor: Option<Cursor>) -> Self {
        self.next_cursor = next_cursor;
        self
    }

    /// Returns the cursor this page was fetched at.
    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    /// Returns the rows of this page.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Returns the raw records of this page.
    pub fn records(&self) -> &[RawRecord] {
        &self.records
    }

    /// Returns the display column names, in server order.
    pub fn display_columns(&self) -> &[String] {
        &self.display_columns
    }

    /// Returns the cursor of the next page, if there is one.
    pub fn next_cursor(&self) -> Option<&Cursor> {
        self.next_cursor.as_ref()
    }

    /// Returns `true` if there are more pages available.
    pub fn has_more(&self) -> bool {
        self.next_cursor.is_some()
    }

    /// Returns the number of rows in this page.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if this page has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns `true` if a row with this id is on the page.
    pub fn contains(&self, row_id: &str) -> bool {
        self.rows.iter().any(|r| r.id() == row_id)
    }

    /// Returns the row with this id.
    pub fn row(&self, row_id: &str) -> Option<&Row> {
        self.rows.iter().find(|r| r.id() == row_id)
    }

    /// Returns the raw record backing a row.
    pub fn record(&self, row_id: &str) -> Option<&RawRecord> {
        self.record_index.get(row_id).map(|&i| &self.records[i])
    }

    /// Returns the durable id recorded for a row.
    pub fn original_id(&self, row_id: &str) -> Option<&str> {
        self.record(row_id).and_then(RawRecord::original_id)
    }

    /// Returns the identity of a row on this page.
    pub fn row_id(&self, row_id: &str) -> RowId {
        RowId::Remote {
            server_id: row_id.to_string(),
            durable_id: self.original_id(row_id).map(str::to_string),
        }
    }

    /// Returns every id this page vouches for: row ids and durable ids.
    pub fn known_ids(&self) -> HashSet<&str> {
        self.rows
            .iter()
            .map(|r| r.id())
            .chain(self.records.iter().filter_map(RawRecord::original_id))
            .collect()
    }

    /// Returns a copy of the page without the given rows.
    ///
    /// A row goes if its row id or its durable id is listed.
    pub fn without_rows(&self, ids: &HashSet<String>) -> Self {
        let dropped = |row_id: &str| {
            ids.contains(row_id) || self.original_id(row_id).is_some_and(|o| ids.contains(o))
        };
        let rows: Vec<Row> = self
            .rows
            .iter()
            .filter(|r| !dropped(r.id()))
            .cloned()
            .collect();
        let records: Vec<RawRecord> = self
            .records
            .iter()
            .filter(|r| !dropped(&r.qdrant_id))
            .cloned()
            .collect();

        Page::new(self.cursor.clone(), rows)
            .with_records(records)
            .with_display_columns(self.display_columns.clone())
            .with_next_cursor(self.next_cursor.clone())
    }

    /// Returns a copy of the page with `patch` applied to one row.
    ///
    /// Returns `None` if the row is not on this page.
    pub fn with_row_patched(&self, row_id: &str, patch: &HashMap<String, Value>) -> Option<Self> {
        let position = self.rows.iter().position(|r| r.id() == row_id)?;
        let mut page = self.clone();
        page.rows[position] = self.rows[position].patched(patch);
        Some(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Page {
        Page::new(None, vec![Row::new("q-1"), Row::new("q-2"), Row::new("q-3")])
            .with_records(vec![
                RawRecord::new("q-1").with_original_id("a"),
                RawRecord::new("q-2").with_original_id("b"),
                RawRecord::new("q-3"),
            ])
            .with_next_cursor(Some(Cursor::new("3")))
    }

    #[test]
    fn test_without_rows_matches_row_or_durable_id() {
        let ids = HashSet::from(["q-1".to_string(), "b".to_string()]);
        let trimmed = page().without_rows(&ids);

        let remaining: Vec<&str> = trimmed.rows().iter().map(Row::id).collect();
        assert_eq!(remaining, vec!["q-3"]);
        assert_eq!(trimmed.records().len(), 1);
        assert_eq!(trimmed.next_cursor(), Some(&Cursor::new("3")));
    }

    #[test]
    fn test_with_row_patched_leaves_original_untouched() {
        let original = page();
        let patch = HashMap::from([("Name".to_string(), Value::from("Acme"))]);

        let patched = original.with_row_patched("q-2", &patch).unwrap();
        assert_eq!(patched.row("q-2").unwrap().text("Name"), "Acme");
        assert_eq!(original.row("q-2").unwrap().text("Name"), "");
        assert!(original.with_row_patched("missing", &patch).is_none());
    }

    #[test]
    fn test_row_id_carries_durable_id() {
        let page = page();

        assert_eq!(page.row_id("q-1").durable().as_str(), "a");
        assert!(page.row_id("q-3").durable().is_fallback());
    }
}
