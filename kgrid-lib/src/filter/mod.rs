//! Column filters over merged rows.
//!
//! Each filter is a case-insensitive substring match on one display column.
//! Filters on different columns are ANDed. Input is debounced by the grid
//! through a [`Debouncer`]; [`FilterSet`] itself is a plain value.

mod debounce;

pub use debounce::*;

use std::collections::BTreeMap;

use crate::model::Row;

/// The active column filters.
///
/// # Example
///
/// ```
/// use kgrid_lib::filter::FilterSet;
/// use kgrid_lib::model::Row;
///
/// let mut filters = FilterSet::new();
/// filters.set("Name", "acme");
///
/// assert!(filters.matches(&Row::new("1").set("Name", "ACME Corp")));
/// assert!(!filters.matches(&Row::new("2").set("Name", "Globex")));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    queries: BTreeMap<String, String>,
}

impl FilterSet {
    /// Creates an empty filter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the query for a column. An empty query removes the filter.
    ///
    /// Returns `true` if the set changed.
    pub fn set(&mut self, column: impl Into<String>, query: impl Into<String>) -> bool {
        let column = column.into();
        let query = query.into();
        if query.trim().is_empty() {
            return self.queries.remove(&column).is_some();
        }
        let needle = query.to_lowercase();
        if self.queries.get(&column) == Some(&needle) {
            return false;
        }
        self.queries.insert(column, needle);
        true
    }

    /// Removes every filter.
    pub fn clear(&mut self) {
        self.queries.clear();
    }

    /// Returns the lowercased query of a column.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.queries.get(column).map(String::as_str)
    }

    /// Returns `true` if no filter is set.
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Returns the number of filtered columns.
    pub fn len(&self) -> usize {
        self.queries.len()
    }

    /// Iterates over `(column, query)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.queries.iter().map(|(c, q)| (c.as_str(), q.as_str()))
    }

    /// Returns `true` if the row passes every filter.
    ///
    /// A missing cell reads as the empty string.
    pub fn matches(&self, row: &Row) -> bool {
        self.queries
            .iter()
            .all(|(column, needle)| row.text(column).to_lowercase().contains(needle.as_str()))
    }

    /// Keeps the rows that pass every filter, in order.
    pub fn apply(&self, rows: Vec<Row>) -> Vec<Row> {
        if self.is_empty() {
            return rows;
        }
        rows.into_iter().filter(|r| self.matches(r)).collect()
    }
}
