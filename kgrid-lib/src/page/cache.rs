//! Session cache of fetched pages and the cursor history.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;

use super::Cursor;
use super::Page;
use crate::model::Row;
use crate::model::Value;

/// Cache key: the cursor a page was fetched at and the limit used.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub cursor: Option<Cursor>,
    pub limit: usize,
}

impl PageKey {
    /// Creates a key.
    pub fn new(cursor: Option<Cursor>, limit: usize) -> Self {
        Self { cursor, limit }
    }
}

/// A cached page and when it entered the cache.
#[derive(Debug, Clone)]
pub struct CachedPage {
    pub page: Arc<Page>,
    pub cached_at: DateTime<Utc>,
}

/// Pages fetched this session, the visited cursor history and the position
/// in it.
///
/// Server pages are never evicted during a session. Backward navigation is
/// therefore always a cache hit, and forward navigation to a page seen before
/// is one too.
///
/// In full-dataset mode a single page holding every row stands in for the
/// cursor history until [`reset`](Self::reset) starts a new page-based load.
#[derive(Debug, Default)]
pub struct PageCache {
    pages: HashMap<PageKey, CachedPage>,
    history: Vec<Option<Cursor>>,
    index: usize,
    page_size: usize,
    full: Option<CachedPage>,
}

impl PageCache {
    /// Creates an empty cache navigating with `page_size`.
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            ..Self::default()
        }
    }

    /// Drops every page and the history, keeping `page_size`.
    pub fn reset(&mut self, page_size: usize) {
        *self = Self::new(page_size);
    }

    /// Returns the page size used for navigation.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns the zero-based index of the current page.
    pub fn page_index(&self) -> usize {
        self.index
    }

    /// Returns the visited cursors in order.
    pub fn history(&self) -> &[Option<Cursor>] {
        &self.history
    }

    /// Returns `true` while the grid shows the whole dataset.
    pub fn is_full_dataset(&self) -> bool {
        self.full.is_some()
    }

    /// Returns the number of cached cursor pages.
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Returns `true` if no page is cached.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty() && self.full.is_none()
    }

    /// Looks up a cached page.
    pub fn get(&self, key: &PageKey) -> Option<&CachedPage> {
        self.pages.get(key)
    }

    /// Stores a freshly fetched page and returns the shared handle.
    pub fn insert(&mut self, key: PageKey, page: Page) -> CachedPage {
        let cached = CachedPage {
            page: Arc::new(page),
            cached_at: Utc::now(),
        };
        self.pages.insert(key, cached.clone());
        cached
    }

    /// Starts the history at the first page.
    pub fn start(&mut self) {
        self.history = vec![None];
        self.index = 0;
        self.full = None;
    }

    /// Replaces the history with full-dataset mode.
    pub fn enter_full_dataset(&mut self, page: Page) -> CachedPage {
        self.pages.clear();
        self.history.clear();
        self.index = 0;
        let cached = CachedPage {
            page: Arc::new(page),
            cached_at: Utc::now(),
        };
        self.full = Some(cached.clone());
        cached
    }

    /// Returns the page the grid currently shows.
    pub fn current(&self) -> Option<Arc<Page>> {
        self.current_entry().map(|c| c.page.clone())
    }

    /// Returns the cache entry of the current page.
    pub fn current_entry(&self) -> Option<&CachedPage> {
        if let Some(full) = &self.full {
            return Some(full);
        }
        let cursor = self.history.get(self.index)?;
        self.pages.get(&PageKey::new(cursor.clone(), self.page_size))
    }

    /// Returns the cursor the next page lives at, if there is a next page.
    ///
    /// Prefers the history (a page visited before) over the current page's
    /// `next_cursor`.
    pub fn next_cursor(&self) -> Option<Cursor> {
        if self.full.is_some() {
            return None;
        }
        if let Some(Some(cursor)) = self.history.get(self.index + 1) {
            return Some(cursor.clone());
        }
        self.current()?.next_cursor().cloned()
    }

    /// Returns the cursor of the previous page, if any.
    pub fn prev_cursor(&self) -> Option<Option<Cursor>> {
        if self.full.is_some() || self.index == 0 {
            return None;
        }
        self.history.get(self.index - 1).cloned()
    }

    /// Records that the grid moved forward to the page at `cursor`.
    ///
    /// A different cursor than the remembered one truncates the history past
    /// the current position first.
    pub fn advance(&mut self, cursor: Cursor) {
        let next = self.index + 1;
        if self.history.get(next) != Some(&Some(cursor.clone())) {
            self.history.truncate(next);
            self.history.push(Some(cursor));
        }
        self.index = next;
    }

    /// Moves back one page. Returns `false` at the first page.
    pub fn retreat(&mut self) -> bool {
        if self.full.is_some() || self.index == 0 {
            return false;
        }
        self.index -= 1;
        true
    }

    /// Iterates over every cached page, including the full-dataset page.
    pub fn pages(&self) -> impl Iterator<Item = &Arc<Page>> {
        self.pages
            .values()
            .chain(self.full.iter())
            .map(|c| &c.page)
    }

    /// Finds a row on any cached page.
    pub fn find_row(&self, row_id: &str) -> Option<(Row, Arc<Page>)> {
        self.pages()
            .find_map(|p| p.row(row_id).map(|r| (r.clone(), p.clone())))
    }

    /// Finds the durable id recorded for a row on any cached page.
    pub fn original_id(&self, row_id: &str) -> Option<String> {
        self.pages()
            .find_map(|p| p.original_id(row_id).map(str::to_string))
    }

    /// Removes rows from every cached page.
    ///
    /// Pages are replaced, not mutated, so handles given out earlier keep
    /// their contents. Returns the number of pages that changed.
    pub fn remove_rows(&mut self, ids: &HashSet<String>) -> usize {
        let mut changed = 0;
        for cached in self.pages.values_mut().chain(self.full.iter_mut()) {
            let trimmed = cached.page.without_rows(ids);
            if trimmed.len() != cached.page.len() {
                cached.page = Arc::new(trimmed);
                changed += 1;
            }
        }
        changed
    }

    /// Applies `patch` to a row on every cached page that holds it.
    ///
    /// Returns `false` if no cached page holds the row.
    pub fn patch_row(&mut self, row_id: &str, patch: &HashMap<String, Value>) -> bool {
        let mut found = false;
        for cached in self.pages.values_mut().chain(self.full.iter_mut()) {
            if let Some(patched) = cached.page.with_row_patched(row_id, patch) {
                cached.page = Arc::new(patched);
                found = true;
            }
        }
        found
    }
}
