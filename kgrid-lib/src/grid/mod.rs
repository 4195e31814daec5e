//! The knowledge-table grid engine.
//!
//! [`KnowledgeGrid`] wires the page cache, the local overlay, the filter
//! pipeline, the overlay store and a [`RemoteStore`] into the operations an
//! editable table view needs:
//!
//! - loading: [`mount`](KnowledgeGrid::mount),
//!   [`fetch_page`](KnowledgeGrid::fetch_page),
//!   [`next_page`](KnowledgeGrid::next_page),
//!   [`prev_page`](KnowledgeGrid::prev_page),
//!   [`show_all`](KnowledgeGrid::show_all), [`reload`](KnowledgeGrid::reload),
//!   [`refresh`](KnowledgeGrid::refresh), [`retry`](KnowledgeGrid::retry)
//! - mutations: [`add_row`](KnowledgeGrid::add_row),
//!   [`edit_row`](KnowledgeGrid::edit_row), [`save`](KnowledgeGrid::save),
//!   [`delete_rows`](KnowledgeGrid::delete_rows)
//! - display: [`display_rows`](KnowledgeGrid::display_rows) and the filter
//!   methods
//!
//! Grid state sits behind a synchronous mutex that is never held across an
//! await. Remote calls run without it; their results are applied in one
//! critical section afterwards, so a failed call leaves the state as it was.

mod config;
mod flags;
mod load;
mod mutate;
mod notice;

pub use config::*;
pub use notice::*;

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use crate::error::ApiError;
use crate::error::Error;
use crate::filter::Debouncer;
use crate::filter::FilterSet;
use crate::model::ColumnMapper;
use crate::model::DurableId;
use crate::model::Row;
use crate::model::RowId;
use crate::model::TableMetadata;
use crate::overlay::EntryState;
use crate::overlay::KeyedLocks;
use crate::overlay::Overlay;
use crate::page::Cursor;
use crate::page::PageCache;
use crate::remote::RemoteStore;
use crate::store::OverlaySnapshot;
use crate::store::OverlayStore;

/// Editable view over one remote table.
///
/// This type is cheap to clone (uses `Arc` internally); clones drive the same
/// grid.
///
/// # Example
///
/// ```
/// # async fn demo() -> Result<(), kgrid_lib::Error> {
/// use kgrid_lib::grid::{GridConfig, KnowledgeGrid};
/// use kgrid_lib::model::Row;
/// use kgrid_lib::remote::MemoryRemote;
/// use kgrid_lib::store::{MemoryBackend, OverlayStore};
///
/// let grid = KnowledgeGrid::new(
///     GridConfig::new("leads"),
///     MemoryRemote::new(),
///     OverlayStore::new(MemoryBackend::new()),
/// );
/// grid.mount().await?;
///
/// let id = grid.insert_row(Row::new("tmp-1").set("Name", "Acme")).await?;
/// assert_eq!(grid.display_rows()[0].id(), id);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct KnowledgeGrid {
    inner: Arc<Inner>,
}

struct Inner {
    config: GridConfig,
    remote: Arc<dyn RemoteStore>,
    store: OverlayStore,
    state: Mutex<GridState>,
    filters: Debouncer<FilterSet>,
    row_locks: KeyedLocks,
    fetch_locks: KeyedLocks,
    persist_lock: tokio::sync::Mutex<()>,
    metadata_lock: tokio::sync::Mutex<()>,
    loading: AtomicUsize,
    adding_row: AtomicBool,
    saving: AtomicBool,
    deleting: AtomicBool,
}

struct GridState {
    cache: PageCache,
    overlay: Overlay,
    mapper: ColumnMapper,
    active_filters: FilterSet,
    row_count: u64,
    notices: Vec<Notice>,
    failed_load: Option<FailedLoad>,
}

/// A load that failed and can be repeated by [`KnowledgeGrid::retry`].
#[derive(Debug, Clone, PartialEq, Eq)]
enum FailedLoad {
    Fetch { cursor: Option<Cursor>, limit: usize },
    Next,
    ShowAll,
    Reload,
    Refresh,
}

impl KnowledgeGrid {
    /// Creates a grid. Nothing is loaded until [`mount`](Self::mount).
    pub fn new(config: GridConfig, remote: impl RemoteStore + 'static, store: OverlayStore) -> Self {
        Self::from_arc(config, Arc::new(remote), store)
    }

    /// Creates a grid over a shared remote store.
    pub fn from_arc(config: GridConfig, remote: Arc<dyn RemoteStore>, store: OverlayStore) -> Self {
        let state = GridState {
            cache: PageCache::new(config.page_size),
            overlay: Overlay::new(),
            mapper: ColumnMapper::new(config.columns.clone()),
            active_filters: FilterSet::new(),
            row_count: 0,
            notices: Vec::new(),
            failed_load: None,
        };
        Self {
            inner: Arc::new(Inner {
                filters: Debouncer::new(FilterSet::new(), config.filter_debounce),
                config,
                remote,
                store,
                state: Mutex::new(state),
                row_locks: KeyedLocks::new(),
                fetch_locks: KeyedLocks::new(),
                persist_lock: tokio::sync::Mutex::new(()),
                metadata_lock: tokio::sync::Mutex::new(()),
                loading: AtomicUsize::new(0),
                adding_row: AtomicBool::new(false),
                saving: AtomicBool::new(false),
                deleting: AtomicBool::new(false),
            }),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &GridConfig {
        &self.inner.config
    }

    fn table_id(&self) -> &str {
        &self.inner.config.table_id
    }

    fn state(&self) -> MutexGuard<'_, GridState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Flags and counters
    // =========================================================================

    /// Returns `true` while any page load is in flight.
    pub fn is_loading(&self) -> bool {
        self.inner.loading.load(Ordering::Acquire) > 0
    }

    /// Returns `true` while a row is being added.
    pub fn is_adding_row(&self) -> bool {
        self.inner.adding_row.load(Ordering::Acquire)
    }

    /// Returns `true` while dirty rows are being saved.
    pub fn is_saving(&self) -> bool {
        self.inner.saving.load(Ordering::Acquire)
    }

    /// Returns `true` while rows are being deleted.
    pub fn is_deleting(&self) -> bool {
        self.inner.deleting.load(Ordering::Acquire)
    }

    /// Returns `true` while the grid shows the whole dataset.
    pub fn is_full_dataset(&self) -> bool {
        self.state().cache.is_full_dataset()
    }

    /// Returns the zero-based index of the current page.
    pub fn page_index(&self) -> usize {
        self.state().cache.page_index()
    }

    /// Returns `true` if [`next_page`](Self::next_page) has somewhere to go.
    pub fn has_more(&self) -> bool {
        self.state().cache.next_cursor().is_some()
    }

    /// Returns the live row count: the metadata count at mount, adjusted by
    /// every confirmed add and delete since.
    pub fn row_count(&self) -> u64 {
        self.state().row_count
    }

    /// Returns the display column names of the current page.
    ///
    /// Falls back to the configured columns before the first load.
    pub fn display_columns(&self) -> Vec<String> {
        let state = self.state();
        match state.cache.current() {
            Some(page) if !page.display_columns().is_empty() => page.display_columns().to_vec(),
            _ => state.mapper.columns().iter().map(|c| c.name.clone()).collect(),
        }
    }

    /// Drains the queued notices, oldest first.
    pub fn take_notices(&self) -> Vec<Notice> {
        std::mem::take(&mut self.state().notices)
    }

    // =========================================================================
    // Overlay inspection
    // =========================================================================

    /// Returns the rows to show: overlay merged over the current page, then
    /// filtered by the active filters.
    pub fn display_rows(&self) -> Vec<Row> {
        let state = self.state();
        let current = state.cache.current();
        let merged = state.overlay.merge_for_display(current.as_deref());
        state.active_filters.apply(merged)
    }

    /// Returns the rows added locally, oldest first.
    pub fn new_rows(&self) -> Vec<Row> {
        self.state().overlay.new_rows().cloned().collect()
    }

    /// Returns the ids of rows added locally, oldest first.
    pub fn new_row_ids(&self) -> Vec<String> {
        self.state()
            .overlay
            .new_row_ids()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Returns the ids deleted locally.
    pub fn deleted_row_ids(&self) -> Vec<String> {
        self.state().overlay.deleted_ids().to_vec()
    }

    /// Returns the ids with unsaved edits.
    pub fn dirty_ids(&self) -> Vec<String> {
        self.state().overlay.dirty_ids()
    }

    /// Returns the confirmation state of a locally added row.
    pub fn entry_state(&self, row_id: &str) -> Option<EntryState> {
        self.state().overlay.state(row_id)
    }

    /// Returns the overlay state as it would be persisted now.
    pub fn snapshot(&self) -> OverlaySnapshot {
        self.state().overlay.snapshot()
    }

    // =========================================================================
    // Row identity
    // =========================================================================

    /// Resolves a visible row id to the identifier writes must use.
    ///
    /// Never fails: without a record or a local row the visible id is
    /// returned as [`DurableId::Visible`] and a warning is logged.
    pub fn resolve(&self, row_id: &str) -> DurableId {
        resolve_in(&self.state(), row_id)
    }

    /// Returns the durable id of a row, or `None` if only the visible id is
    /// known.
    pub fn resolve_original_id(&self, row_id: &str) -> Option<String> {
        self.resolve(row_id).resolved().map(str::to_string)
    }

    /// Returns how a row is addressed, if the grid knows it.
    pub fn row_id(&self, row_id: &str) -> Option<RowId> {
        let state = self.state();
        if state.overlay.contains(row_id) {
            return Some(RowId::Local(row_id.to_string()));
        }
        state
            .cache
            .pages()
            .find(|p| p.contains(row_id))
            .map(|p| p.row_id(row_id))
    }

    // =========================================================================
    // Filters
    // =========================================================================

    /// Records filter input for a column. Takes effect after
    /// [`settle_filters`](Self::settle_filters) or
    /// [`apply_filters_now`](Self::apply_filters_now).
    ///
    /// Returns `false` for columns configured as not filterable.
    pub fn set_filter(&self, column: &str, query: &str) -> bool {
        if !self.state().mapper.is_filterable(column) {
            log::debug!("Ignoring filter on non-filterable column '{column}'");
            return false;
        }
        self.inner.filters.update(|filters| {
            filters.set(column, query);
        });
        true
    }

    /// Clears every filter input.
    pub fn clear_filters(&self) {
        self.inner.filters.update(FilterSet::clear);
    }

    /// Returns `true` while filter input is waiting out the debounce delay.
    pub fn is_filter_pending(&self) -> bool {
        self.inner.filters.is_pending()
    }

    /// Waits until filter input has been quiet for the debounce delay, then
    /// activates it.
    pub async fn settle_filters(&self) -> FilterSet {
        let filters = self.inner.filters.settle().await;
        self.activate_filters(filters)
    }

    /// Activates the latest filter input without waiting.
    pub fn apply_filters_now(&self) -> FilterSet {
        self.activate_filters(self.inner.filters.latest())
    }

    fn activate_filters(&self, filters: FilterSet) -> FilterSet {
        let mut state = self.state();
        if state.active_filters != filters {
            log::debug!("Activating {} column filter(s)", filters.len());
            state.active_filters = filters.clone();
        }
        filters
    }

    /// Returns the filters currently applied to [`display_rows`](Self::display_rows).
    pub fn active_filters(&self) -> FilterSet {
        self.state().active_filters.clone()
    }

    // =========================================================================
    // Shared plumbing
    // =========================================================================

    /// Runs a remote call under the configured timeout.
    async fn remote_call<T>(&self, call: impl Future<Output = Result<T, Error>>) -> Result<T, Error> {
        let timeout = self.inner.config.request_timeout;
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Timeout(timeout).into()),
        }
    }

    /// Logs a failure and queues a notice for it.
    fn notify_failure(&self, kind: OperationKind, error: &Error) {
        log::warn!("{kind} failed for table '{}': {error}", self.table_id());
        self.state().notices.push(Notice::failure(kind, error));
    }

    /// Writes the current overlay snapshot.
    ///
    /// Writes are serialised and each one reads the overlay when it starts,
    /// so the last write always carries the latest state. Failures are
    /// reported as notices; the in-memory overlay stays authoritative.
    async fn persist(&self) {
        let _guard = self.inner.persist_lock.lock().await;
        let snapshot = self.state().overlay.snapshot();
        if let Err(e) = self.inner.store.save(self.table_id(), &snapshot).await {
            self.notify_failure(OperationKind::Persist, &Error::from(e));
        }
    }

    /// Writes the live row count to the metadata record.
    ///
    /// Side channel only: failures become notices and never fail the
    /// mutation that triggered the write.
    async fn sync_metadata(&self) {
        let _guard = self.inner.metadata_lock.lock().await;
        let metadata = TableMetadata::new(self.state().row_count);
        let call = self.inner.remote.put_metadata(self.table_id(), &metadata);
        if let Err(e) = self.remote_call(call).await {
            self.notify_failure(OperationKind::Metadata, &e);
        }
    }
}

impl std::fmt::Debug for KnowledgeGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeGrid")
            .field("table_id", &self.inner.config.table_id)
            .finish_non_exhaustive()
    }
}

fn resolve_in(state: &GridState, row_id: &str) -> DurableId {
    if let Some(original_id) = state.cache.original_id(row_id) {
        return DurableId::Record(original_id);
    }
    if let Some((_, Some(original_id))) = state.overlay.server_edit(row_id) {
        return DurableId::Record(original_id.to_string());
    }
    if state.overlay.contains(row_id) {
        return DurableId::Local(row_id.to_string());
    }
    log::warn!("No durable id known for row '{row_id}', using the visible id");
    DurableId::Visible(row_id.to_string())
}

fn unique_ids<I, S>(ids: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    ids.into_iter()
        .map(Into::into)
        .filter(|id| seen.insert(id.clone()))
        .collect()
}
