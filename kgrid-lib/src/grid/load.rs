//! Page loading and navigation

use std::sync::Arc;

use super::FailedLoad;
use super::KnowledgeGrid;
use super::Notice;
use super::OperationKind;
use super::flags::LoadingGuard;
use crate::error::Error;
use crate::overlay::Overlay;
use crate::overlay::ReconcileReport;
use crate::page::Cursor;
use crate::page::Page;
use crate::page::PageKey;
use crate::response::Response;

impl KnowledgeGrid {
    /// Restores the persisted overlay, reads the table metadata and loads
    /// the first page.
    ///
    /// A missing or unreadable snapshot and a failed metadata read are
    /// reported as notices; only the first page load can fail the mount.
    pub async fn mount(&self) -> Result<Response<Arc<Page>>, Error> {
        self.restore().await;
        self.load_row_count().await;
        self.reload().await
    }

    async fn restore(&self) {
        match self.inner.store.load(self.table_id()).await {
            Ok(Some(snapshot)) => {
                log::debug!(
                    "Restored {} pending row(s) and {} deletion(s) for table '{}'",
                    snapshot.new_rows.len(),
                    snapshot.deleted_row_ids.len(),
                    self.table_id()
                );
                self.state().overlay = Overlay::from_snapshot(snapshot);
            }
            Ok(None) => {}
            Err(e) => self.notify_failure(OperationKind::Restore, &Error::from(e)),
        }
    }

    async fn load_row_count(&self) {
        let call = self.inner.remote.metadata(self.table_id());
        match self.remote_call(call).await {
            Ok(Some(metadata)) => self.state().row_count = metadata.row_count,
            Ok(None) => log::debug!("Table '{}' has no metadata record", self.table_id()),
            Err(e) => self.notify_failure(OperationKind::Metadata, &e),
        }
    }

    // =========================================================================
    // Cursor pages
    // =========================================================================

    /// Returns the page at `cursor` fetched with `limit` rows.
    ///
    /// Pages are cached for the session by `(cursor, limit)`: a repeated call
    /// returns the same `Arc<Page>` without a remote call. Concurrent calls
    /// for the same page share one remote call.
    ///
    /// This does not move the grid's position; see
    /// [`next_page`](Self::next_page) and [`prev_page`](Self::prev_page).
    pub async fn fetch_page(
        &self,
        cursor: Option<Cursor>,
        limit: usize,
    ) -> Result<Response<Arc<Page>>, Error> {
        let result = self.fetch(cursor.clone(), limit).await;
        self.finish_load(result, FailedLoad::Fetch { cursor, limit })
    }

    /// Moves to the next page, fetching it unless it was visited before.
    ///
    /// Returns `None` without any change when there is no next page.
    pub async fn next_page(&self) -> Result<Option<Response<Arc<Page>>>, Error> {
        let result = self.advance().await;
        self.finish_load(result, FailedLoad::Next)
    }

    /// Moves to the previous page. Always served from cache.
    ///
    /// Returns `None` on the first page and in full-dataset mode.
    pub fn prev_page(&self) -> Option<Response<Arc<Page>>> {
        let mut state = self.state();
        if !state.cache.retreat() {
            return None;
        }
        let cached = state.cache.current_entry()?;
        Some(Response::cache_hit(cached.page.clone(), cached.cached_at))
    }

    /// Loads the whole table in one request and switches to full-dataset
    /// mode until [`reload`](Self::reload).
    ///
    /// The limit is the known row count, or the configured fallback when the
    /// count is unknown.
    pub async fn show_all(&self) -> Result<Response<Arc<Page>>, Error> {
        let result = self.load_full_dataset().await;
        self.finish_load(result, FailedLoad::ShowAll)
    }

    /// Drops the page cache and loads the first page again.
    ///
    /// The cache is replaced only once the new first page arrived.
    pub async fn reload(&self) -> Result<Response<Arc<Page>>, Error> {
        let result = self.load_first_page().await;
        self.finish_load(result, FailedLoad::Reload)
    }

    /// Loads the whole table and reconciles the overlay against it.
    ///
    /// Rows the server now returns leave the overlay, deletions the server
    /// no longer knows are forgotten, held edits of rows the server dropped
    /// are discarded, and the grid ends in full-dataset mode.
    /// If the load came back truncated it is not authoritative: rows it
    /// contains are confirmed but nothing is evicted.
    pub async fn refresh(&self) -> Result<ReconcileReport, Error> {
        let result = self.reconcile().await;
        self.finish_load(result, FailedLoad::Refresh)
    }

    /// Repeats the last failed load. Returns `false` if nothing failed.
    pub async fn retry(&self) -> Result<bool, Error> {
        let Some(failed) = self.state().failed_load.clone() else {
            return Ok(false);
        };
        log::debug!("Retrying failed load {failed:?}");
        match failed {
            FailedLoad::Fetch { cursor, limit } => {
                self.fetch_page(cursor, limit).await?;
            }
            FailedLoad::Next => {
                self.next_page().await?;
            }
            FailedLoad::ShowAll => {
                self.show_all().await?;
            }
            FailedLoad::Reload => {
                self.reload().await?;
            }
            FailedLoad::Refresh => {
                self.refresh().await?;
            }
        }
        Ok(true)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn finish_load<T>(&self, result: Result<T, Error>, load: FailedLoad) -> Result<T, Error> {
        match &result {
            Ok(_) => {
                let mut state = self.state();
                if state.failed_load.as_ref() == Some(&load) {
                    state.failed_load = None;
                }
            }
            Err(Error::InvalidPageSize) => {}
            Err(e) => {
                self.notify_failure(OperationKind::Load, e);
                self.state().failed_load = Some(load);
            }
        }
        result
    }

    fn cached(&self, key: &PageKey) -> Option<Response<Arc<Page>>> {
        let state = self.state();
        let cached = state.cache.get(key)?;
        log::debug!("Page cache hit at {:?} (limit {})", key.cursor, key.limit);
        Some(Response::cache_hit(cached.page.clone(), cached.cached_at))
    }

    async fn fetch(&self, cursor: Option<Cursor>, limit: usize) -> Result<Response<Arc<Page>>, Error> {
        if limit == 0 {
            return Err(Error::InvalidPageSize);
        }
        let key = PageKey::new(cursor, limit);
        if let Some(hit) = self.cached(&key) {
            return Ok(hit);
        }

        let _fetching = self.inner.fetch_locks.lock_all([fetch_lock_key(&key)]).await;
        if let Some(hit) = self.cached(&key) {
            return Ok(hit);
        }

        let page = self.scroll(key.cursor.clone(), limit).await?;
        let (cached, confirmed) = {
            let mut state = self.state();
            let confirmed = state.overlay.observe(&page);
            (state.cache.insert(key, page), !confirmed.is_empty())
        };
        if confirmed {
            self.persist().await;
        }
        Ok(Response::cache_miss(cached.page, cached.cached_at))
    }

    async fn advance(&self) -> Result<Option<Response<Arc<Page>>>, Error> {
        let (cursor, limit) = {
            let state = self.state();
            (state.cache.next_cursor(), state.cache.page_size())
        };
        let Some(cursor) = cursor else {
            return Ok(None);
        };

        let response = self.fetch(Some(cursor.clone()), limit).await?;
        let mut state = self.state();
        if state.cache.next_cursor().as_ref() == Some(&cursor) {
            state.cache.advance(cursor);
        }
        Ok(Some(response))
    }

    async fn scroll(&self, cursor: Option<Cursor>, limit: usize) -> Result<Page, Error> {
        let _loading = LoadingGuard::new(&self.inner.loading);
        log::debug!("Fetching page at {cursor:?} (limit {limit})");

        let call = self
            .inner
            .remote
            .scroll(&self.inner.config.source, cursor.as_ref(), limit);
        let scroll = self.remote_call(call).await?;
        Ok(scroll.into_page(cursor, &self.state().mapper)?)
    }

    async fn load_first_page(&self) -> Result<Response<Arc<Page>>, Error> {
        let limit = self.inner.config.page_size;
        if limit == 0 {
            return Err(Error::InvalidPageSize);
        }

        let page = self.scroll(None, limit).await?;
        let (cached, confirmed) = {
            let mut state = self.state();
            state.cache.reset(limit);
            state.cache.start();
            let confirmed = state.overlay.observe(&page);
            (
                state.cache.insert(PageKey::new(None, limit), page),
                !confirmed.is_empty(),
            )
        };
        if confirmed {
            self.persist().await;
        }
        Ok(Response::cache_miss(cached.page, cached.cached_at))
    }

    fn full_load_limit(&self) -> usize {
        let known = self.state().row_count;
        match usize::try_from(known) {
            Ok(count) if count > 0 => count,
            _ => self.inner.config.show_all_fallback_limit,
        }
    }

    async fn load_full_dataset(&self) -> Result<Response<Arc<Page>>, Error> {
        let limit = self.full_load_limit();
        if limit == 0 {
            return Err(Error::InvalidPageSize);
        }

        let page = self.scroll(None, limit).await?;
        let (cached, confirmed) = {
            let mut state = self.state();
            if page.has_more() {
                let message = format!(
                    "Showing the first {} rows only; the table holds more than its row count says",
                    page.len()
                );
                log::warn!("Full load of table '{}' stopped at {} rows", self.table_id(), page.len());
                state.notices.push(Notice::new(OperationKind::Load, message));
            }
            let confirmed = state.overlay.observe(&page);
            (state.cache.enter_full_dataset(page), !confirmed.is_empty())
        };
        if confirmed {
            self.persist().await;
        }
        Ok(Response::cache_miss(cached.page, cached.cached_at))
    }

    async fn reconcile(&self) -> Result<ReconcileReport, Error> {
        let limit = self.full_load_limit();
        if limit == 0 {
            return Err(Error::InvalidPageSize);
        }

        let page = self.scroll(None, limit).await?;
        let report = {
            let mut state = self.state();
            let report = if page.has_more() {
                log::warn!(
                    "Full load of table '{}' stopped at {} rows; skipping eviction",
                    self.table_id(),
                    page.len()
                );
                ReconcileReport {
                    confirmed: state.overlay.observe(&page),
                    ..Default::default()
                }
            } else {
                state.row_count = page.len() as u64;
                let report = state.overlay.reconcile_authoritative(&page);
                if !report.discarded.is_empty() {
                    let message = format!(
                        "{} edited row(s) no longer exist on the server; their edits were dropped",
                        report.discarded.len()
                    );
                    state.notices.push(Notice::new(OperationKind::Save, message));
                }
                report
            };
            state.cache.reset(self.inner.config.page_size);
            state.cache.enter_full_dataset(page);
            report
        };
        self.persist().await;
        Ok(report)
    }
}

fn fetch_lock_key(key: &PageKey) -> String {
    match &key.cursor {
        Some(cursor) => format!("at:{cursor}:{}", key.limit),
        None => format!("first:{}", key.limit),
    }
}
