//! Row mutations
//!
//! Every mutation that touches the server runs the remote call first and
//! changes local state only after it succeeded. Adds reveal the row only
//! once it is stored remotely; deletes hide rows only once the server
//! dropped them.

use std::collections::HashMap;
use std::collections::HashSet;

use uuid::Uuid;

use super::KnowledgeGrid;
use super::OperationKind;
use super::flags::BusyGuard;
use super::resolve_in;
use super::unique_ids;
use crate::error::Error;
use crate::model::Row;
use crate::model::Value;
use crate::remote::Point;

impl KnowledgeGrid {
    /// Adds a row with a generated id and returns the id.
    pub async fn add_row(&self, fields: HashMap<String, Value>) -> Result<String, Error> {
        self.insert_row(Row::with_fields(Uuid::new_v4().to_string(), fields))
            .await
    }

    /// Adds a prepared row and returns its id.
    ///
    /// A row with an empty id gets a generated one. The row is upserted
    /// remotely first; only then does it appear in the overlay as pending,
    /// the row count grow and the metadata record follow.
    pub async fn insert_row(&self, row: Row) -> Result<String, Error> {
        let _busy = BusyGuard::acquire(&self.inner.adding_row, OperationKind::AddRow)?;

        let row = if row.id().is_empty() {
            let (_, fields) = row.into_parts();
            Row::with_fields(Uuid::new_v4().to_string(), fields)
        } else {
            row
        };
        let id = row.id().to_string();
        let _lock = self.inner.row_locks.lock_all([id.clone()]).await;

        let point = Point::new(
            id.clone(),
            self.table_id(),
            self.state().mapper.to_backend(row.fields()),
        );
        let call = self.inner.remote.upsert(self.table_id(), vec![point]);
        if let Err(e) = self.remote_call(call).await {
            self.notify_failure(OperationKind::AddRow, &e);
            return Err(e);
        }

        {
            let mut state = self.state();
            state.overlay.add(row);
            state.row_count = state.row_count.saturating_add(1);
        }
        log::debug!("Added row '{id}' to table '{}'", self.table_id());

        self.persist().await;
        self.sync_metadata().await;
        Ok(id)
    }

    /// Merges `patch` into a row. No remote call is made.
    ///
    /// Local rows are patched in the overlay. Server rows are patched on
    /// every cached page holding them, and the edited row is also held in the
    /// overlay so a reload or a full load cannot lose it. Either way the id
    /// becomes dirty until the next successful [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// [`Error::RowLocked`] while a save or delete holds the row, and
    /// [`Error::UnknownRow`] if no added row or cached page has it.
    pub async fn edit_row(&self, row_id: &str, patch: HashMap<String, Value>) -> Result<(), Error> {
        let Some(_lock) = self.inner.row_locks.try_lock_all([row_id]) else {
            return Err(Error::RowLocked(row_id.to_string()));
        };

        {
            let mut state = self.state();
            if state.overlay.is_deleted(row_id) {
                return Err(Error::UnknownRow(row_id.to_string()));
            }
            if state.overlay.patch(row_id, &patch) {
                state.overlay.mark_dirty(row_id);
            } else if state.overlay.patch_server_edit(row_id, &patch) {
                state.cache.patch_row(row_id, &patch);
            } else {
                let Some((row, _)) = state.cache.find_row(row_id) else {
                    return Err(Error::UnknownRow(row_id.to_string()));
                };
                let durable_id = state.cache.original_id(row_id);
                state.cache.patch_row(row_id, &patch);
                state.overlay.record_server_edit(row.patched(&patch), durable_id);
            }
        }
        log::debug!("Edited row '{row_id}'");

        self.persist().await;
        Ok(())
    }

    /// Upserts every dirty row in one batch and returns the saved ids.
    ///
    /// Rows are written under their durable ids. On success exactly the
    /// saved ids leave the dirty set and saved server rows keep their new
    /// values on cached pages; on failure nothing changes.
    pub async fn save(&self) -> Result<Vec<String>, Error> {
        let _busy = BusyGuard::acquire(&self.inner.saving, OperationKind::Save)?;

        let dirty = self.state().overlay.dirty_ids();
        if dirty.is_empty() {
            return Ok(Vec::new());
        }
        let _locks = self.inner.row_locks.lock_all(dirty.iter().cloned()).await;

        let (saved, points, vanished, edited) = {
            let state = self.state();
            let mut saved = Vec::new();
            let mut points = Vec::new();
            let mut vanished = Vec::new();
            let mut edited = Vec::new();
            for id in dirty {
                let row = if let Some(row) = state.overlay.row(&id) {
                    row.clone()
                } else if let Some((row, _)) = state.overlay.server_edit(&id) {
                    edited.push(row.clone());
                    row.clone()
                } else {
                    vanished.push(id);
                    continue;
                };
                points.push(Point::new(
                    resolve_in(&state, &id).into_string(),
                    self.table_id(),
                    state.mapper.to_backend(row.fields()),
                ));
                saved.push(id);
            }
            (saved, points, vanished, edited)
        };

        if !vanished.is_empty() {
            log::warn!("Dropping edits of rows no longer loaded: {vanished:?}");
        }

        if !points.is_empty() {
            let call = self.inner.remote.upsert(self.table_id(), points);
            if let Err(e) = self.remote_call(call).await {
                self.notify_failure(OperationKind::Save, &e);
                return Err(e);
            }
        }

        {
            let mut state = self.state();
            for row in &edited {
                state.cache.patch_row(row.id(), row.fields());
            }
            state
                .overlay
                .clear_dirty(saved.iter().chain(&vanished).map(String::as_str));
        }
        log::debug!("Saved {} row(s) of table '{}'", saved.len(), self.table_id());

        self.persist().await;
        Ok(saved)
    }

    /// Deletes rows in one batch and returns how many were deleted.
    ///
    /// Visible ids are resolved to durable ids for the remote call. Only
    /// after it succeeded are the ids recorded as deleted, dropped from the
    /// added and dirty sets and from every cached page. The row count and
    /// metadata record are lowered by the ids that were actually loaded;
    /// ids never seen locally do not move the count.
    pub async fn delete_rows<I, S>(&self, ids: I) -> Result<usize, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let _busy = BusyGuard::acquire(&self.inner.deleting, OperationKind::Delete)?;

        let ids = unique_ids(ids);
        if ids.is_empty() {
            return Ok(0);
        }
        let _locks = self.inner.row_locks.lock_all(ids.iter().cloned()).await;

        let (durable, known) = {
            let state = self.state();
            let durable: Vec<String> = ids
                .iter()
                .map(|id| resolve_in(&state, id).into_string())
                .collect();
            let known = ids
                .iter()
                .filter(|id| {
                    state.overlay.contains(id)
                        || state.overlay.server_edit(id).is_some()
                        || state.cache.pages().any(|p| p.contains(id))
                })
                .count();
            (durable, known)
        };

        let call = self.inner.remote.delete(self.table_id(), durable.clone());
        if let Err(e) = self.remote_call(call).await {
            self.notify_failure(OperationKind::Delete, &e);
            return Err(e);
        }

        let count = ids.len();
        {
            let mut state = self.state();
            let gone: HashSet<String> = ids.iter().cloned().chain(durable).collect();
            state.overlay.mark_deleted(ids);
            let pages = state.cache.remove_rows(&gone);
            state.row_count = state.row_count.saturating_sub(known as u64);
            log::debug!("Deleted {count} row(s), {pages} cached page(s) updated");
        }
        if known < count {
            log::debug!("{} deleted id(s) were not loaded; row count left alone", count - known);
        }

        self.persist().await;
        if known > 0 {
            self.sync_metadata().await;
        }
        Ok(count)
    }
}
