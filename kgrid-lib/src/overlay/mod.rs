//! Local row changes layered over server pages.
//!
//! The [`Overlay`] holds rows added this session (or restored from a
//! snapshot), the ids deleted locally, the ids edited since the last save
//! and the edited copies of server rows.
//! It never talks to the network; the grid applies a change here only after
//! the remote call it depends on has succeeded.
//!
//! Added rows move through a small state machine:
//!
//! - `Pending`: written remotely, not yet seen in any page. Persisted.
//! - `Confirmed`: seen in a fetched page. Kept for display ordering but no
//!   longer persisted unless dirty.
//! - evicted: an authoritative refresh contained the row, so the server copy
//!   replaces it.

mod locks;

pub use locks::*;

use std::collections::HashMap;
use std::collections::HashSet;

use crate::model::Row;
use crate::model::Value;
use crate::page::Page;
use crate::store::OverlaySnapshot;

/// Confirmation state of an added row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Not yet seen in a server page.
    Pending,
    /// Seen in a server page.
    Confirmed,
}

#[derive(Debug, Clone)]
struct Entry {
    row: Row,
    state: EntryState,
}

/// Edited copy of a server row, held until it is saved.
#[derive(Debug, Clone)]
struct ServerEdit {
    row: Row,
    durable_id: Option<String>,
}

/// Outcome of reconciling against an authoritative full load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Added rows the load contained that stay in the overlay, now
    /// confirmed.
    pub confirmed: Vec<String>,
    /// Added rows dropped because the server copy now stands in for them.
    pub evicted: Vec<String>,
    /// Deleted ids the server no longer returns.
    pub forgotten: Vec<String>,
    /// Edited server rows the load no longer contains; their edits are gone.
    pub discarded: Vec<String>,
}

impl ReconcileReport {
    /// Returns `true` if reconciliation changed nothing.
    pub fn is_empty(&self) -> bool {
        self.confirmed.is_empty()
            && self.evicted.is_empty()
            && self.forgotten.is_empty()
            && self.discarded.is_empty()
    }
}

/// Added rows, deleted ids and dirty ids for one table.
///
/// # Invariants
///
/// - every id in [`new_row_ids`](Self::new_row_ids) belongs to exactly one
///   added row
/// - a deleted id is never an added row and never shows up in
///   [`merge_for_display`](Self::merge_for_display)
/// - every edited server row is dirty; its edit lives here, not in the page
///   cache, so replacing cached pages never loses it
#[derive(Debug, Clone, Default)]
pub struct Overlay {
    entries: Vec<Entry>,
    deleted: Vec<String>,
    deleted_set: HashSet<String>,
    dirty: HashSet<String>,
    edits: HashMap<String, ServerEdit>,
}

impl Overlay {
    /// Creates an empty overlay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores an overlay from a persisted snapshot.
    ///
    /// Restored rows start out `Pending`. Rows listed in `deletedRowIds` are
    /// dropped, and so is any `newRowIds` entry without a matching row.
    pub fn from_snapshot(snapshot: OverlaySnapshot) -> Self {
        let mut overlay = Self::new();
        for id in snapshot.deleted_row_ids {
            overlay.push_deleted(id);
        }
        let listed: HashSet<String> = snapshot.new_row_ids.into_iter().collect();
        for row in snapshot.new_rows {
            if !listed.contains(row.id()) {
                log::warn!("Dropping snapshot row '{}' missing from newRowIds", row.id());
                continue;
            }
            if overlay.deleted_set.contains(row.id()) || overlay.contains(row.id()) {
                continue;
            }
            overlay.entries.push(Entry {
                row,
                state: EntryState::Pending,
            });
        }
        overlay
    }

    /// Returns the state that must survive a reload.
    ///
    /// Confirmed rows are left out unless they carry unsaved edits.
    pub fn snapshot(&self) -> OverlaySnapshot {
        let persisted: Vec<&Entry> = self
            .entries
            .iter()
            .filter(|e| e.state == EntryState::Pending || self.dirty.contains(e.row.id()))
            .collect();
        OverlaySnapshot {
            new_row_ids: persisted.iter().map(|e| e.row.id().to_string()).collect(),
            new_rows: persisted.into_iter().map(|e| e.row.clone()).collect(),
            deleted_row_ids: self.deleted.clone(),
        }
    }

    /// Returns `true` if nothing is added, deleted or dirty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.deleted.is_empty() && self.dirty.is_empty()
    }

    /// Returns the added rows, oldest first.
    pub fn new_rows(&self) -> impl Iterator<Item = &Row> {
        self.entries.iter().map(|e| &e.row)
    }

    /// Returns the ids of the added rows, oldest first.
    pub fn new_row_ids(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.row.id()).collect()
    }

    /// Returns the locally deleted ids, in deletion order.
    pub fn deleted_ids(&self) -> &[String] {
        &self.deleted
    }

    /// Returns the ids edited since the last successful save.
    pub fn dirty_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.dirty.iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Returns `true` if `id` is an added row.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|e| e.row.id() == id)
    }

    /// Returns the added row with this id.
    pub fn row(&self, id: &str) -> Option<&Row> {
        self.entries.iter().find(|e| e.row.id() == id).map(|e| &e.row)
    }

    /// Returns the confirmation state of an added row.
    pub fn state(&self, id: &str) -> Option<EntryState> {
        self.entries.iter().find(|e| e.row.id() == id).map(|e| e.state)
    }

    /// Returns `true` if `id` was deleted locally.
    pub fn is_deleted(&self, id: &str) -> bool {
        self.deleted_set.contains(id)
    }

    /// Returns `true` if `id` has unsaved edits.
    pub fn is_dirty(&self, id: &str) -> bool {
        self.dirty.contains(id)
    }

    /// Returns the edited copy of a server row and the durable id recorded
    /// when it was first edited.
    pub fn server_edit(&self, id: &str) -> Option<(&Row, Option<&str>)> {
        self.edits
            .get(id)
            .map(|e| (&e.row, e.durable_id.as_deref()))
    }

    /// Appends an added row as `Pending`.
    ///
    /// An existing row with the same id is replaced in place. Adding an id
    /// that was deleted before revives it.
    pub fn add(&mut self, row: Row) {
        let id = row.id().to_string();
        if self.deleted_set.remove(&id) {
            self.deleted.retain(|d| d != &id);
        }
        match self.entries.iter_mut().find(|e| e.row.id() == id) {
            Some(entry) => {
                entry.row = row;
                entry.state = EntryState::Pending;
            }
            None => self.entries.push(Entry {
                row,
                state: EntryState::Pending,
            }),
        }
        log::debug!("Overlay row '{id}' added as pending");
    }

    /// Merges `patch` into an added row. Returns `false` if `id` is not one.
    pub fn patch(&mut self, id: &str, patch: &HashMap<String, Value>) -> bool {
        let Some(entry) = self.entries.iter_mut().find(|e| e.row.id() == id) else {
            return false;
        };
        entry.row = entry.row.patched(patch);
        true
    }

    /// Merges `patch` into a server row edited before. Returns `false` if
    /// `id` has no held edit.
    pub fn patch_server_edit(&mut self, id: &str, patch: &HashMap<String, Value>) -> bool {
        let Some(edit) = self.edits.get_mut(id) else {
            return false;
        };
        edit.row = edit.row.patched(patch);
        self.dirty.insert(id.to_string());
        true
    }

    /// Holds the edited copy of a server row and marks it dirty.
    pub fn record_server_edit(&mut self, row: Row, durable_id: Option<String>) {
        let id = row.id().to_string();
        log::debug!("Holding edit of server row '{id}'");
        self.dirty.insert(id.clone());
        self.edits.insert(id, ServerEdit { row, durable_id });
    }

    /// Records that `id` has unsaved edits.
    pub fn mark_dirty(&mut self, id: impl Into<String>) {
        self.dirty.insert(id.into());
    }

    /// Clears the dirty flag of the given ids and releases their held edits.
    pub fn clear_dirty<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>) {
        for id in ids {
            self.dirty.remove(id);
            self.edits.remove(id);
        }
    }

    /// Records ids as deleted and drops them from the added and dirty sets.
    pub fn mark_deleted<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for id in ids {
            let id = id.into();
            self.entries.retain(|e| e.row.id() != id);
            self.dirty.remove(&id);
            self.edits.remove(&id);
            self.push_deleted(id);
        }
    }

    fn push_deleted(&mut self, id: String) {
        if self.deleted_set.insert(id.clone()) {
            self.deleted.push(id);
        }
    }

    /// Combines the overlay with a server page into the rows to display.
    ///
    /// Added rows come first, most recent first. Server rows follow in page
    /// order, minus deleted rows and minus rows an added row already
    /// represents (same row id or same durable id). A server row with a held
    /// edit is shown as edited.
    pub fn merge_for_display(&self, base: Option<&Page>) -> Vec<Row> {
        let mut rows: Vec<Row> = self
            .entries
            .iter()
            .rev()
            .filter(|e| !self.deleted_set.contains(e.row.id()))
            .map(|e| e.row.clone())
            .collect();

        let Some(page) = base else {
            return rows;
        };
        let represented: HashSet<&str> = self.entries.iter().map(|e| e.row.id()).collect();
        let hidden = |id: &str| self.deleted_set.contains(id) || represented.contains(id);

        rows.extend(
            page.rows()
                .iter()
                .filter(|r| !hidden(r.id()))
                .filter(|r| !page.original_id(r.id()).is_some_and(&hidden))
                .map(|r| match self.edits.get(r.id()) {
                    Some(edit) => edit.row.clone(),
                    None => r.clone(),
                }),
        );
        rows
    }

    /// Marks pending rows contained in `page` as confirmed.
    ///
    /// Returns the ids that changed state.
    pub fn observe(&mut self, page: &Page) -> Vec<String> {
        let known = page.known_ids();
        let mut confirmed = Vec::new();
        for entry in &mut self.entries {
            if entry.state == EntryState::Pending && known.contains(entry.row.id()) {
                entry.state = EntryState::Confirmed;
                confirmed.push(entry.row.id().to_string());
            }
        }
        if !confirmed.is_empty() {
            log::debug!("Overlay rows confirmed by page: {confirmed:?}");
        }
        confirmed
    }

    /// Reconciles against a page holding the whole table.
    ///
    /// Added rows the page contains are evicted, unless they have unsaved
    /// edits, in which case they are only confirmed. Added rows it lacks keep
    /// their state. Deleted ids it no longer returns are forgotten. Held
    /// edits of server rows the page no longer contains are discarded, since
    /// saving them would recreate a row deleted elsewhere.
    pub fn reconcile_authoritative(&mut self, page: &Page) -> ReconcileReport {
        let known = page.known_ids();
        let mut report = ReconcileReport::default();

        let dirty = &self.dirty;
        self.entries.retain_mut(|entry| {
            let id = entry.row.id().to_string();
            if !known.contains(id.as_str()) {
                return true;
            }
            if dirty.contains(&id) {
                entry.state = EntryState::Confirmed;
                report.confirmed.push(id);
                true
            } else {
                report.evicted.push(id);
                false
            }
        });

        let (kept, forgotten): (Vec<String>, Vec<String>) = std::mem::take(&mut self.deleted)
            .into_iter()
            .partition(|id| known.contains(id.as_str()));
        for id in &forgotten {
            self.deleted_set.remove(id);
        }
        self.deleted = kept;
        report.forgotten = forgotten;

        let mut discarded: Vec<String> = self
            .edits
            .iter()
            .filter(|(id, edit)| {
                !known.contains(id.as_str())
                    && !edit.durable_id.as_deref().is_some_and(|d| known.contains(d))
            })
            .map(|(id, _)| id.clone())
            .collect();
        discarded.sort();
        for id in &discarded {
            self.edits.remove(id);
            self.dirty.remove(id);
        }
        if !discarded.is_empty() {
            log::warn!("Discarding edits of rows the server no longer has: {discarded:?}");
        }
        report.discarded = discarded;

        log::debug!(
            "Reconciled overlay: {} confirmed, {} evicted, {} deletions forgotten",
            report.confirmed.len(),
            report.evicted.len(),
            report.forgotten.len()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawRecord;

    fn page(ids: &[&str]) -> Page {
        Page::new(None, ids.iter().map(|id| Row::new(*id)).collect())
    }

    #[test]
    fn test_merge_puts_new_rows_first_newest_first() {
        let mut overlay = Overlay::new();
        overlay.add(Row::new("tmp-1"));
        overlay.add(Row::new("tmp-2"));

        let merged = overlay.merge_for_display(Some(&page(&["q-1", "q-2"])));
        let ids: Vec<&str> = merged.iter().map(Row::id).collect();
        assert_eq!(ids, vec!["tmp-2", "tmp-1", "q-1", "q-2"]);
    }

    #[test]
    fn test_merge_hides_deleted_and_represented_rows() {
        let mut overlay = Overlay::new();
        overlay.add(Row::new("acme"));
        overlay.mark_deleted(["q-2"]);

        let base = Page::new(None, vec![Row::new("q-1"), Row::new("q-2"), Row::new("q-3")])
            .with_records(vec![
                RawRecord::new("q-1").with_original_id("acme"),
                RawRecord::new("q-2"),
                RawRecord::new("q-3"),
            ]);

        let merged = overlay.merge_for_display(Some(&base));
        let ids: Vec<&str> = merged.iter().map(Row::id).collect();
        assert_eq!(ids, vec!["acme", "q-3"]);
    }

    #[test]
    fn test_delete_removes_from_new_and_dirty() {
        let mut overlay = Overlay::new();
        overlay.add(Row::new("tmp-1"));
        overlay.mark_dirty("tmp-1");

        overlay.mark_deleted(["tmp-1"]);
        assert!(!overlay.contains("tmp-1"));
        assert!(!overlay.is_dirty("tmp-1"));
        assert!(overlay.is_deleted("tmp-1"));
        assert!(overlay.merge_for_display(None).is_empty());
    }

    #[test]
    fn test_confirmed_rows_leave_the_snapshot() {
        let mut overlay = Overlay::new();
        overlay.add(Row::new("tmp-1"));
        overlay.add(Row::new("tmp-2"));

        assert_eq!(overlay.observe(&page(&["tmp-1"])), vec!["tmp-1"]);
        assert_eq!(overlay.state("tmp-1"), Some(EntryState::Confirmed));
        assert_eq!(overlay.snapshot().new_row_ids, vec!["tmp-2"]);

        overlay.mark_dirty("tmp-1");
        assert_eq!(overlay.snapshot().new_row_ids, vec!["tmp-1", "tmp-2"]);
    }

    #[test]
    fn test_reconcile_evicts_contained_rows_and_forgets_gone_deletions() {
        let mut overlay = Overlay::new();
        overlay.add(Row::new("tmp-1"));
        overlay.add(Row::new("tmp-2"));
        overlay.mark_deleted(["q-gone", "q-still"]);
        overlay.record_server_edit(Row::new("q-9").set("Name", "kept"), None);
        overlay.record_server_edit(Row::new("q-8").set("Name", "lost"), Some("o-8".into()));

        let report = overlay.reconcile_authoritative(&page(&["tmp-1", "q-still", "q-9"]));

        assert_eq!(report.evicted, vec!["tmp-1"]);
        assert_eq!(report.forgotten, vec!["q-gone"]);
        assert_eq!(report.discarded, vec!["q-8"]);
        assert_eq!(overlay.new_row_ids(), vec!["tmp-2"]);
        assert_eq!(overlay.state("tmp-2"), Some(EntryState::Pending));
        assert_eq!(overlay.deleted_ids(), ["q-still".to_string()]);
        assert_eq!(overlay.dirty_ids(), vec!["q-9"]);
        assert!(overlay.server_edit("q-8").is_none());
    }

    #[test]
    fn test_held_edit_survives_page_replacement() {
        let mut overlay = Overlay::new();
        overlay.record_server_edit(Row::new("q-1").set("Name", "Renamed"), Some("o-1".into()));
        let patch = HashMap::from([("City".to_string(), Value::from("Oslo"))]);
        assert!(overlay.patch_server_edit("q-1", &patch));

        let fresh = Page::new(None, vec![Row::new("q-1").set("Name", "Old"), Row::new("q-2")]);
        let merged = overlay.merge_for_display(Some(&fresh));
        assert_eq!(merged[0].text("Name"), "Renamed");
        assert_eq!(merged[0].text("City"), "Oslo");

        let (row, durable) = overlay.server_edit("q-1").unwrap();
        assert_eq!(row.text("Name"), "Renamed");
        assert_eq!(durable, Some("o-1"));

        overlay.clear_dirty(["q-1"]);
        assert!(overlay.server_edit("q-1").is_none());
        assert_eq!(overlay.merge_for_display(Some(&fresh))[0].text("Name"), "Old");
    }

    #[test]
    fn test_reconcile_keeps_dirty_added_rows() {
        let mut overlay = Overlay::new();
        overlay.add(Row::new("tmp-1"));
        overlay.mark_dirty("tmp-1");

        let report = overlay.reconcile_authoritative(&page(&["tmp-1"]));
        assert_eq!(report.confirmed, vec!["tmp-1"]);
        assert!(overlay.is_dirty("tmp-1"));
        assert_eq!(overlay.state("tmp-1"), Some(EntryState::Confirmed));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut overlay = Overlay::new();
        overlay.add(Row::new("tmp-1").set("Name", "Acme"));
        overlay.mark_deleted(["q-3", "q-1"]);

        let snapshot = overlay.snapshot();
        let restored = Overlay::from_snapshot(snapshot.clone());
        assert_eq!(restored.snapshot(), snapshot);
        assert_eq!(snapshot.deleted_row_ids, vec!["q-3", "q-1"]);
    }

    #[test]
    fn test_from_snapshot_enforces_invariants() {
        let snapshot = OverlaySnapshot {
            new_rows: vec![Row::new("a"), Row::new("b"), Row::new("c")],
            new_row_ids: vec!["a".to_string(), "b".to_string()],
            deleted_row_ids: vec!["b".to_string()],
        };

        let overlay = Overlay::from_snapshot(snapshot);
        assert_eq!(overlay.new_row_ids(), vec!["a"]);
        assert!(overlay.is_deleted("b"));
    }

    #[test]
    fn test_add_revives_deleted_id() {
        let mut overlay = Overlay::new();
        overlay.mark_deleted(["tmp-1"]);
        overlay.add(Row::new("tmp-1"));

        assert!(!overlay.is_deleted("tmp-1"));
        assert!(overlay.deleted_ids().is_empty());
    }
}
