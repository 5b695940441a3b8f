//! Row Editor: staged edits and committing them to the store.
//!
//! An edit moves through these states:
//!
//! ```text
//!   Clean ──stage──▶ Staged ──commit──▶ Clean (table updated)
//!                     │  ▲
//!                     │  └── stage / improvement (overwrite)
//!                     └──discard──▶ Clean (table untouched)
//! ```
//!
//! Staging never touches the table. A commit validates every staged field
//! of the row before writing any of them, so a row is either fully applied
//! or left staged as it was.

use std::collections::BTreeMap;

use crate::error::{CommitErrors, EditorError, Result};
use crate::models::RowId;
use crate::store::DatasetStore;

#[derive(Debug, Default)]
pub struct RowEditor {
    pending: BTreeMap<RowId, BTreeMap<String, String>>,
}

impl RowEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or overwrite) a pending value for `field` of row `id`.
    pub fn stage(&mut self, id: RowId, field: impl Into<String>, value: impl Into<String>) {
        self.pending
            .entry(id)
            .or_default()
            .insert(field.into(), value.into());
    }

    pub fn pending(&self, id: RowId) -> Option<&BTreeMap<String, String>> {
        self.pending.get(&id)
    }

    pub fn pending_value(&self, id: RowId, field: &str) -> Option<&str> {
        self.pending
            .get(&id)
            .and_then(|fields| fields.get(field))
            .map(String::as_str)
    }

    pub fn is_staged(&self, id: RowId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn staged_ids(&self) -> Vec<RowId> {
        self.pending.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop the staged edits of `id`. Returns whether anything was staged.
    pub fn discard(&mut self, id: RowId) -> bool {
        self.pending.remove(&id).is_some()
    }

    /// Drop staged edits of every row for which `pred` holds.
    pub fn discard_where(&mut self, mut pred: impl FnMut(RowId) -> bool) -> Vec<RowId> {
        let doomed: Vec<RowId> = self.pending.keys().copied().filter(|id| pred(*id)).collect();
        for id in &doomed {
            self.pending.remove(id);
        }
        doomed
    }

    /// Write the staged edits of `id` into the store and clear them.
    ///
    /// `NotFound` if nothing is staged for `id`. If any staged field is
    /// rejected by the store, nothing is written and the edits stay staged.
    pub fn commit(&mut self, store: &mut DatasetStore, id: RowId) -> Result<()> {
        let fields = self
            .pending
            .get(&id)
            .ok_or_else(|| EditorError::NotFound(format!("no staged edit for row {}", id)))?;

        for field in fields.keys() {
            store.check_field(id, field)?;
        }

        let fields = self.pending.remove(&id).unwrap_or_default();
        for (field, value) in fields {
            store.set_field(id, &field, value)?;
        }
        log::debug!("committed staged edit for row {}", id);
        Ok(())
    }

    /// Commit each of `ids`, carrying on past failures.
    ///
    /// Returns the committed ids, or every failure together when at least
    /// one row could not be committed; the rows that succeeded stay
    /// committed either way.
    pub fn commit_all(
        &mut self,
        store: &mut DatasetStore,
        ids: &[RowId],
    ) -> std::result::Result<Vec<RowId>, CommitErrors> {
        let mut committed = Vec::with_capacity(ids.len());
        let mut errors = CommitErrors::default();

        for &id in ids {
            match self.commit(store, id) {
                Ok(()) => committed.push(id),
                Err(e) => {
                    log::warn!("could not commit row {}: {}", id, e);
                    errors.push(id, e);
                }
            }
        }

        log::info!(
            "committed {} of {} staged row(s)",
            committed.len(),
            ids.len()
        );
        if errors.is_empty() {
            Ok(committed)
        } else {
            Err(errors)
        }
    }
}
