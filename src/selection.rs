//! Selection Tracker: visible positions → row ids.
//!
//! The presentation layer reports selections as positions within the
//! currently displayed [`VisibleSet`]. Positions are translated here, once,
//! against the same visible set the user was looking at; everything
//! downstream works with [`RowId`]s only.
//!
//! Invariant: every id in a [`SelectionSet`] is in the current visible set.
//! [`SelectionSet::retain_visible`] restores it after the filter changes.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::filter::VisibleSet;
use crate::models::RowId;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SelectionSet(BTreeSet<RowId>);

/// Outcome of [`resolve`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub selection: SelectionSet,
    /// Reported positions that do not exist in the visible set.
    pub stale: Vec<usize>,
}

/// Translate display positions into row ids.
///
/// Out-of-range positions are dropped and returned in `stale`; repeated
/// positions collapse to one id.
pub fn resolve(visible: &VisibleSet, positions: &[usize]) -> Resolution {
    let mut selection = BTreeSet::new();
    let mut stale = Vec::new();

    for &pos in positions {
        match visible.at(pos) {
            Some(id) => {
                selection.insert(id);
            }
            None => stale.push(pos),
        }
    }

    if !stale.is_empty() {
        log::warn!(
            "dropped {} stale selection position(s) {:?}; {} row(s) visible",
            stale.len(),
            stale,
            visible.len()
        );
    }

    Resolution {
        selection: SelectionSet(selection),
        stale,
    }
}

impl SelectionSet {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, id: RowId) -> bool {
        self.0.contains(&id)
    }

    /// Selected ids in table order, which is also display order.
    pub fn ids(&self) -> impl Iterator<Item = RowId> + '_ {
        self.0.iter().copied()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Drop ids that are not in `visible`; returns the dropped ids.
    pub fn retain_visible(&mut self, visible: &VisibleSet) -> Vec<RowId> {
        let dropped: Vec<RowId> = self
            .0
            .iter()
            .copied()
            .filter(|id| !visible.contains(*id))
            .collect();
        for id in &dropped {
            self.0.remove(id);
        }
        dropped
    }

    /// Display positions of the selected rows within `visible`.
    pub fn positions(&self, visible: &VisibleSet) -> Vec<usize> {
        self.0
            .iter()
            .filter_map(|id| visible.position_of(*id))
            .collect()
    }

    pub fn is_subset_of(&self, visible: &VisibleSet) -> bool {
        self.0.iter().all(|id| visible.contains(*id))
    }
}
