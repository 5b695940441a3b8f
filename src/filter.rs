//! Filter Engine: derive the visible subset of the table.
//!
//! A [`FilterSpec`] holds, per categorical column, the set of allowed
//! values, plus a case-insensitive substring matched against the keyword
//! column. A row is visible when it passes every membership test and the
//! substring test.
//!
//! Semantics of the categorical part:
//!
//! - a column with **no entry** in the filter is not filtered;
//! - a column whose entry is an **empty set** admits no rows.
//!
//! [`FilterSpec::all_values`] seeds every categorical column with all values
//! present in the table, which is how a session starts, so the first view
//! is the whole table.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{EditorError, Result};
use crate::models::{RowId, Table};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Allowed values per categorical column.
    #[serde(default)]
    pub categories: BTreeMap<String, BTreeSet<String>>,
    /// Substring searched for in the keyword column; empty matches all rows.
    #[serde(default)]
    pub keyword: String,
}

impl FilterSpec {
    /// Admit every value currently present in each of `columns`.
    pub fn all_values(table: &Table, columns: &[String]) -> Result<Self> {
        let mut categories = BTreeMap::new();
        for column in columns {
            let idx = table
                .column_index(column)
                .ok_or_else(|| EditorError::InvalidField(column.clone()))?;
            let values = table.rows.iter().map(|r| r.cells[idx].clone()).collect();
            categories.insert(column.clone(), values);
        }
        Ok(Self {
            categories,
            keyword: String::new(),
        })
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = keyword.into();
        self
    }

    /// Reject columns the table does not have. `keyword_column` may be
    /// absent only while the keyword is empty.
    pub fn validate(&self, table: &Table, keyword_column: &str) -> Result<()> {
        for column in self.categories.keys() {
            if table.column_index(column).is_none() {
                return Err(EditorError::InvalidField(column.clone()));
            }
        }
        if !self.keyword.is_empty() && table.column_index(keyword_column).is_none() {
            return Err(EditorError::InvalidField(keyword_column.to_string()));
        }
        Ok(())
    }
}

/// Ordered ids of the rows passing a [`FilterSpec`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct VisibleSet(Vec<RowId>);

impl VisibleSet {
    pub fn ids(&self) -> &[RowId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Row at `position` in display order.
    pub fn at(&self, position: usize) -> Option<RowId> {
        self.0.get(position).copied()
    }

    /// Display position of `id`, if visible.
    pub fn position_of(&self, id: RowId) -> Option<usize> {
        // Ids are strictly increasing: filtering preserves table order.
        self.0.binary_search(&id).ok()
    }

    pub fn contains(&self, id: RowId) -> bool {
        self.position_of(id).is_some()
    }
}

/// Apply `spec` to `table`. Pure; the result keeps table order.
///
/// Columns the table lacks read as empty values. Use
/// [`FilterSpec::validate`] first to surface them as errors instead.
pub fn apply(table: &Table, spec: &FilterSpec, keyword_column: &str) -> VisibleSet {
    let category_tests: Vec<(Option<usize>, &BTreeSet<String>)> = spec
        .categories
        .iter()
        .map(|(column, allowed)| (table.column_index(column), allowed))
        .collect();

    let needle = spec.keyword.to_lowercase();
    let keyword_idx = table.column_index(keyword_column);

    let ids = table
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| {
            category_tests.iter().all(|(idx, allowed)| {
                let value = idx.and_then(|i| row.cells.get(i)).map_or("", String::as_str);
                allowed.contains(value)
            })
        })
        .filter(|(_, row)| {
            if needle.is_empty() {
                return true;
            }
            let hay = keyword_idx
                .and_then(|i| row.cells.get(i))
                .map_or("", String::as_str);
            hay.to_lowercase().contains(&needle)
        })
        .map(|(i, _)| RowId(i))
        .collect();

    VisibleSet(ids)
}
