//! Core data types for the benchmarking dataset.
//!
//! A [`Table`] is a header plus ordered rows of string cells. Rows are
//! addressed by [`RowId`], their position in the table as loaded. Rows are
//! never inserted or removed during a session, so ids stay unique and stable.

use serde::Serialize;
use std::fmt;

/// Canonical column layout of a benchmarking dataset file.
pub const COLUMNS: &[&str] = &[
    "dataset_id",
    "dataset_name",
    "document_id",
    "document_name",
    "chunk_id",
    "chunk_keyword",
    "question",
    "direct_answer",
    "context",
    "retrieved_chunks_1",
    "retrieved_chunks_2",
    "retrieved_chunks_3",
    "retrieved_chunks_4",
    "retrieved_chunks_5",
    "augmented_answer",
];

/// Stable row identifier: the row's position in the loaded table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RowId(pub usize);

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One record. Cell order matches the owning table's header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub cells: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Row>) -> Self {
        Self { headers, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn row(&self, id: RowId) -> Option<RowRef<'_>> {
        self.rows.get(id.0).map(|row| RowRef {
            id,
            headers: &self.headers,
            cells: &row.cells,
        })
    }

    /// Value of `column` in row `id`; `None` if either is absent.
    pub fn cell(&self, id: RowId, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows
            .get(id.0)
            .and_then(|r| r.cells.get(idx))
            .map(String::as_str)
    }

    pub fn ids(&self) -> impl Iterator<Item = RowId> + '_ {
        (0..self.rows.len()).map(RowId)
    }
}

/// Borrowed view of a row together with the header naming its cells.
#[derive(Debug, Clone, Copy)]
pub struct RowRef<'a> {
    pub id: RowId,
    headers: &'a [String],
    cells: &'a [String],
}

impl<'a> RowRef<'a> {
    pub fn get(&self, field: &str) -> Option<&'a str> {
        let idx = self.headers.iter().position(|h| h == field)?;
        self.cells.get(idx).map(String::as_str)
    }

    /// Missing fields read as the empty string.
    pub fn get_or_empty(&self, field: &str) -> &'a str {
        self.get(field).unwrap_or("")
    }

    pub fn fields(&self) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.headers
            .iter()
            .map(String::as_str)
            .zip(self.cells.iter().map(String::as_str))
    }

    /// `column → value` object for JSON output.
    pub fn to_json(&self) -> serde_json::Map<String, serde_json::Value> {
        self.fields()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
            .collect()
    }
}
