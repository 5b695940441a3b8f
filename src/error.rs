//! Error taxonomy for the editing workflow.
//!
//! Every fallible operation on the store, editor and improvement client
//! returns an [`EditorError`]. Callers at the boundary (HTTP handlers, CLI
//! commands) turn these into user-visible messages; nothing is swallowed.
//!
//! | Variant | Meaning | Effect |
//! |---------|---------|--------|
//! | `Io`, `Csv`, `Malformed` | load/save failed | action aborted, in-memory state kept |
//! | `NotFound`, `InvalidField`, `AmbiguousKey` | misuse of ids or fields | single operation aborted |
//! | `Service` | improvement service failed | nothing mutated, user may retry |
//! | `Commit` | one or more rows of a bulk commit failed | other rows committed |

use std::fmt;
use std::path::PathBuf;

use crate::models::RowId;

pub type Result<T> = std::result::Result<T, EditorError>;

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed dataset {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("malformed dataset {}: {message}", .path.display())]
    Malformed { path: PathBuf, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid field: {0}")]
    InvalidField(String),

    #[error("ambiguous key: {0}")]
    AmbiguousKey(String),

    #[error("improvement service error: {0}")]
    Service(String),

    #[error("{0}")]
    Commit(CommitErrors),
}

impl EditorError {
    pub fn row_not_found(id: RowId) -> Self {
        EditorError::NotFound(format!("row {}", id))
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EditorError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for failures of the backing file (load or save).
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            EditorError::Io { .. } | EditorError::Csv { .. } | EditorError::Malformed { .. }
        )
    }
}

/// Failures collected by a bulk commit.
///
/// Rows not listed here were committed successfully.
#[derive(Debug, Default)]
pub struct CommitErrors {
    pub failures: Vec<(RowId, EditorError)>,
}

impl CommitErrors {
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn push(&mut self, id: RowId, err: EditorError) {
        self.failures.push((id, err));
    }
}

impl fmt::Display for CommitErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} edit(s) could not be applied", self.failures.len())?;
        for (id, err) in &self.failures {
            write!(f, "; row {}: {}", id, err)?;
        }
        Ok(())
    }
}
