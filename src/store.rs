//! Dataset Store: the in-memory table and its CSV file.
//!
//! The store is the only owner of the [`Table`]. Everything else refers to
//! rows by [`RowId`] and goes through [`DatasetStore::get`] and
//! [`DatasetStore::set_field`], so an edit can never land on a stale copy.
//!
//! # File format
//!
//! Comma-separated values with a header row. A load followed by a save
//! reproduces the file byte for byte when it is already in normalized form:
//! LF line endings, fields quoted only when they contain a comma, quote or
//! newline, and a newline after the last record.
//!
//! # Saving
//!
//! [`DatasetStore::save`] writes to a temporary file in the destination
//! directory and renames it over the target, so readers see either the old
//! file or the new one. Two sessions saving the same file race; the last
//! save wins.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{EditorError, Result};
use crate::models::{Row, RowId, RowRef, Table};

pub struct DatasetStore {
    path: PathBuf,
    table: Table,
}

impl DatasetStore {
    /// Read the whole file. Fails without a partial table if the file is
    /// missing, has no header, repeats a column name, or has a record whose
    /// length differs from the header.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| EditorError::io(&path, e))?;
        let table = read_table(&path, file)?;
        log::info!("loaded {} rows from {}", table.len(), path.display());
        Ok(Self { path, table })
    }

    /// Wrap an already-built table; `save` will write to `path`.
    pub fn from_table(path: impl Into<PathBuf>, table: Table) -> Self {
        Self {
            path: path.into(),
            table,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&self.path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp =
            tempfile::NamedTempFile::new_in(dir).map_err(|e| EditorError::io(dir, e))?;

        write_table(path, &self.table, tmp.as_file_mut())?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| EditorError::io(tmp.path(), e))?;
        // Temp files are created 0600; keep the mode of the file we replace.
        if let Ok(meta) = std::fs::metadata(path) {
            tmp.as_file()
                .set_permissions(meta.permissions())
                .map_err(|e| EditorError::io(tmp.path(), e))?;
        }
        tmp.persist(path)
            .map_err(|e| EditorError::io(path, e.error))?;

        log::info!("saved {} rows to {}", self.table.len(), path.display());
        Ok(())
    }

    pub fn get(&self, id: RowId) -> Result<RowRef<'_>> {
        self.table
            .row(id)
            .ok_or_else(|| EditorError::row_not_found(id))
    }

    /// Check that `set_field(id, field, _)` would succeed.
    pub fn check_field(&self, id: RowId, field: &str) -> Result<usize> {
        if id.0 >= self.table.len() {
            return Err(EditorError::row_not_found(id));
        }
        self.table
            .column_index(field)
            .ok_or_else(|| EditorError::InvalidField(field.to_string()))
    }

    pub fn set_field(&mut self, id: RowId, field: &str, value: impl Into<String>) -> Result<()> {
        let idx = self.check_field(id, field)?;
        self.table.rows[id.0].cells[idx] = value.into();
        Ok(())
    }

    /// Resolve a row by the value of its key column (normally `chunk_id`).
    pub fn find_by_key(&self, key_column: &str, key: &str) -> Result<RowId> {
        let idx = self
            .table
            .column_index(key_column)
            .ok_or_else(|| EditorError::InvalidField(key_column.to_string()))?;

        let mut matches = self
            .table
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.cells[idx] == key)
            .map(|(i, _)| RowId(i));

        let first = matches
            .next()
            .ok_or_else(|| EditorError::NotFound(format!("{} = {}", key_column, key)))?;
        if let Some(second) = matches.next() {
            return Err(EditorError::AmbiguousKey(format!(
                "{} = {} matches rows {} and {}",
                key_column, key, first, second
            )));
        }
        Ok(first)
    }

    /// Distinct values of `column`, sorted.
    pub fn column_values(&self, column: &str) -> Result<BTreeSet<String>> {
        let idx = self
            .table
            .column_index(column)
            .ok_or_else(|| EditorError::InvalidField(column.to_string()))?;
        Ok(self
            .table
            .rows
            .iter()
            .map(|row| row.cells[idx].clone())
            .collect())
    }
}

fn read_table(path: &Path, reader: impl std::io::Read) -> Result<Table> {
    let csv_err = |source| EditorError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(String::from)
        .collect();
    if headers.is_empty() || (headers.len() == 1 && headers[0].is_empty()) {
        return Err(EditorError::Malformed {
            path: path.to_path_buf(),
            message: "missing header row".to_string(),
        });
    }
    let mut seen = BTreeSet::new();
    for h in &headers {
        if !seen.insert(h.as_str()) {
            return Err(EditorError::Malformed {
                path: path.to_path_buf(),
                message: format!("duplicate column '{}'", h),
            });
        }
    }

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(csv_err)?;
        rows.push(Row {
            cells: record.iter().map(String::from).collect(),
        });
    }

    Ok(Table::new(headers, rows))
}

fn write_table(path: &Path, table: &Table, out: &mut File) -> Result<()> {
    let csv_err = |source| EditorError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut wtr = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(&mut *out);

    wtr.write_record(&table.headers).map_err(csv_err)?;
    for row in &table.rows {
        wtr.write_record(&row.cells).map_err(csv_err)?;
    }
    wtr.flush().map_err(|e| EditorError::io(path, e))?;
    drop(wtr);
    out.flush().map_err(|e| EditorError::io(path, e))?;
    Ok(())
}
