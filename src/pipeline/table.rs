use sha2::{Digest, Sha256};

use crate::error::{PipelineError, Result};

/// A single cell: `None` is a missing value.
pub type Cell = Option<String>;

/// An ordered collection of trial rows sharing one ordered column set.
///
/// Column order is append-only: derived columns are added at the end and
/// existing columns are never reordered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrialTable {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl TrialTable {
    /// Create an empty table with the given header
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Build a table from a header and rows, checking every row's arity
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self> {
        let mut table = Self {
            columns,
            rows: Vec::with_capacity(rows.len()),
        };
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Append a row; blank strings are stored as missing values.
    ///
    /// Whitespace-only cells are missing too, so a value like `"   "` adds to
    /// the quality gate's `null_values` rather than to `extra_whitespace`. A
    /// dataframe `isnull()` over the same file would count only empty fields.
    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(PipelineError::RowShape {
                row: self.rows.len(),
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        let row = row
            .into_iter()
            .map(|cell| cell.filter(|value| !value.trim().is_empty()))
            .collect();
        self.rows.push(row);
        Ok(())
    }

    /// Values of a column in row order, or `None` when the column is absent
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = Option<&str>> + '_> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| row[idx].as_deref()))
    }

    /// Number of missing cells in a column, `None` when the column is absent
    pub fn missing_count(&self, name: &str) -> Option<usize> {
        self.column(name)
            .map(|values| values.filter(|v| v.is_none()).count())
    }

    /// Fraction of missing cells in a column over the row count (0 on an empty table)
    pub fn missing_fraction(&self, name: &str) -> Option<f64> {
        let missing = self.missing_count(name)?;
        if self.rows.is_empty() {
            return Some(0.0);
        }
        Some(missing as f64 / self.rows.len() as f64)
    }

    /// Number of non-missing cells in a row
    pub fn completeness(&self, row: usize) -> usize {
        self.rows
            .get(row)
            .map(|cells| cells.iter().filter(|c| c.is_some()).count())
            .unwrap_or(0)
    }

    /// Set a column's values, replacing it in place when it already exists
    /// and appending it at the end otherwise.
    pub fn set_column(&mut self, name: &str, values: Vec<Cell>) -> Result<()> {
        if values.len() != self.rows.len() {
            return Err(PipelineError::ColumnShape {
                column: name.to_string(),
                expected: self.rows.len(),
                found: values.len(),
            });
        }

        match self.column_index(name) {
            Some(idx) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(())
    }

    /// Rewrite every cell of a column through `f`
    pub fn map_column<F>(&mut self, name: &str, mut f: F) -> Result<()>
    where
        F: FnMut(Option<&str>) -> Cell,
    {
        let idx = self
            .column_index(name)
            .ok_or_else(|| PipelineError::UnknownColumn(name.to_string()))?;
        for row in &mut self.rows {
            row[idx] = f(row[idx].as_deref());
        }
        Ok(())
    }

    /// Keep only the rows at `indices`, in the given order
    pub fn select_rows(&self, indices: &[usize]) -> TrialTable {
        TrialTable {
            columns: self.columns.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }

    /// SHA-256 over the header and every cell, so identical tables always
    /// produce the same fingerprint.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for column in &self.columns {
            hasher.update(column.as_bytes());
            hasher.update([0x1f]);
        }
        hasher.update([0x1e]);
        for row in &self.rows {
            for cell in row {
                match cell {
                    Some(value) => {
                        hasher.update([0x01]);
                        hasher.update(value.as_bytes());
                    }
                    None => hasher.update([0x00]),
                }
                hasher.update([0x1f]);
            }
            hasher.update([0x1e]);
        }
        hex::encode(hasher.finalize())
    }
}
