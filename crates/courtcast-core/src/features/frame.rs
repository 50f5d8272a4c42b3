// Assembled frame: one row per (Date, Team, Player) after every join, with
// the opponent resolved and all numeric columns side by side.

use crate::tables::{FrameError, PlayerKey};

#[derive(Debug, Clone, PartialEq)]
pub struct FrameRow {
    pub key: PlayerKey,
    pub opp_team: String,
    pub values: Vec<f64>,
}

/// Rows of an assembled frame sharing one ordered column list.
///
/// Missing numeric values (an unknown rest gap at inference) are `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    name: String,
    columns: Vec<String>,
    rows: Vec<FrameRow>,
}

impl Frame {
    /// Empty frame. Fails if a column name repeats.
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Result<Self, FrameError> {
        let name = name.into();
        for (i, column) in columns.iter().enumerate() {
            if columns[..i].contains(column) {
                return Err(FrameError::ColumnCollision {
                    column: column.clone(),
                    left: name.clone(),
                    right: name.clone(),
                });
            }
        }
        Ok(Self {
            name,
            columns,
            rows: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[FrameRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn require_column(&self, column: &str) -> Result<usize, FrameError> {
        self.column_index(column)
            .ok_or_else(|| FrameError::MissingColumn {
                table: self.name.clone(),
                column: column.to_string(),
            })
    }

    pub fn push(&mut self, row: FrameRow) -> Result<(), FrameError> {
        if row.values.len() != self.columns.len() {
            return Err(FrameError::WidthMismatch {
                table: self.name.clone(),
                got: row.values.len(),
                expected: self.columns.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Value of `column` in `row`, if the column exists.
    pub fn value(&self, row: &FrameRow, column: &str) -> Option<f64> {
        self.column_index(column).map(|i| row.values[i])
    }

    /// Keep only rows for which `keep` returns true.
    pub fn retain(&mut self, keep: impl FnMut(&FrameRow) -> bool) {
        self.rows.retain(keep);
    }

    /// Stable sort of the rows.
    pub fn sort_by_key<T: Ord>(&mut self, f: impl FnMut(&FrameRow) -> T) {
        self.rows.sort_by_key(f);
    }
}
