//! A row iterator over an executed `SELECT` (spec.md §3 "Cursor").
//!
//! Rows are fully materialised inside the adapter worker before crossing
//! back to the caller's thread — `rusqlite::Row` borrows its parent
//! `Statement`/`Connection`, neither of which may leave the worker, so
//! there is no way to hand out a live, streaming row iterator here.

use gom_core::Value;

/// A fully materialised result set plus a step-then-read cursor over it,
/// mirroring `sqlite3_step`/`sqlite3_column_*` usage.
#[derive(Debug, Clone)]
pub struct Cursor {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    current: Option<usize>,
}

impl Cursor {
    pub(crate) fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            rows,
            current: None,
        }
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_name(&self, index: usize) -> &str {
        &self.columns[index]
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Advances to the next row. Returns `false` once rows are exhausted.
    pub fn step(&mut self) -> bool {
        let next = self.current.map_or(0, |c| c + 1);
        if next < self.rows.len() {
            self.current = Some(next);
            true
        } else {
            false
        }
    }

    /// Reads column `index` of the current row.
    ///
    /// # Panics
    /// Panics if called before the first successful [Self::step].
    pub fn read(&self, index: usize) -> Value {
        let row = self.current.expect("Cursor::read called before step()");
        self.rows[row][index].clone()
    }
}
