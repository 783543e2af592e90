//! One-shot SQL text plus bound values, executed through an [Adapter]
//! (spec.md §3 "Command").

use gom_core::{Value, ValueKind, ValueTransform};

use crate::adapter::Adapter;
use crate::cursor::Cursor;
use crate::error::{Error, Result};

/// Describes one column of a typed `SELECT`, in the exact order the
/// compiled field list uses — see [crate::resource_group::column_specs].
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub entity: &'static str,
    pub property: &'static str,
    pub kind: ValueKind,
    pub transform: Option<ValueTransform>,
}

/// The outcome of [Command::execute]: how many rows a DML statement
/// touched, and the connection's last inserted rowid (meaningful only
/// right after an `INSERT`).
#[derive(Debug, Clone, Copy)]
pub struct ExecResult {
    pub rows_affected: usize,
    pub last_insert_rowid: i64,
}

/// SQL text, an ordered bind list, and the adapter that will run them.
///
/// Commands are one-shot by construction: [Self::execute] and
/// [Self::execute_query] consume `self`. Reuse requires [Self::reset],
/// which hands back a fresh, unbound `Command` on the same adapter
/// (spec.md §3: "reuse requires explicit reset and rebind").
pub struct Command {
    adapter: Adapter,
    sql: Option<String>,
    binds: Vec<Value>,
}

impl Command {
    pub fn new(adapter: Adapter) -> Self {
        Self {
            adapter,
            sql: None,
            binds: Vec::new(),
        }
    }

    pub fn with_sql(adapter: Adapter, sql: impl Into<String>, binds: Vec<Value>) -> Self {
        Self {
            adapter,
            sql: Some(sql.into()),
            binds,
        }
    }

    pub fn set_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    pub fn bind(mut self, binds: Vec<Value>) -> Self {
        self.binds = binds;
        self
    }

    /// Hands back a fresh `Command` on the same adapter, with no SQL text
    /// or binds — the "reset and rebind" half of the one-shot contract.
    pub fn reset(self) -> Command {
        Command::new(self.adapter)
    }

    /// Runs a DDL/INSERT/UPDATE/DELETE statement to completion.
    pub fn execute(self) -> Result<ExecResult> {
        let sql = self.sql.ok_or(Error::NoSql)?;
        let binds = self.binds;
        if self.adapter.should_log_sql() {
            log::trace!("executing SQL ({} binds): {sql}", binds.len());
        }
        self.adapter.write(move |conn| {
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| Error::sqlite(e, Some(&sql)))?;
            for (i, v) in binds.iter().enumerate() {
                gom_core::value::bind(&mut stmt, i + 1, v, None)?;
            }
            let rows_affected = stmt
                .raw_execute()
                .map_err(|e| Error::sqlite(e, Some(&sql)))?;
            Ok(ExecResult {
                rows_affected,
                last_insert_rowid: conn.last_insert_rowid(),
            })
        })
    }

    /// Runs a `SELECT`, materialising every row's columns according to
    /// `columns` (which must match the query's field list, in order), and
    /// returns a [Cursor] over the result.
    pub fn execute_query(self, columns: Vec<ColumnSpec>) -> Result<Cursor> {
        let sql = self.sql.ok_or(Error::NoSql)?;
        let binds = self.binds;
        if self.adapter.should_log_sql() {
            log::trace!("executing SQL ({} binds): {sql}", binds.len());
        }
        self.adapter.read(move |conn| {
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| Error::sqlite(e, Some(&sql)))?;
            let column_names: Vec<String> = stmt
                .column_names()
                .into_iter()
                .map(str::to_owned)
                .collect();
            for (i, v) in binds.iter().enumerate() {
                gom_core::value::bind(&mut stmt, i + 1, v, None)?;
            }
            let mut rows = stmt.raw_query();
            let mut materialised = Vec::new();
            while let Some(row) = rows.next().map_err(|e| Error::sqlite(e, Some(&sql)))? {
                let mut values = Vec::with_capacity(columns.len());
                for (idx, spec) in columns.iter().enumerate() {
                    let value =
                        gom_core::value::read(row, idx, spec.kind, spec.transform.as_ref())
                            .map_err(|cause| Error::RowMaterialiseFailed {
                                entity: spec.entity,
                                property: spec.property,
                                cause,
                            })?;
                    values.push(value);
                }
                materialised.push(values);
            }
            Ok(Cursor::new(column_names, materialised))
        })
    }
}
