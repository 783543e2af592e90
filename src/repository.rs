//! Migrations, finds, and counted result groups over one adapter
//! (spec.md §4.6).

use std::sync::Arc;

use gom_core::{CommandBuilder, EntitySchema, Filter, SchemaRegistry, Sorting, ValueKind};
use rusqlite::Connection;

use crate::adapter::Adapter;
use crate::command::{ColumnSpec, Command};
use crate::error::{Error, Result};
use crate::resource::Resource;
use crate::resource_group::ResourceGroup;

struct RepositoryInner {
    adapter: Adapter,
    registry: SchemaRegistry,
}

/// Caller-facing façade over one [Adapter]: migrations, `find`/`find_one`,
/// and the schema registry they're compiled against.
#[derive(Clone)]
pub struct Repository {
    inner: Arc<RepositoryInner>,
}

impl Repository {
    pub fn new(adapter: Adapter, registry: SchemaRegistry) -> Repository {
        Repository {
            inner: Arc::new(RepositoryInner { adapter, registry }),
        }
    }

    pub fn adapter(&self) -> &Adapter {
        &self.inner.adapter
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.inner.registry
    }

    fn ensure_version_table(&self) -> Result<()> {
        self.inner.adapter.write(|conn| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS _gom_version (version INTEGER)",
                [],
            )
            .map_err(|e| {
                Error::sqlite(
                    e,
                    Some("CREATE TABLE IF NOT EXISTS _gom_version (version INTEGER)"),
                )
            })?;
            Ok(())
        })
    }

    /// Current applied version, or `0` if `_gom_version` has no rows.
    pub fn current_version(&self) -> Result<u32> {
        self.ensure_version_table()?;
        self.inner.adapter.read(|conn| {
            let version: i64 = conn
                .query_row("SELECT COALESCE(MAX(version), 0) FROM _gom_version", [], |row| {
                    row.get(0)
                })
                .map_err(|e| {
                    Error::sqlite(e, Some("SELECT COALESCE(MAX(version), 0) FROM _gom_version"))
                })?;
            Ok(version as u32)
        })
    }

    /// Runs the migration protocol (spec.md §4.6): reads the current
    /// version, and if it differs from `target_version`, runs one
    /// transaction covering every step from `max(current, 1)` through
    /// `target_version`, invoking `migrator` for each and recording it in
    /// `_gom_version` only on success. Any step failure rolls back the
    /// whole transaction and returns `MigrationFailed`.
    ///
    /// `migrator` runs directly against the worker's connection handle —
    /// it must not itself submit work back to this adapter, which would
    /// deadlock the single worker thread against its own queue.
    pub fn migrate<F>(&self, target_version: u32, migrator: F) -> Result<()>
    where
        F: Fn(&Connection, u32) -> Result<()> + Send + 'static,
    {
        self.ensure_version_table()?;
        self.inner.adapter.write(move |conn| {
            let current: i64 = conn
                .query_row("SELECT COALESCE(MAX(version), 0) FROM _gom_version", [], |row| {
                    row.get(0)
                })
                .map_err(|e| {
                    Error::sqlite(e, Some("SELECT COALESCE(MAX(version), 0) FROM _gom_version"))
                })?;
            let current = current as u32;
            if current == target_version {
                return Ok(());
            }
            conn.execute("BEGIN", [])
                .map_err(|e| Error::sqlite(e, Some("BEGIN")))?;

            let start = current.max(1);
            for step in start..=target_version {
                if let Err(cause) = migrator(conn, step) {
                    let _ = conn.execute("ROLLBACK", []);
                    return Err(Error::MigrationFailed {
                        step,
                        cause: Box::new(cause),
                    });
                }
                if let Err(e) = conn.execute(
                    "INSERT INTO _gom_version (version) VALUES (?1)",
                    rusqlite::params![step],
                ) {
                    let _ = conn.execute("ROLLBACK", []);
                    return Err(Error::sqlite(
                        e,
                        Some("INSERT INTO _gom_version (version) VALUES (?1)"),
                    ));
                }
            }
            conn.execute("COMMIT", [])
                .map_err(|e| Error::sqlite(e, Some("COMMIT")))?;
            Ok(())
        })
    }

    /// The built-in migrator (spec.md §4.6): at step `s`, for each schema
    /// run the CREATE (s = 1) or the ALTER list (s > 1) from
    /// [CommandBuilder::create_or_alter].
    pub fn automatic_migrate(&self, target_version: u32, schemas: &[EntitySchema]) -> Result<()> {
        let schemas: Vec<EntitySchema> = schemas.to_vec();
        self.migrate(target_version, move |conn, step| {
            let builder = CommandBuilder::new();
            for schema in &schemas {
                for stmt in builder.create_or_alter(schema, step) {
                    conn.execute(&stmt, [])
                        .map_err(|e| Error::sqlite(e, Some(&stmt)))?;
                }
            }
            Ok(())
        })
    }

    fn count(&self, type_id: &'static str, schema: &EntitySchema, filter: Option<&Filter>) -> Result<usize> {
        let builder = CommandBuilder::new();
        let compiled = builder.count(self.registry(), schema, filter, 0, 0, None)?;
        let spec = ColumnSpec {
            entity: type_id,
            property: "count",
            kind: ValueKind::I64,
            transform: None,
        };
        let mut cursor = Command::with_sql(self.adapter().clone(), compiled.sql, compiled.binds)
            .execute_query(vec![spec])?;
        if !cursor.step() {
            return Ok(0);
        }
        Ok(match cursor.read(0) {
            gom_core::Value::I64(n) => n.max(0) as usize,
            _ => 0,
        })
    }

    /// `find(T, filter) → ResultGroup`: counts matching rows and returns
    /// an (unfetched) [ResourceGroup] sized by that count.
    pub fn find(&self, type_id: &'static str, filter: Option<Filter>) -> Result<ResourceGroup> {
        self.find_sorted(type_id, filter, None)
    }

    /// [Self::find] with an additional `ORDER BY`.
    pub fn find_sorted(
        &self,
        type_id: &'static str,
        filter: Option<Filter>,
        sorting: Option<Sorting>,
    ) -> Result<ResourceGroup> {
        let schema = self.registry().require(type_id)?.clone();
        let count = self.count(type_id, &schema, filter.as_ref())?;
        Ok(ResourceGroup::new(
            self.clone(),
            type_id,
            filter,
            sorting,
            count,
        ))
    }

    /// `find(T, filter)` narrowed to one row; `EmptyResult` if none match.
    pub fn find_one(&self, type_id: &'static str, filter: Option<Filter>) -> Result<Resource> {
        let mut group = self.find(type_id, filter)?;
        group.fetch(0, 1)?;
        group.get_index(0).cloned().ok_or(Error::EmptyResult)
    }
}
