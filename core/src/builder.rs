//! Compiles entity schemas plus a filter/sorting pair into the seven SQL
//! command shapes spec.md §4.4 describes.

use crate::error::Result;
use crate::filter::{Filter, TableRewriteMap};
use crate::schema::{EntitySchema, Property, SchemaRegistry};
use crate::sorting::Sorting;
use crate::value::Value;

/// Describes a many-to-many join: the caller-named join table and the
/// entity type sitting on the other side of it (spec.md §4.4.2).
#[derive(Debug, Clone, Copy)]
pub struct ManyToMany {
    pub join_table: &'static str,
    pub element_type: &'static str,
}

/// Stateless compiler from `(schema, filter, sorting, limit/offset, m2m)`
/// to SQL text plus an ordered bind list. Holds no fields of its own.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandBuilder;

/// One compiled command: SQL text and its ordered bind list.
#[derive(Debug, Clone)]
pub struct Compiled {
    pub sql: String,
    pub binds: Vec<Value>,
}

impl CommandBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Columns a CREATE/ALTER should include for `schema` at a given
    /// migration step, beyond the primary key column `create_table` always
    /// emits up front: every mapped property other than the primary key,
    /// introduced at exactly `version` (for ALTER) or at-or-before
    /// `version` (for CREATE, via [Self::create_table]).
    ///
    /// The primary key is excluded here unconditionally — CREATE/ALTER
    /// special-case it regardless of whether it's auto-generated. See
    /// [Self::insert_columns] for INSERT/UPDATE, which excludes it only
    /// when auto-generated (spec.md §4.4.5).
    fn non_pk_properties(schema: &EntitySchema) -> Vec<&Property> {
        schema
            .properties
            .iter()
            .filter(|p| !p.is_primary_key() && p.is_mapped())
            .collect()
    }

    /// `CREATE TABLE` for version 1, or the list of `ALTER TABLE ADD
    /// COLUMN` statements for version >= 2 (spec.md §4.4.1). Returns one
    /// or more statements; callers execute each in turn.
    pub fn create_or_alter(&self, schema: &EntitySchema, version: u32) -> Vec<String> {
        if version <= 1 {
            return vec![self.create_table(schema)];
        }
        Self::non_pk_properties(schema)
            .into_iter()
            .filter(|p| p.version_introduced == version)
            .map(|p| self.alter_add_column(schema, p))
            .collect()
    }

    fn create_table(&self, schema: &EntitySchema) -> String {
        let pk = schema.primary_key_property();
        let mut columns = vec![format!(
            "'{}' {}{}",
            pk.name,
            pk.storage_kind().sql_type(),
            " PRIMARY KEY"
        )];
        if pk.flags.contains(crate::schema::PropertyFlags::AUTO_GENERATED) {
            columns.last_mut().unwrap().push_str(" AUTOINCREMENT");
        }
        for prop in Self::non_pk_properties(schema) {
            if prop.version_introduced != 1 {
                continue;
            }
            columns.push(column_definition(prop));
        }
        format!(
            "CREATE TABLE IF NOT EXISTS '{}' (\n  {}\n)",
            schema.table,
            columns.join(",\n  ")
        )
    }

    fn alter_add_column(&self, schema: &EntitySchema, prop: &Property) -> String {
        format!(
            "ALTER TABLE '{}' ADD COLUMN {}",
            schema.table,
            column_definition(prop)
        )
    }

    /// `SELECT` (spec.md §4.4.2).
    #[allow(clippy::too_many_arguments)]
    pub fn select(
        &self,
        registry: &SchemaRegistry,
        schema: &EntitySchema,
        filter: Option<&Filter>,
        sorting: Option<&Sorting>,
        limit: usize,
        offset: usize,
        m2m: Option<ManyToMany>,
    ) -> Result<Compiled> {
        let rewrites = self.rewrite_map(registry, schema, m2m)?;
        let field_list = self.field_list(registry, schema);
        let from_clause = self.from_and_joins(registry, schema, m2m, &rewrites)?;

        let mut sql = format!("SELECT {field_list} FROM {from_clause}");
        let mut binds = Vec::new();
        if let Some(filter) = filter {
            let (where_sql, where_binds) = filter.to_sql(registry, &rewrites)?;
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
            binds = where_binds;
        }
        if let Some(sorting) = sorting {
            if !sorting.is_empty() {
                let order_sql = sorting.to_sql(registry, &rewrites)?;
                sql.push_str(" ORDER BY ");
                sql.push_str(&order_sql);
            }
        }
        if limit != 0 {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if offset != 0 {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        Ok(Compiled { sql, binds })
    }

    /// `SELECT COUNT(...)`, reusing the `SELECT`'s FROM/JOIN/WHERE
    /// composition (spec.md §4.4.3). `limit`/`offset` are accepted for
    /// symmetry with [Self::select] but are rarely meaningful on a COUNT;
    /// pass `0` for both unless intentionally bounding the count.
    pub fn count(
        &self,
        registry: &SchemaRegistry,
        schema: &EntitySchema,
        filter: Option<&Filter>,
        limit: usize,
        offset: usize,
        m2m: Option<ManyToMany>,
    ) -> Result<Compiled> {
        let rewrites = self.rewrite_map(registry, schema, m2m)?;
        let from_clause = self.from_and_joins(registry, schema, m2m, &rewrites)?;
        let pk = schema.primary_key;

        let mut sql = format!(
            "SELECT COUNT('{}'.'{}') FROM {from_clause}",
            schema.table, pk
        );
        let mut binds = Vec::new();
        if let Some(filter) = filter {
            let (where_sql, where_binds) = filter.to_sql(registry, &rewrites)?;
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
            binds = where_binds;
        }
        if limit != 0 {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if offset != 0 {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        Ok(Compiled { sql, binds })
    }

    /// `DELETE FROM` (spec.md §4.4.4). Without a filter, deletes every row
    /// — permitted and explicit, per spec.md §9.
    pub fn delete(
        &self,
        registry: &SchemaRegistry,
        schema: &EntitySchema,
        filter: Option<&Filter>,
    ) -> Result<Compiled> {
        let rewrites = TableRewriteMap::new();
        let mut sql = format!("DELETE FROM '{}'", schema.table);
        let mut binds = Vec::new();
        if let Some(filter) = filter {
            let (where_sql, where_binds) = filter.to_sql(registry, &rewrites)?;
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
            binds = where_binds;
        }
        Ok(Compiled { sql, binds })
    }

    /// Column names an `INSERT` into `schema` should bind, in the fixed
    /// declaration order that also governs [Self::insert_sql]'s
    /// placeholder order (spec.md §4.4.5): every mapped property belonging
    /// to `schema` directly, excluding the primary key only when it's
    /// auto-generated. A non-auto-generated primary key (e.g. a
    /// caller-assigned text id) is an ordinary bound column.
    pub fn insert_columns(&self, schema: &EntitySchema) -> Vec<&'static str> {
        schema
            .properties
            .iter()
            .filter(|p| {
                p.is_mapped()
                    && !(p.is_primary_key() && p.flags.contains(crate::schema::PropertyFlags::AUTO_GENERATED))
            })
            .map(|p| p.name)
            .collect()
    }

    /// `INSERT INTO` text for the columns [Self::insert_columns] returns.
    /// Binds aren't produced here — an entity's current slot values, read
    /// by the same column order, are the caller's responsibility (this
    /// crate has no notion of a live entity instance).
    pub fn insert_sql(&self, schema: &EntitySchema) -> String {
        let columns = self.insert_columns(schema);
        let placeholders = vec!["?"; columns.len()].join(", ");
        let column_list = columns
            .iter()
            .map(|c| format!("'{c}'"))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO '{}' ({column_list}) VALUES ({placeholders})",
            schema.table
        )
    }

    /// `UPDATE` text for the columns [Self::insert_columns] returns, plus
    /// a final `?` for the primary key (spec.md §4.4.6).
    pub fn update_sql(&self, schema: &EntitySchema) -> String {
        let columns = self.insert_columns(schema);
        let assignments = columns
            .iter()
            .map(|c| format!("'{c}' = ?"))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "UPDATE '{}' SET {assignments} WHERE '{}'.'{}' = ?",
            schema.table, schema.table, schema.primary_key
        )
    }

    fn field_list(&self, registry: &SchemaRegistry, schema: &EntitySchema) -> String {
        let mut fields = Vec::new();
        for prop in &schema.properties {
            if prop.is_mapped() {
                fields.push(format!("'{}'.'{}' AS '{}'", schema.table, prop.name, prop.name));
            }
        }
        for ancestor in registry.ancestors(schema) {
            for prop in &ancestor.properties {
                if prop.is_mapped() {
                    fields.push(format!(
                        "'{}'.'{}' AS '{}'",
                        ancestor.table, prop.name, prop.name
                    ));
                }
            }
        }
        fields.join(", ")
    }

    fn from_and_joins(
        &self,
        registry: &SchemaRegistry,
        schema: &EntitySchema,
        m2m: Option<ManyToMany>,
        rewrites: &TableRewriteMap,
    ) -> Result<String> {
        let mut clause = format!("'{}'", schema.table);
        for ancestor in registry.ancestors(schema) {
            clause.push_str(&format!(
                " JOIN '{}' ON '{}'.'{}' = '{}'.'{}'",
                ancestor.table,
                schema.table,
                schema.primary_key,
                ancestor.table,
                ancestor.primary_key
            ));
        }
        if let Some(m2m) = m2m {
            clause.push_str(&self.m2m_joins(registry, schema, m2m)?);
        }
        let _ = rewrites;
        Ok(clause)
    }

    /// See spec.md §4.4.2 for the exact shape, and §9 for the note that
    /// the element-side chain starts at the element type's own table and
    /// walks up through declared parents (mirroring the original's
    /// do/while that always runs once before checking for the abstract
    /// root) — not "ancestors" in the strict exclusive sense used
    /// elsewhere in this module.
    fn m2m_joins(
        &self,
        registry: &SchemaRegistry,
        schema: &EntitySchema,
        m2m: ManyToMany,
    ) -> Result<String> {
        let element_schema = registry.require(m2m.element_type)?;
        let prefix = element_schema.table;

        let mut clause = format!(
            " JOIN '{}' ON '{}'.'{}' = '{}'.'{}:{}'",
            m2m.join_table,
            schema.table,
            schema.primary_key,
            m2m.join_table,
            schema.table,
            schema.primary_key
        );

        let mut chain = vec![element_schema];
        chain.extend(registry.ancestors(element_schema));
        for level in chain {
            let alias = format!("{}_{}", m2m.join_table, level.table);
            clause.push_str(&format!(
                " JOIN '{}' AS '{}' ON '{}'.'{}' = '{}'.'{}:{}'",
                level.table,
                alias,
                alias,
                level.primary_key,
                m2m.join_table,
                prefix,
                schema.primary_key
            ));
        }
        Ok(clause)
    }

    /// Table-rewrite map for the many-to-many aliasing in [Filter::to_sql]
    /// and [Sorting::to_sql]: filters/sorts over properties owned by the
    /// element type (or its ancestors) must resolve against the aliased
    /// join-table rows, not the element's bare table name.
    ///
    /// A self-referential many-to-many (the element type is the same type
    /// being queried, e.g. a "friend" joined to other rows of the same
    /// `persons` table through a `friendships` table) is excluded from the
    /// map for the level that shares the queried schema's own table: a bare
    /// `Filter`/`Sorting` reference to that entity means "my own row", not
    /// the joined-in element (spec.md §8 scenario S6's `WHERE 'persons'.'id'`
    /// stays unaliased even though the element chain still joins `'persons'
    /// AS 'friendships_persons'`).
    fn rewrite_map(
        &self,
        registry: &SchemaRegistry,
        schema: &EntitySchema,
        m2m: Option<ManyToMany>,
    ) -> Result<TableRewriteMap> {
        let mut map = TableRewriteMap::new();
        if let Some(m2m) = m2m {
            let element_schema = registry.require(m2m.element_type)?;
            let mut chain = vec![element_schema];
            chain.extend(registry.ancestors(element_schema));
            for level in chain {
                if level.table == schema.table {
                    continue;
                }
                let alias = format!("{}_{}", m2m.join_table, level.table);
                map.insert((m2m.element_type, level.table), alias);
            }
        }
        Ok(map)
    }
}

fn column_definition(prop: &Property) -> String {
    let mut def = format!("'{}' {}", prop.name, prop.storage_kind().sql_type());
    if let Some((table, column)) = prop.reference_target {
        def.push_str(&format!(" REFERENCES '{table}'('{column}')"));
    }
    if prop.flags.contains(crate::schema::PropertyFlags::UNIQUE) {
        def.push_str(" UNIQUE");
    }
    if prop.flags.contains(crate::schema::PropertyFlags::NOT_NULL) {
        def.push_str(" NOT NULL");
    }
    def
}
