//! A counted, lazily materialised window onto a find's results
//! (spec.md §3 "Result Group", §4.7).

use std::collections::HashMap;

use gom_core::{CommandBuilder, EntitySchema, Filter, SchemaRegistry, Sorting};

use crate::command::{ColumnSpec, Command};
use crate::error::Result;
use crate::repository::Repository;
use crate::resource::Resource;

/// The column order [Repository::find_sorted]'s `SELECT` uses: every
/// mapped property owned by `schema` itself, then every mapped property of
/// each ancestor — mirroring `CommandBuilder`'s private `field_list`
/// exactly, since the two must agree column-for-column.
pub(crate) fn column_specs(registry: &SchemaRegistry, schema: &EntitySchema) -> Vec<ColumnSpec> {
    let mut specs = Vec::new();
    for prop in &schema.properties {
        if prop.is_mapped() {
            specs.push(ColumnSpec {
                entity: schema.type_id,
                property: prop.name,
                kind: prop.value_kind,
                transform: prop.transform.clone(),
            });
        }
    }
    for ancestor in registry.ancestors(schema) {
        for prop in &ancestor.properties {
            if prop.is_mapped() {
                specs.push(ColumnSpec {
                    entity: ancestor.type_id,
                    property: prop.name,
                    kind: prop.value_kind,
                    transform: prop.transform.clone(),
                });
            }
        }
    }
    specs
}

/// Entity type, optional filter/sorting, a count snapshot from
/// construction time, and a sparse `row index → Resource` map filled in by
/// [Self::fetch] (spec.md §4.7 invariants: count never refreshes; two
/// overlapping fetches replace earlier materialisations).
pub struct ResourceGroup {
    repository: Repository,
    type_id: &'static str,
    filter: Option<Filter>,
    sorting: Option<Sorting>,
    count: usize,
    index: HashMap<usize, Resource>,
}

impl ResourceGroup {
    pub(crate) fn new(
        repository: Repository,
        type_id: &'static str,
        filter: Option<Filter>,
        sorting: Option<Sorting>,
        count: usize,
    ) -> ResourceGroup {
        ResourceGroup {
            repository,
            type_id,
            filter,
            sorting,
            count,
            index: HashMap::new(),
        }
    }

    pub fn get_count(&self) -> usize {
        self.count
    }

    pub fn get_index(&self, index: usize) -> Option<&Resource> {
        self.index.get(&index)
    }

    /// Builds and runs the window's `SELECT`, and materialises each row
    /// into a persisted, clean [Resource] at `offset + row-ordinal`
    /// (spec.md §4.7's fetch protocol).
    pub fn fetch(&mut self, offset: usize, count: usize) -> Result<()> {
        let schema = self.repository.registry().require(self.type_id)?.clone();
        let builder = CommandBuilder::new();
        let compiled = builder.select(
            self.repository.registry(),
            &schema,
            self.filter.as_ref(),
            self.sorting.as_ref(),
            count,
            offset,
            None,
        )?;
        let specs = column_specs(self.repository.registry(), &schema);
        let mut cursor = Command::with_sql(
            self.repository.adapter().clone(),
            compiled.sql,
            compiled.binds,
        )
        .execute_query(specs.clone())?;

        let mut ordinal = 0;
        while cursor.step() {
            let mut resource = Resource::new(self.type_id);
            for (i, spec) in specs.iter().enumerate() {
                resource.set_clean(spec.property, cursor.read(i));
            }
            resource.mark_persisted_clean();
            self.index.insert(offset + ordinal, resource);
            ordinal += 1;
        }
        Ok(())
    }
}
