//! In-memory entity instances: identity, dirtiness, and the save/delete
//! lifecycle (spec.md §3 "Entity Instance", §4.7).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use gom_core::{CommandBuilder, Filter, PropertyFlags, Value, ValueKind};

use crate::command::Command;
use crate::error::Result;
use crate::repository::Repository;

/// One property's current slot: either a plain value, or a strong handle
/// to a related entity whose primary key hasn't been read out yet.
///
/// A related-entity slot is resolved to a `Value::Reference` slot the
/// first time [Resource::save] recurses into it (spec.md §4.7 rule 1).
#[derive(Clone)]
pub enum Slot {
    Value(Value),
    Related(Arc<Mutex<Resource>>),
}

/// A dynamic property bag: an entity type's schema reference plus a
/// `name → Slot` map, instead of a generated per-entity struct (Gom ships
/// no derive macro; see SPEC_FULL.md §3).
#[derive(Clone)]
pub struct Resource {
    type_id: &'static str,
    slots: HashMap<&'static str, Slot>,
    persisted: bool,
    dirty: bool,
}

impl Resource {
    pub fn new(type_id: &'static str) -> Resource {
        Resource {
            type_id,
            slots: HashMap::new(),
            persisted: false,
            dirty: false,
        }
    }

    pub fn type_id(&self) -> &'static str {
        self.type_id
    }

    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set(&mut self, property: &'static str, value: Value) {
        self.slots.insert(property, Slot::Value(value));
        self.dirty = true;
    }

    /// Sets `property` to a not-yet-saved related entity. [Self::save]
    /// recurses into it before reading this entity's own columns.
    pub fn set_related(&mut self, property: &'static str, related: Arc<Mutex<Resource>>) {
        self.slots.insert(property, Slot::Related(related));
        self.dirty = true;
    }

    /// Sets `property` without marking the slot dirty — used while
    /// materialising a freshly fetched row (spec.md §4.7: "mark persisted,
    /// all slots clean").
    pub(crate) fn set_clean(&mut self, property: &'static str, value: Value) {
        self.slots.insert(property, Slot::Value(value));
    }

    pub(crate) fn mark_persisted_clean(&mut self) {
        self.persisted = true;
        self.dirty = false;
    }

    /// The current value of `property`. A `Related` slot whose entity
    /// hasn't been saved yet (and so resolved into a plain `Value` slot by
    /// [Self::save]) reads as `Value::Null` — there is no key to surface.
    pub fn get(&self, property: &str) -> Option<Value> {
        match self.slots.get(property)? {
            Slot::Value(v) => Some(v.clone()),
            Slot::Related(_) => Some(Value::Null),
        }
    }

    /// Runs the save algorithm of spec.md §4.7:
    /// 1. Recursively save every currently-set related-entity reference.
    /// 2. INSERT if not yet persisted (and capture the generated key).
    /// 3. Otherwise UPDATE if any slot is dirty.
    /// 4. Clear dirtiness.
    pub fn save(&mut self, repository: &Repository) -> Result<()> {
        let schema = repository.registry().require(self.type_id)?.clone();

        for prop in &schema.properties {
            if prop.value_kind != ValueKind::Reference {
                continue;
            }
            let related = match self.slots.get(prop.name) {
                Some(Slot::Related(r)) => Arc::clone(r),
                _ => continue,
            };
            let pk_value = {
                let mut guard = related.lock().expect("related resource lock poisoned");
                guard.save(repository)?;
                let related_schema = repository.registry().require(guard.type_id)?;
                guard
                    .slots
                    .get(related_schema.primary_key)
                    .and_then(|slot| match slot {
                        Slot::Value(v) => Some(v.clone()),
                        Slot::Related(_) => None,
                    })
                    .unwrap_or(Value::Null)
            };
            self.slots.insert(prop.name, Slot::Value(pk_value));
        }

        let builder = CommandBuilder::new();
        let columns = builder.insert_columns(&schema);

        if !self.persisted {
            let binds: Vec<Value> = columns
                .iter()
                .map(|c| self.get(c).unwrap_or(Value::Null))
                .collect();
            let sql = builder.insert_sql(&schema);
            let result = Command::with_sql(repository.adapter().clone(), sql, binds).execute()?;
            let pk_prop = schema.primary_key_property();
            if pk_prop.flags.contains(PropertyFlags::AUTO_GENERATED) {
                self.slots.insert(
                    schema.primary_key,
                    Slot::Value(Value::I64(result.last_insert_rowid)),
                );
            }
            self.persisted = true;
        } else if self.dirty {
            let mut binds: Vec<Value> = columns
                .iter()
                .map(|c| self.get(c).unwrap_or(Value::Null))
                .collect();
            let pk_value = self.get(schema.primary_key).unwrap_or(Value::Null);
            binds.push(pk_value);
            let sql = builder.update_sql(&schema);
            Command::with_sql(repository.adapter().clone(), sql, binds).execute()?;
        }

        self.dirty = false;
        Ok(())
    }

    /// No-op on a not-persisted resource; otherwise deletes the row keyed
    /// by the primary key and marks the resource not-persisted.
    pub fn delete(&mut self, repository: &Repository) -> Result<()> {
        if !self.persisted {
            return Ok(());
        }
        let schema = repository.registry().require(self.type_id)?.clone();
        let pk_value = self.get(schema.primary_key).unwrap_or(Value::Null);
        let filter = Filter::eq(self.type_id, schema.primary_key, pk_value);
        let compiled =
            CommandBuilder::new().delete(repository.registry(), &schema, Some(&filter))?;
        Command::with_sql(repository.adapter().clone(), compiled.sql, compiled.binds).execute()?;
        self.persisted = false;
        Ok(())
    }
}
