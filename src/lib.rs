//! Gom: persists in-memory domain entities to a SQLite database and
//! reconstitutes them on demand.
//!
//! This crate is the SQLite-backed half of Gom — the [Adapter]'s worker
//! thread, the migration-aware [Repository], and the [Resource] /
//! [ResourceGroup] entity layer — built on top of [gom_core], which holds
//! the pure schema/filter/SQL-compilation logic. The split mirrors the
//! teacher crate's own `adbc_core` (abstract model) / `adbc` (driver
//! manager) boundary.
//!
//! # Modules
//!
//! - [adapter]: [adapter::Adapter], the single worker thread every SQLite
//!   call runs on, and [adapter::AdapterOptions].
//! - [command]: [command::Command], one-shot SQL text plus binds.
//! - [cursor]: [cursor::Cursor], a materialised row iterator.
//! - [repository]: [repository::Repository], migrations and finds.
//! - [resource]: [resource::Resource] and [resource::Slot].
//! - [resource_group]: [resource_group::ResourceGroup].

pub mod adapter;
pub mod command;
pub mod cursor;
pub mod error;
pub mod repository;
pub mod resource;
pub mod resource_group;

pub use adapter::{Adapter, AdapterOptions};
pub use command::{ColumnSpec, Command, ExecResult};
pub use cursor::Cursor;
pub use error::{Error, Result};
pub use repository::Repository;
pub use resource::{Resource, Slot};
pub use resource_group::ResourceGroup;

pub use gom_core::{
    CommandBuilder, Compiled, Direction, EntitySchema, Filter, ManyToMany, NullPolarity, Operator,
    Property, PropertyFlags, SchemaRegistry, SortTerm, Sorting, StorageKind, TableRewriteMap,
    Value, ValueKind, ValueTransform,
};
