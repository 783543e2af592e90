//! Gom: schema reflection, the filter/sorting algebra, and the SQL
//! command builder.
//!
//! This crate is the pure, IO-free half of Gom — the same role
//! `adbc_core` plays for the driver manager it's modeled on: it declares
//! the abstract model (schemas, properties, values, filters) and compiles
//! queries to SQL text, but never opens a connection or touches a byte of
//! disk. The [gom](https://docs.rs/gom) crate adds the SQLite-backed
//! adapter, repository, and resource layer on top.
//!
//! # Modules
//!
//! - [value]: [value::Value], [value::ValueKind] and the codec functions
//!   that move them to/from SQLite storage classes.
//! - [schema]: [schema::Property], [schema::EntitySchema] and the
//!   [schema::SchemaRegistry] catalogue.
//! - [filter]: the [filter::Filter] predicate tree.
//! - [sorting]: the [sorting::Sorting] term list.
//! - [builder]: [builder::CommandBuilder], which compiles a schema plus a
//!   filter/sorting pair into `CREATE`/`ALTER`/`SELECT`/`COUNT`/`DELETE`/
//!   `INSERT`/`UPDATE` SQL text and bind lists.

pub mod builder;
pub mod error;
pub mod filter;
pub mod schema;
pub mod sorting;
pub mod value;

pub use builder::{CommandBuilder, Compiled, ManyToMany};
pub use error::{Error, Result};
pub use filter::{Filter, NullPolarity, Operator, TableRewriteMap};
pub use schema::{EntitySchema, Property, PropertyFlags, SchemaRegistry};
pub use sorting::{Direction, SortTerm, Sorting};
pub use value::{StorageKind, Value, ValueKind, ValueTransform};
