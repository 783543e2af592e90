//! Shared fixtures for the scenario tests in `tests/scenarios.rs`: entity
//! schemas matching spec.md §8's example data, and a helper that opens an
//! in-memory adapter and registers a [Repository] against them.

use gom::{Adapter, AdapterOptions, EntitySchema, Property, PropertyFlags, Repository, SchemaRegistry, ValueKind};

pub fn item_schema() -> EntitySchema {
    EntitySchema::new(
        "item",
        "items",
        vec![
            Property::new("id", ValueKind::I64)
                .with_flags(PropertyFlags::PRIMARY_KEY | PropertyFlags::AUTO_GENERATED),
            Property::new("first_name", ValueKind::Text),
            Property::new("surname", ValueKind::Text),
        ],
        None,
    )
    .expect("item schema is well-formed")
}

pub fn account_schema() -> EntitySchema {
    EntitySchema::new(
        "account",
        "accounts",
        vec![
            Property::new("id", ValueKind::I64)
                .with_flags(PropertyFlags::PRIMARY_KEY | PropertyFlags::AUTO_GENERATED),
            Property::new("name", ValueKind::Text).with_flags(PropertyFlags::NOT_NULL),
            Property::new("email", ValueKind::Text)
                .with_flags(PropertyFlags::NOT_NULL | PropertyFlags::UNIQUE),
        ],
        None,
    )
    .expect("account schema is well-formed")
}

pub fn episode_schema() -> EntitySchema {
    EntitySchema::new(
        "episode",
        "episodes",
        vec![
            Property::new("id", ValueKind::I64)
                .with_flags(PropertyFlags::PRIMARY_KEY | PropertyFlags::AUTO_GENERATED),
            Property::new("series_id", ValueKind::Text),
            Property::new("season_number", ValueKind::I32),
            Property::new("episode_number", ValueKind::I32),
            Property::new("episode_name", ValueKind::Text),
        ],
        None,
    )
    .expect("episode schema is well-formed")
}

pub fn bookmark_schema() -> EntitySchema {
    EntitySchema::new(
        "bookmark",
        "bookmarks",
        vec![
            Property::new("id", ValueKind::Text).with_flags(PropertyFlags::PRIMARY_KEY),
            Property::new("url", ValueKind::Text),
            Property::new("title", ValueKind::Text),
            Property::new("thumbnail_url", ValueKind::Text).introduced_at(2),
        ],
        None,
    )
    .expect("bookmark schema is well-formed")
}

/// Opens a fresh `:memory:` adapter, registers `schemas`, and hands back a
/// [Repository] ready for [Repository::automatic_migrate].
pub fn repository_with(schemas: Vec<EntitySchema>) -> Repository {
    let _ = env_logger::builder().is_test(true).try_init();

    let adapter = Adapter::new();
    adapter
        .open(":memory:", AdapterOptions::default())
        .expect("in-memory adapter opens");

    let mut registry = SchemaRegistry::new();
    for schema in schemas {
        registry.register(schema).expect("schema registers");
    }
    registry.finish().expect("schemas resolve");

    Repository::new(adapter, registry)
}
