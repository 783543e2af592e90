//! Entity schemas: the declared shape of one table, and the process-wide
//! registry that holds them.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::value::{ValueKind, ValueTransform};

/// Per-property flags (spec.md §3), as a small bitset over `u8`.
///
/// `NOT_MAPPED` isn't named in spec.md's flag list verbatim, but is implied
/// by §4.4.2 ("properties explicitly flagged not-mapped"): it excludes a
/// property from SELECT field lists entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PropertyFlags(u8);

impl PropertyFlags {
    pub const PRIMARY_KEY: PropertyFlags = PropertyFlags(1 << 0);
    pub const UNIQUE: PropertyFlags = PropertyFlags(1 << 1);
    pub const NOT_NULL: PropertyFlags = PropertyFlags(1 << 2);
    pub const AUTO_GENERATED: PropertyFlags = PropertyFlags(1 << 3);
    pub const EAGER_LOAD: PropertyFlags = PropertyFlags(1 << 4);
    pub const NOT_MAPPED: PropertyFlags = PropertyFlags(1 << 5);

    pub const fn empty() -> Self {
        PropertyFlags(0)
    }

    pub const fn contains(self, other: PropertyFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for PropertyFlags {
    type Output = PropertyFlags;
    fn bitor(self, rhs: PropertyFlags) -> PropertyFlags {
        PropertyFlags(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for PropertyFlags {
    fn bitor_assign(&mut self, rhs: PropertyFlags) {
        self.0 |= rhs.0;
    }
}

/// One column's metadata within an [EntitySchema].
#[derive(Clone)]
pub struct Property {
    pub name: &'static str,
    pub value_kind: ValueKind,
    pub flags: PropertyFlags,
    pub version_introduced: u32,
    pub reference_target: Option<(&'static str, &'static str)>,
    pub transform: Option<ValueTransform>,
}

impl Property {
    pub fn new(name: &'static str, value_kind: ValueKind) -> Self {
        Self {
            name,
            value_kind,
            flags: PropertyFlags::empty(),
            version_introduced: 1,
            reference_target: None,
            transform: None,
        }
    }

    pub fn with_flags(mut self, flags: PropertyFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn introduced_at(mut self, version: u32) -> Self {
        self.version_introduced = version;
        self
    }

    pub fn references(mut self, table: &'static str, column: &'static str) -> Self {
        self.reference_target = Some((table, column));
        self
    }

    pub fn with_transform(mut self, transform: ValueTransform) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn is_primary_key(&self) -> bool {
        self.flags.contains(PropertyFlags::PRIMARY_KEY)
    }

    pub fn is_mapped(&self) -> bool {
        !self.flags.contains(PropertyFlags::NOT_MAPPED)
    }

    /// The storage class this property serializes as. A custom transform
    /// always forces BLOB (spec.md §3 invariant), regardless of the
    /// declared value kind.
    pub fn storage_kind(&self) -> crate::value::StorageKind {
        if self.transform.is_some() {
            crate::value::StorageKind::Blob
        } else {
            self.value_kind.storage_kind()
        }
    }
}

impl std::fmt::Debug for Property {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("value_kind", &self.value_kind)
            .field("flags", &self.flags)
            .field("version_introduced", &self.version_introduced)
            .field("reference_target", &self.reference_target)
            .finish()
    }
}

/// The declared shape of one entity type: table name, properties, primary
/// key, and optional parent for inheritance-style joins (spec.md §3, §4.4).
#[derive(Debug, Clone)]
pub struct EntitySchema {
    pub type_id: &'static str,
    pub table: &'static str,
    pub properties: Vec<Property>,
    pub primary_key: &'static str,
    pub parent: Option<&'static str>,
}

impl EntitySchema {
    /// Validates and returns a schema. See spec.md §4.2 for the checks
    /// performed at registration time; `parent` and reference targets are
    /// validated by [SchemaRegistry::register] instead, since they require
    /// cross-schema knowledge this constructor doesn't have.
    pub fn new(
        type_id: &'static str,
        table: &'static str,
        properties: Vec<Property>,
        parent: Option<&'static str>,
    ) -> Result<Self> {
        if !is_valid_table_name(table) {
            return Err(Error::InvalidTableName(table.to_string()));
        }

        let mut seen = HashMap::new();
        let mut primary_key = None;
        let mut last_version = 0u32;
        for prop in &properties {
            if seen.insert(prop.name, ()).is_some() {
                return Err(Error::InvalidSchema {
                    entity: type_id,
                    reason: format!("duplicate property {:?}", prop.name),
                });
            }
            if prop.version_introduced < 1 {
                return Err(Error::InvalidSchema {
                    entity: type_id,
                    reason: format!("{:?} has version_introduced < 1", prop.name),
                });
            }
            if prop.version_introduced < last_version {
                return Err(Error::InvalidSchema {
                    entity: type_id,
                    reason: "version_introduced must be non-decreasing in declaration order"
                        .to_string(),
                });
            }
            last_version = prop.version_introduced;
            if prop.is_primary_key() {
                if primary_key.is_some() {
                    return Err(Error::InvalidSchema {
                        entity: type_id,
                        reason: "more than one primary-key property".to_string(),
                    });
                }
                if prop.flags.contains(PropertyFlags::AUTO_GENERATED)
                    && !matches!(
                        prop.value_kind,
                        ValueKind::I8
                            | ValueKind::I16
                            | ValueKind::I32
                            | ValueKind::I64
                            | ValueKind::U8
                            | ValueKind::U16
                            | ValueKind::U32
                            | ValueKind::U64
                    )
                {
                    return Err(Error::InvalidSchema {
                        entity: type_id,
                        reason: "auto-generated primary key must have integer value_kind"
                            .to_string(),
                    });
                }
                primary_key = Some(prop.name);
            }
        }

        let primary_key = primary_key.ok_or_else(|| Error::InvalidSchema {
            entity: type_id,
            reason: "exactly one property must be flagged primary-key".to_string(),
        })?;

        Ok(Self {
            type_id,
            table,
            properties,
            primary_key,
            parent,
        })
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn primary_key_property(&self) -> &Property {
        self.property(self.primary_key)
            .expect("primary_key always names a declared property")
    }
}

fn is_valid_table_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// The process-wide catalogue of entity schemas, keyed by type identifier.
///
/// Built once at startup and threaded into [crate::Repository]-equivalent
/// consumers explicitly, rather than kept behind a global singleton (see
/// spec.md §9 Design Notes). Append-only until [SchemaRegistry::finish]
/// is called; read-only (and freely `Send + Sync` shareable) afterwards.
#[derive(Debug, Default, Clone)]
pub struct SchemaRegistry {
    schemas: HashMap<&'static str, EntitySchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a schema. Reference targets may name entities registered
    /// later in the same startup phase (forward declaration); this is
    /// only checked once by [SchemaRegistry::finish].
    pub fn register(&mut self, schema: EntitySchema) -> Result<()> {
        if let Some(parent) = schema.parent {
            if parent == schema.type_id {
                return Err(Error::InvalidSchema {
                    entity: schema.type_id,
                    reason: "an entity cannot be its own parent".to_string(),
                });
            }
        }
        self.schemas.insert(schema.type_id, schema);
        Ok(())
    }

    /// Validates that every reference target and parent type resolves
    /// within the registry. Call once, after all schemas are registered.
    pub fn finish(&self) -> Result<()> {
        for schema in self.schemas.values() {
            if let Some(parent) = schema.parent {
                if !self.schemas.contains_key(parent) {
                    return Err(Error::UnknownEntity(parent.to_string()));
                }
            }
            for prop in &schema.properties {
                if let Some((table, _column)) = prop.reference_target {
                    let known = self.schemas.values().any(|s| s.table == table);
                    if !known {
                        return Err(Error::UnknownEntity(table.to_string()));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, type_id: &str) -> Option<&EntitySchema> {
        self.schemas.get(type_id)
    }

    pub fn require(&self, type_id: &'static str) -> Result<&EntitySchema> {
        self.get(type_id)
            .ok_or_else(|| Error::UnknownEntity(type_id.to_string()))
    }

    /// Walks from `schema` up through its ancestor chain, outermost last
    /// (immediate parent first).
    pub fn ancestors<'a>(&'a self, schema: &'a EntitySchema) -> Vec<&'a EntitySchema> {
        let mut out = Vec::new();
        let mut current = schema;
        while let Some(parent_id) = current.parent {
            match self.get(parent_id) {
                Some(parent) => {
                    out.push(parent);
                    current = parent;
                }
                None => break,
            }
        }
        out
    }

    /// Resolves the property `name` for entity `type_id`, searching the
    /// entity's own schema then its ancestors (spec.md §3: "every leaf
    /// property name resolves in the named entity's schema or a parent
    /// schema"). Returns the owning schema and the property.
    pub fn resolve(
        &self,
        type_id: &'static str,
        name: &'static str,
    ) -> Result<(&EntitySchema, &Property)> {
        let schema = self.require(type_id)?;
        if let Some(prop) = schema.property(name) {
            return Ok((schema, prop));
        }
        for ancestor in self.ancestors(schema) {
            if let Some(prop) = ancestor.property(name) {
                return Ok((ancestor, prop));
            }
        }
        Err(Error::UnknownColumn {
            entity: type_id,
            property: name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueKind;

    #[test]
    fn rejects_malformed_table_names() {
        assert!(!is_valid_table_name("1items"));
        assert!(!is_valid_table_name("it-ems"));
        assert!(is_valid_table_name("_items"));
        assert!(is_valid_table_name("Items2"));
    }

    #[test]
    fn requires_exactly_one_primary_key() {
        let err = EntitySchema::new(
            "item",
            "items",
            vec![Property::new("name", ValueKind::Text)],
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidSchema { .. }));

        let err = EntitySchema::new(
            "item",
            "items",
            vec![
                Property::new("a", ValueKind::I64).with_flags(PropertyFlags::PRIMARY_KEY),
                Property::new("b", ValueKind::I64).with_flags(PropertyFlags::PRIMARY_KEY),
            ],
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidSchema { .. }));
    }

    #[test]
    fn auto_generated_pk_must_be_integer() {
        let err = EntitySchema::new(
            "item",
            "items",
            vec![Property::new("id", ValueKind::Text)
                .with_flags(PropertyFlags::PRIMARY_KEY | PropertyFlags::AUTO_GENERATED)],
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidSchema { .. }));

        assert!(EntitySchema::new(
            "bookmark",
            "bookmarks",
            vec![Property::new("id", ValueKind::Text).with_flags(PropertyFlags::PRIMARY_KEY)],
            None,
        )
        .is_ok());
    }

    #[test]
    fn rejects_duplicate_properties() {
        let err = EntitySchema::new(
            "item",
            "items",
            vec![
                Property::new("id", ValueKind::I64)
                    .with_flags(PropertyFlags::PRIMARY_KEY | PropertyFlags::AUTO_GENERATED),
                Property::new("name", ValueKind::Text),
                Property::new("name", ValueKind::Text),
            ],
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidSchema { .. }));
    }

    #[test]
    fn version_introduced_must_be_non_decreasing() {
        let err = EntitySchema::new(
            "item",
            "items",
            vec![
                Property::new("id", ValueKind::I64)
                    .with_flags(PropertyFlags::PRIMARY_KEY | PropertyFlags::AUTO_GENERATED),
                Property::new("a", ValueKind::Text).introduced_at(2),
                Property::new("b", ValueKind::Text).introduced_at(1),
            ],
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidSchema { .. }));
    }

    #[test]
    fn resolves_properties_through_ancestor_chain() {
        let mut registry = SchemaRegistry::new();
        registry
            .register(
                EntitySchema::new(
                    "base",
                    "bases",
                    vec![
                        Property::new("id", ValueKind::I64)
                            .with_flags(PropertyFlags::PRIMARY_KEY | PropertyFlags::AUTO_GENERATED),
                        Property::new("created_at", ValueKind::Instant),
                    ],
                    None,
                )
                .unwrap(),
            )
            .unwrap();
        registry
            .register(
                EntitySchema::new(
                    "item",
                    "items",
                    vec![
                        Property::new("id", ValueKind::I64)
                            .with_flags(PropertyFlags::PRIMARY_KEY | PropertyFlags::AUTO_GENERATED),
                        Property::new("name", ValueKind::Text),
                    ],
                    Some("base"),
                )
                .unwrap(),
            )
            .unwrap();
        registry.finish().unwrap();

        let (owner, _) = registry.resolve("item", "name").unwrap();
        assert_eq!(owner.table, "items");
        let (owner, _) = registry.resolve("item", "created_at").unwrap();
        assert_eq!(owner.table, "bases");
        assert!(registry.resolve("item", "nonexistent").is_err());
    }

    #[test]
    fn finish_rejects_unknown_parent() {
        let mut registry = SchemaRegistry::new();
        registry
            .register(
                EntitySchema::new(
                    "item",
                    "items",
                    vec![Property::new("id", ValueKind::I64)
                        .with_flags(PropertyFlags::PRIMARY_KEY | PropertyFlags::AUTO_GENERATED)],
                    Some("missing"),
                )
                .unwrap(),
            )
            .unwrap();
        assert!(registry.finish().is_err());
    }
}
