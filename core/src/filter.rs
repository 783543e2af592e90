//! Composable predicate trees that compile to parameterized SQL.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::schema::SchemaRegistry;
use crate::value::Value;

/// Comparison operators usable in a [Filter::Comparison] leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    Glob,
}

impl Operator {
    /// The SQL spelling. `Eq` emits `=`, not `==` — spec.md §9 flags the
    /// original's `==` as a likely-unintentional dialect quirk SQLite
    /// happens to accept; this implementation emits the standard form.
    fn sql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Neq => "!=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Like => "LIKE",
            Operator::Glob => "GLOB",
        }
    }
}

/// Polarity of a [Filter::NullCheck] leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullPolarity {
    IsNull,
    IsNotNull,
}

/// A table-name rewrite used to alias many-to-many join participants
/// (spec.md §4.3, §4.4.2). Keyed by `(entity_type, declared_table)`.
pub type TableRewriteMap = HashMap<(&'static str, &'static str), String>;

/// A composable, typed predicate tree (spec.md §3).
#[derive(Debug, Clone)]
pub enum Filter {
    Comparison {
        entity: &'static str,
        property: &'static str,
        op: Operator,
        value: Value,
    },
    NullCheck {
        entity: &'static str,
        property: &'static str,
        polarity: NullPolarity,
    },
    RawSql {
        sql: String,
        values: Vec<Value>,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(entity: &'static str, property: &'static str, value: Value) -> Filter {
        Filter::Comparison {
            entity,
            property,
            op: Operator::Eq,
            value,
        }
    }

    pub fn neq(entity: &'static str, property: &'static str, value: Value) -> Filter {
        Filter::Comparison {
            entity,
            property,
            op: Operator::Neq,
            value,
        }
    }

    pub fn gt(entity: &'static str, property: &'static str, value: Value) -> Filter {
        Filter::Comparison {
            entity,
            property,
            op: Operator::Gt,
            value,
        }
    }

    pub fn gte(entity: &'static str, property: &'static str, value: Value) -> Filter {
        Filter::Comparison {
            entity,
            property,
            op: Operator::Gte,
            value,
        }
    }

    pub fn lt(entity: &'static str, property: &'static str, value: Value) -> Filter {
        Filter::Comparison {
            entity,
            property,
            op: Operator::Lt,
            value,
        }
    }

    pub fn lte(entity: &'static str, property: &'static str, value: Value) -> Filter {
        Filter::Comparison {
            entity,
            property,
            op: Operator::Lte,
            value,
        }
    }

    pub fn like(entity: &'static str, property: &'static str, value: Value) -> Filter {
        Filter::Comparison {
            entity,
            property,
            op: Operator::Like,
            value,
        }
    }

    pub fn glob(entity: &'static str, property: &'static str, value: Value) -> Filter {
        Filter::Comparison {
            entity,
            property,
            op: Operator::Glob,
            value,
        }
    }

    pub fn is_null(entity: &'static str, property: &'static str) -> Filter {
        Filter::NullCheck {
            entity,
            property,
            polarity: NullPolarity::IsNull,
        }
    }

    pub fn is_not_null(entity: &'static str, property: &'static str) -> Filter {
        Filter::NullCheck {
            entity,
            property,
            polarity: NullPolarity::IsNotNull,
        }
    }

    pub fn sql(sql: impl Into<String>, values: Vec<Value>) -> Filter {
        Filter::RawSql {
            sql: sql.into(),
            values,
        }
    }

    /// Binary `AND`. Use [Filter::and_all] to combine more than two.
    pub fn and(self, other: Filter) -> Filter {
        Filter::And(vec![self, other])
    }

    /// Binary `OR`. Use [Filter::or_all] to combine more than two.
    pub fn or(self, other: Filter) -> Filter {
        Filter::Or(vec![self, other])
    }

    /// Variadic `AND`. Construction-time error if `children` is empty
    /// (spec.md §4.3).
    pub fn and_all(children: Vec<Filter>) -> Result<Filter> {
        if children.is_empty() {
            return Err(Error::EmptyFilterGroup("And"));
        }
        Ok(Filter::And(children))
    }

    /// Variadic `OR`. Construction-time error if `children` is empty.
    pub fn or_all(children: Vec<Filter>) -> Result<Filter> {
        if children.is_empty() {
            return Err(Error::EmptyFilterGroup("Or"));
        }
        Ok(Filter::Or(children))
    }

    /// Compiles this filter to a SQL fragment plus an ordered bind list,
    /// validating every leaf property against `registry` (spec.md §4.3).
    pub fn to_sql(
        &self,
        registry: &SchemaRegistry,
        rewrites: &TableRewriteMap,
    ) -> Result<(String, Vec<Value>)> {
        match self {
            Filter::Comparison {
                entity,
                property,
                op,
                value,
            } => {
                let table = owning_table(registry, rewrites, entity, property)?;
                let sql = format!("'{table}'.'{property}' {} ?", op.sql());
                Ok((sql, vec![value.clone()]))
            }
            Filter::NullCheck {
                entity,
                property,
                polarity,
            } => {
                let table = owning_table(registry, rewrites, entity, property)?;
                let clause = match polarity {
                    NullPolarity::IsNull => "IS NULL",
                    NullPolarity::IsNotNull => "IS NOT NULL",
                };
                Ok((format!("'{table}'.'{property}' {clause}"), Vec::new()))
            }
            Filter::RawSql { sql, values } => Ok((sql.clone(), values.clone())),
            Filter::And(children) => compile_group(registry, rewrites, children, "AND"),
            Filter::Or(children) => compile_group(registry, rewrites, children, "OR"),
        }
    }
}

fn owning_table(
    registry: &SchemaRegistry,
    rewrites: &TableRewriteMap,
    entity: &'static str,
    property: &'static str,
) -> Result<String> {
    let (owner, _prop) = registry.resolve(entity, property)?;
    let table = owner.table;
    Ok(rewrites
        .get(&(entity, table))
        .cloned()
        .unwrap_or_else(|| table.to_string()))
}

fn compile_group(
    registry: &SchemaRegistry,
    rewrites: &TableRewriteMap,
    children: &[Filter],
    joiner: &str,
) -> Result<(String, Vec<Value>)> {
    debug_assert!(!children.is_empty(), "empty And/Or must be rejected at construction");
    if children.len() == 1 {
        return children[0].to_sql(registry, rewrites);
    }
    let mut fragments = Vec::with_capacity(children.len());
    let mut binds = Vec::new();
    for child in children {
        let (sql, mut values) = child.to_sql(registry, rewrites)?;
        fragments.push(sql);
        binds.append(&mut values);
    }
    let joined = fragments.join(&format!(" {joiner} "));
    Ok((format!("({joined})"), binds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EntitySchema, Property, PropertyFlags};
    use crate::value::ValueKind;

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry
            .register(
                EntitySchema::new(
                    "episode",
                    "episodes",
                    vec![
                        Property::new("id", ValueKind::I64)
                            .with_flags(PropertyFlags::PRIMARY_KEY | PropertyFlags::AUTO_GENERATED),
                        Property::new("series_id", ValueKind::Text),
                        Property::new("season_number", ValueKind::I32),
                        Property::new("episode_name", ValueKind::Text),
                    ],
                    None,
                )
                .unwrap(),
            )
            .unwrap();
        registry.finish().unwrap();
        registry
    }

    #[test]
    fn eq_emits_standard_operator_not_double_equals() {
        let registry = registry();
        let filter = Filter::eq("episode", "series_id", Value::Text("84947".into()));
        let (sql, binds) = filter.to_sql(&registry, &TableRewriteMap::new()).unwrap();
        assert_eq!(sql, "'episodes'.'series_id' = ?");
        assert_eq!(binds, vec![Value::Text("84947".into())]);
    }

    #[test]
    fn null_check_emits_is_null_with_no_binds() {
        let registry = registry();
        let filter = Filter::is_null("episode", "episode_name");
        let (sql, binds) = filter.to_sql(&registry, &TableRewriteMap::new()).unwrap();
        assert_eq!(sql, "'episodes'.'episode_name' IS NULL");
        assert!(binds.is_empty());
    }

    #[test]
    fn and_parenthesizes_and_concatenates_binds_in_order() {
        let registry = registry();
        let filter = Filter::eq("episode", "series_id", Value::Text("84947".into()))
            .and(Filter::eq("episode", "season_number", Value::I32(5)));
        let (sql, binds) = filter.to_sql(&registry, &TableRewriteMap::new()).unwrap();
        assert_eq!(
            sql,
            "('episodes'.'series_id' = ? AND 'episodes'.'season_number' = ?)"
        );
        assert_eq!(binds, vec![Value::Text("84947".into()), Value::I32(5)]);
    }

    #[test]
    fn single_child_group_emits_child_unchanged() {
        let registry = registry();
        let filter = Filter::and_all(vec![Filter::eq(
            "episode",
            "series_id",
            Value::Text("x".into()),
        )])
        .unwrap();
        let (sql, _) = filter.to_sql(&registry, &TableRewriteMap::new()).unwrap();
        assert_eq!(sql, "'episodes'.'series_id' = ?");
    }

    #[test]
    fn empty_and_is_a_construction_error() {
        assert!(Filter::and_all(vec![]).is_err());
        assert!(Filter::or_all(vec![]).is_err());
    }

    #[test]
    fn unknown_property_is_rejected() {
        let registry = registry();
        let filter = Filter::eq("episode", "nope", Value::I32(1));
        assert!(filter.to_sql(&registry, &TableRewriteMap::new()).is_err());
    }

    #[test]
    fn placeholder_count_matches_bind_count() {
        let registry = registry();
        let filter = Filter::eq("episode", "series_id", Value::Text("x".into()))
            .and(Filter::eq("episode", "season_number", Value::I32(1)))
            .or(Filter::is_not_null("episode", "episode_name"));
        let (sql, binds) = filter.to_sql(&registry, &TableRewriteMap::new()).unwrap();
        assert_eq!(sql.matches('?').count(), binds.len());
    }

    #[test]
    fn raw_sql_passes_through_verbatim() {
        let registry = registry();
        let filter = Filter::sql("1 = 1", vec![]);
        let (sql, binds) = filter.to_sql(&registry, &TableRewriteMap::new()).unwrap();
        assert_eq!(sql, "1 = 1");
        assert!(binds.is_empty());
    }

    #[test]
    fn compilation_is_deterministic() {
        let registry = registry();
        let build = || {
            Filter::eq("episode", "series_id", Value::Text("84947".into()))
                .and(Filter::eq("episode", "season_number", Value::I32(5)))
        };
        let (sql1, binds1) = build().to_sql(&registry, &TableRewriteMap::new()).unwrap();
        let (sql2, binds2) = build().to_sql(&registry, &TableRewriteMap::new()).unwrap();
        assert_eq!(sql1, sql2);
        assert_eq!(binds1, binds2);
    }
}
