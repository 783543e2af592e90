//! Ordered lists of `(entity, property, direction)` terms compiling to
//! `ORDER BY` clauses.

use crate::error::Result;
use crate::filter::TableRewriteMap;
use crate::schema::SchemaRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy)]
pub struct SortTerm {
    pub entity: &'static str,
    pub property: &'static str,
    pub direction: Direction,
}

/// An ordered, possibly-empty list of sort terms (spec.md §3: "non-empty"
/// refers to a single constructed [Sorting]'s intent, not this wrapper —
/// an empty [Sorting] is the "no ORDER BY requested" state and is valid).
#[derive(Debug, Clone, Default)]
pub struct Sorting {
    terms: Vec<SortTerm>,
}

impl Sorting {
    pub fn new(terms: Vec<SortTerm>) -> Self {
        Self { terms }
    }

    pub fn term(
        mut self,
        entity: &'static str,
        property: &'static str,
        direction: Direction,
    ) -> Self {
        self.terms.push(SortTerm {
            entity,
            property,
            direction,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Compiles to an `ORDER BY`-body fragment (no `ORDER BY` keyword),
    /// or an empty string when there are no terms (spec.md §4.3).
    pub fn to_sql(&self, registry: &SchemaRegistry, rewrites: &TableRewriteMap) -> Result<String> {
        let mut parts = Vec::with_capacity(self.terms.len());
        for term in &self.terms {
            let (owner, _prop) = registry.resolve(term.entity, term.property)?;
            let table = rewrites
                .get(&(term.entity, owner.table))
                .cloned()
                .unwrap_or_else(|| owner.table.to_string());
            let mut fragment = format!("'{table}'.'{}'", term.property);
            if term.direction == Direction::Descending {
                fragment.push_str(" DESC");
            }
            parts.push(fragment);
        }
        Ok(parts.join(", "))
    }
}
