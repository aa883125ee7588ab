use crate::{Error, Result};
use std::collections::HashMap;

/// Direction of a declared relationship edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// Rows of the target table carry this entity's primary-key column as a
    /// foreign key.
    Children,
    /// This entity carries the target's primary-key column as a foreign key.
    Parent,
}

/// One declared relationship accessor of an entity type.
///
/// Every navigable edge is declared here, once; nothing is discovered by
/// runtime introspection.
#[derive(Debug)]
pub struct RelationDef {
    pub accessor: &'static str,
    pub kind: RelationKind,
    pub target: &'static str,
}

/// Explicit schema description of one entity type.
///
/// `properties` lists the declared attribute columns; the primary key and the
/// audit columns (`created_at`, `updated_at`) are implicit and always
/// retained at hydration.
#[derive(Debug)]
pub struct EntityDef {
    pub name: &'static str,
    pub table: &'static str,
    pub primary_key: &'static str,
    pub properties: &'static [&'static str],
    pub relations: &'static [RelationDef],
}

pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";

impl EntityDef {
    /// Whether a (lower-cased) attribute key survives hydration.
    pub fn retains(&self, key: &str) -> bool {
        key == self.primary_key
            || key == CREATED_AT
            || key == UPDATED_AT
            || self.properties.iter().any(|p| *p == key)
    }

    pub fn relation(&self, accessor: &str) -> Option<&'static RelationDef> {
        self.relations.iter().find(|r| r.accessor == accessor)
    }
}

/// Mapping from type name to entity definition, built once at startup and
/// shared with every connection. Communicators hydrate rows through the def
/// resolved at query-build time; nothing is looked up per row.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    types: HashMap<&'static str, &'static EntityDef>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, def: &'static EntityDef) -> Self {
        self.types.insert(def.name, def);
        self
    }

    pub fn get(&self, name: &str) -> Option<&'static EntityDef> {
        self.types.get(name).copied()
    }

    /// Resolve a name that must be an entity type.
    pub fn expect(&self, name: &str) -> Result<&'static EntityDef> {
        self.get(name)
            .ok_or_else(|| Error::InvalidEntityType(name.into()))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
