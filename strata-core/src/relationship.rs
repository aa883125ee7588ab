use crate::{Entity, Error, Query, Result, ResultStream, Value};
use std::fmt::{self, Display};

/// A deferred query bound to an owning entity: a navigable one-to-many or
/// many-to-one edge, materialized only when traversed.
pub struct Relationship {
    query: Query,
    owner_type: &'static str,
    owner_table: &'static str,
    owner_id: i64,
}

impl Relationship {
    pub fn new(query: Query, owner: &Entity) -> Self {
        Self {
            query,
            owner_type: owner.def().name,
            owner_table: owner.def().table,
            owner_id: owner.id(),
        }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn owner_type(&self) -> &'static str {
        self.owner_type
    }

    /// Materialize the edge as a stream of related records.
    pub async fn all(self) -> Result<ResultStream> {
        self.query.get().await
    }

    /// Materialize exactly one related record; zero rows is a not-found
    /// failure.
    pub async fn one(self) -> Result<Entity> {
        let target = self
            .query
            .target()
            .def()
            .map(|def| def.name)
            .unwrap_or("row")
            .to_owned();
        let mut stream = self.query.get().await?;
        match stream.next().await? {
            Some(item) => item.into_entity().ok_or_else(|| Error::NotFound {
                entity: target.clone(),
                key: format!("relationship of {} {}", self.owner_type, self.owner_id),
            }),
            None => Err(Error::NotFound {
                entity: target,
                key: format!("relationship of {} {}", self.owner_type, self.owner_id),
            }),
        }
    }

    /// Null the foreign key named after the parent's primary key on every
    /// related row and save each one. An eager, non-transactional cascade.
    pub async fn detach(self, parent: &Entity) -> Result<()> {
        let foreign_key = parent.def().primary_key;
        let mut rows = self.query.get().await?;
        while let Some(item) = rows.next().await? {
            if let Some(mut entity) = item.into_entity() {
                entity.set(foreign_key, Value::Null);
                entity.save().await;
            }
        }
        Ok(())
    }
}

impl Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Relationship({}[{}] -> {}[{}])",
            self.owner_type,
            self.owner_table,
            self.query
                .target()
                .def()
                .map(|def| def.name)
                .unwrap_or("row"),
            self.query.target().table(),
        )
    }
}
