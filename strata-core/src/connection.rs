use crate::{EntityRegistry, KvStore, Query, Repository, Result, ResultStream, Target};
use async_trait::async_trait;
use std::sync::Arc;

/// One open backend handle.
///
/// Object-safe so queries and entities can hold a backend-agnostic reference;
/// the concrete type decides which communicator translates a query. One
/// connection maps to exactly one underlying handle; there is no pooling.
#[async_trait]
pub trait Connection: Send + Sync {
    fn registry(&self) -> &EntityRegistry;

    fn connected(&self) -> bool;

    /// Close the underlying handle. Executing afterwards is a connection
    /// failure; already-hydrated entities keep their data but can no longer
    /// round-trip.
    async fn close(&self) -> Result<()>;

    /// Translate and execute a built query, returning its lazy result stream.
    async fn run(&self, query: Query) -> Result<ResultStream>;

    /// Names of the tables currently present in the store.
    async fn tables(&self) -> Result<Vec<String>>;

    /// Optional secondary cache store invalidated on entity saves.
    fn cache(&self) -> Option<Arc<dyn KvStore>> {
        None
    }
}

/// Shared handle to a live connection. Queries hold one of these; entities
/// hold a `Weak` form of it so an entity never keeps a connection alive.
pub type ConnectionHandle = Arc<dyn Connection>;

/// Query construction entry points on a shared connection handle.
pub trait ConnectionExt {
    /// Start a query against an entity type name or a raw table name.
    fn query(&self, target: &str) -> Query;

    /// Repository facade for a registered entity type.
    fn repository(&self, entity: &str) -> Result<Repository>;
}

impl ConnectionExt for ConnectionHandle {
    fn query(&self, target: &str) -> Query {
        let resolved = match self.registry().get(target) {
            Some(def) => Target::Entity(def),
            None => Target::Table(target.into()),
        };
        Query::new(Arc::clone(self), resolved)
    }

    fn repository(&self, entity: &str) -> Result<Repository> {
        let def = self.registry().expect(entity)?;
        Ok(Repository::new(Arc::clone(self), def))
    }
}
