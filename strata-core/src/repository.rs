use crate::{
    CREATED_AT, ConnectionExt, ConnectionHandle, Entity, EntityDef, Error, Operator, Query, Result,
    Value, entity::merge_values,
};

/// A thin finder/creator facade over [`Query`] for one entity type.
///
/// Stateless beyond the connection and the type tag: every operation builds
/// a fresh query.
pub struct Repository {
    connection: ConnectionHandle,
    def: &'static EntityDef,
}

impl Repository {
    pub fn new(connection: ConnectionHandle, def: &'static EntityDef) -> Self {
        Self { connection, def }
    }

    pub fn def(&self) -> &'static EntityDef {
        self.def
    }

    /// A fresh query against this repository's entity type.
    pub fn query(&self) -> Query {
        self.connection.query(self.def.name)
    }

    /// Fetch the record with the given primary key; zero rows is a
    /// not-found failure.
    pub async fn single(&self, id: i64) -> Result<Entity> {
        let mut stream = self
            .query()
            .filter(self.def.primary_key, Operator::Eq, id)
            .get()
            .await?;
        let not_found = || Error::NotFound {
            entity: self.def.name.to_owned(),
            key: id.to_string(),
        };
        match stream.next().await? {
            Some(item) => item.into_entity().ok_or_else(not_found),
            None => Err(not_found()),
        }
    }

    /// Insert a new record with the given values; the creation timestamp is
    /// injected unless the caller provided one. Yields the stored entity.
    pub async fn create<K, V>(&self, values: impl IntoIterator<Item = (K, V)>) -> Result<Entity>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let mut merged: Vec<(String, Value)> = vec![(CREATED_AT.to_owned(), Value::now())];
        merge_values(&mut merged, values);
        let mut stream = self.query().insert(merged).await?;
        match stream.next().await? {
            Some(item) => item.into_entity().ok_or_else(|| {
                Error::Execution(format!("insert into {} produced no entity", self.def.table))
            }),
            None => Err(Error::Execution(format!(
                "could not create {}",
                self.def.name
            ))),
        }
    }
}
