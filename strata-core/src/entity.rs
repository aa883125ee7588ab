use crate::{
    CREATED_AT, Connection, ConnectionExt, ConnectionHandle, EntityDef, Error, Operator,
    RelationKind, Relationship, Result, RowLabeled, UPDATED_AT, Value,
};
use std::{
    collections::BTreeMap,
    hash::{DefaultHasher, Hash, Hasher},
    ops::{Deref, DerefMut},
    sync::Weak,
};

/// A hydrated record: an attribute map, a dirty flag and a non-owning
/// reference to the connection it came from.
///
/// Attribute keys are lower-cased at construction and filtered against the
/// entity's declared property set; the primary key, once hydrated, is
/// immutable identity. Mutating an attribute arms the dirty flag; `save`
/// round-trips the full attribute map as a primary-key-scoped update.
pub struct Entity {
    def: &'static EntityDef,
    attributes: BTreeMap<String, Value>,
    dirty: bool,
    connection: Weak<dyn Connection>,
}

impl Entity {
    /// Materialize a row into an entity bound to its originating connection.
    /// Unknown columns are dropped; keys are lower-cased.
    pub fn hydrate(def: &'static EntityDef, connection: &ConnectionHandle, row: RowLabeled) -> Self {
        let attributes = row
            .iter()
            .map(|(label, value)| (label.to_lowercase(), value.clone()))
            .filter(|(label, _)| def.retains(label))
            .collect();
        Self {
            def,
            attributes,
            dirty: false,
            connection: std::sync::Arc::downgrade(connection),
        }
    }

    pub fn def(&self) -> &'static EntityDef {
        self.def
    }

    /// Primary-key identity; 0 when the key is absent or non-numeric.
    pub fn id(&self) -> i64 {
        self.attributes
            .get(self.def.primary_key)
            .and_then(Value::as_integer)
            .unwrap_or(0)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(&key.to_lowercase())
    }

    /// Set an attribute and arm the dirty flag on actual change. Unknown
    /// columns and the primary key are ignored.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        let key = key.to_lowercase();
        if !self.def.retains(&key) || key == self.def.primary_key {
            return;
        }
        let value = value.into();
        if self.attributes.get(&key) != Some(&value) {
            self.attributes.insert(key, value);
            self.dirty = true;
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    /// Cache entry key for this record: a hash of (type name, id).
    pub fn cache_key(&self) -> String {
        let mut hasher = DefaultHasher::new();
        self.def.name.hash(&mut hasher);
        self.id().hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }

    fn connection(&self) -> Result<ConnectionHandle> {
        let connection = self
            .connection
            .upgrade()
            .ok_or_else(|| Error::Connection("connection is gone".into()))?;
        if !connection.connected() {
            return Err(Error::Connection("connection is closed".into()));
        }
        Ok(connection)
    }

    /// Persist in-memory changes as an update scoped to this entity's
    /// primary key, then invalidate the cache entry if a cache store is
    /// configured. Failures are logged, not propagated; callers that need
    /// the outcome use [`Entity::persist`].
    pub async fn save(&mut self) {
        if let Err(error) = self.persist().await {
            log::error!("failed to save {} {}: {}", self.def.name, self.id(), error);
        }
    }

    /// Fallible form of [`Entity::save`].
    pub async fn persist(&mut self) -> Result<()> {
        let connection = self.connection()?;
        self.attributes.insert(UPDATED_AT.into(), Value::now());
        let fields: Vec<(String, Value)> = self
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        connection
            .query(self.def.name)
            .update(fields, Some(&*self))
            .execute()
            .await?;
        self.dirty = false;
        if let Some(cache) = connection.cache() {
            cache.delete(vec![self.cache_key()]).await?;
        }
        Ok(())
    }

    /// Delete this record, then cascade over every declared child relation,
    /// detaching related rows (their foreign key is nulled and each is
    /// saved). Eager and non-transactional.
    pub async fn delete(self) -> Result<()> {
        let connection = self.connection()?;
        connection
            .query(self.def.name)
            .filter(self.def.primary_key, Operator::Eq, self.id())
            .delete()
            .execute()
            .await?;
        for relation in self.def.relations {
            if relation.kind == RelationKind::Children {
                self.children(relation.target)?.detach(&self).await?;
            }
        }
        Ok(())
    }

    /// Deferred query for rows of `target` carrying this entity's primary
    /// key as a foreign key.
    pub fn children(&self, target: &str) -> Result<Relationship> {
        let connection = self.connection()?;
        let def = connection.registry().expect(target)?;
        let query = connection
            .query(def.name)
            .filter(self.def.primary_key, Operator::Eq, self.id());
        Ok(Relationship::new(query, self))
    }

    /// Deferred query for the row of `target` this entity points at through
    /// the target's primary-key column.
    pub fn parent(&self, target: &str) -> Result<Relationship> {
        let connection = self.connection()?;
        let def = connection.registry().expect(target)?;
        let foreign = self
            .attributes
            .get(def.primary_key)
            .cloned()
            .unwrap_or(Value::Null);
        let query = connection
            .query(def.name)
            .filter(def.primary_key, Operator::Eq, foreign);
        Ok(Relationship::new(query, self))
    }

    /// Every declared relationship of this entity's type, as deferred
    /// queries.
    pub fn relationships(&self) -> Result<Vec<Relationship>> {
        self.def
            .relations
            .iter()
            .map(|relation| match relation.kind {
                RelationKind::Children => self.children(relation.target),
                RelationKind::Parent => self.parent(relation.target),
            })
            .collect()
    }

    /// Point this entity at `other` by setting the foreign-key attribute
    /// named after `other`'s primary key, and persist immediately.
    pub async fn attach(&mut self, other: &Entity) -> Result<()> {
        self.set(other.def().primary_key, other.id());
        self.persist().await
    }

    /// Create a row of `target` owned by this entity: the foreign key and
    /// the creation timestamp are injected, caller values win on collision.
    pub async fn create_related<K, V>(
        &self,
        target: &str,
        values: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Entity>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let connection = self.connection()?;
        let def = connection.registry().expect(target)?;
        let mut merged: Vec<(String, Value)> = vec![
            (self.def.primary_key.to_owned(), self.id().into()),
            (CREATED_AT.to_owned(), Value::now()),
        ];
        merge_values(&mut merged, values);
        let mut stream = connection.query(def.name).insert(merged).await?;
        match stream.next().await? {
            Some(item) => item.into_entity().ok_or_else(|| {
                Error::Execution(format!("insert into {} produced no entity", def.table))
            }),
            None => Err(Error::Execution(format!(
                "could not create {} related to {} {}",
                def.name,
                self.def.name,
                self.id(),
            ))),
        }
    }
}

/// Append key/value pairs, replacing any default with the same key.
pub(crate) fn merge_values<K, V>(
    merged: &mut Vec<(String, Value)>,
    values: impl IntoIterator<Item = (K, V)>,
) where
    K: Into<String>,
    V: Into<Value>,
{
    for (key, value) in values {
        let (key, value) = (key.into(), value.into());
        match merged.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => merged.push((key, value)),
        }
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity")
            .field("type", &self.def.name)
            .field("attributes", &self.attributes)
            .field("dirty", &self.dirty)
            .finish()
    }
}

/// Scoped flush of pending entity changes.
///
/// Obtain a guard alongside a hydrated entity, mutate through it, and call
/// [`SaveGuard::release`] on every exit path: the release flushes if the
/// entity is still dirty and hands it back. Dropping an armed guard performs
/// no I/O; it logs a warning so a lost update is never silent.
pub struct SaveGuard {
    entity: Option<Entity>,
}

impl SaveGuard {
    pub fn new(entity: Entity) -> Self {
        Self {
            entity: Some(entity),
        }
    }

    /// Flush pending changes if still armed and return the entity.
    pub async fn release(mut self) -> Entity {
        let mut entity = self.entity.take().expect("guard released twice");
        if entity.is_dirty() {
            entity.save().await;
        }
        entity
    }

    /// Disarm without flushing; pending changes stay in memory only.
    pub fn into_inner(mut self) -> Entity {
        self.entity.take().expect("guard released twice")
    }
}

impl Deref for SaveGuard {
    type Target = Entity;

    fn deref(&self) -> &Entity {
        self.entity.as_ref().expect("guard released")
    }
}

impl DerefMut for SaveGuard {
    fn deref_mut(&mut self) -> &mut Entity {
        self.entity.as_mut().expect("guard released")
    }
}

impl Drop for SaveGuard {
    fn drop(&mut self) {
        if let Some(entity) = &self.entity {
            if entity.is_dirty() {
                log::warn!(
                    "{} {} dropped with unsaved changes",
                    entity.def().name,
                    entity.id(),
                );
            }
        }
    }
}
