use crate::{
    Connection, ConnectionHandle, EntityRegistry, Error, KvCommunicator, KvStore, Query, Result,
    ResultStream, key_matches,
};
use async_trait::async_trait;
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{
        Arc, RwLock,
        atomic::{AtomicBool, Ordering},
    },
};

#[derive(Debug, Clone)]
enum Slot {
    Map(Vec<(String, String)>),
    Set(BTreeSet<String>),
}

/// In-process key-value backend.
///
/// Implements the full [`KvStore`] contract over a `BTreeMap`, so the
/// engine's key-value path can be exercised deterministically without a
/// server; the natural key-enumeration order is the map's lexicographic key
/// order. Also usable as a cache store for connections.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: RwLock<BTreeMap<String, Slot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Slot>> {
        self.slots.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, Slot>> {
        self.slots.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Whether any slot lives under this key. Test hook.
    pub fn contains(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn set_add(&self, key: &str, member: &str) -> Result<()> {
        let mut slots = self.write();
        match slots
            .entry(key.to_owned())
            .or_insert_with(|| Slot::Set(BTreeSet::new()))
        {
            Slot::Set(members) => {
                members.insert(member.to_owned());
                Ok(())
            }
            Slot::Map(..) => Err(Error::Execution(format!("{key} does not hold a set"))),
        }
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<()> {
        let mut slots = self.write();
        if let Some(Slot::Set(members)) = slots.get_mut(key) {
            members.remove(member);
        }
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        Ok(match self.read().get(key) {
            Some(Slot::Set(members)) => members.iter().cloned().collect(),
            _ => Vec::new(),
        })
    }

    async fn map_set(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let mut slots = self.write();
        match slots
            .entry(key.to_owned())
            .or_insert_with(|| Slot::Map(Vec::new()))
        {
            Slot::Map(entries) => {
                match entries.iter_mut().find(|(f, _)| f == field) {
                    Some(entry) => entry.1 = value.to_owned(),
                    None => entries.push((field.to_owned(), value.to_owned())),
                }
                Ok(())
            }
            Slot::Set(..) => Err(Error::Execution(format!("{key} does not hold a field map"))),
        }
    }

    async fn map_set_all(&self, key: &str, entries: &[(String, String)]) -> Result<()> {
        for (field, value) in entries {
            self.map_set(key, field, value).await?;
        }
        Ok(())
    }

    async fn map_get_all(&self, key: &str) -> Result<Option<Vec<(String, String)>>> {
        Ok(match self.read().get(key) {
            Some(Slot::Map(entries)) if !entries.is_empty() => Some(entries.clone()),
            _ => None,
        })
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        Ok(self
            .read()
            .keys()
            .filter(|key| key_matches(pattern, key))
            .cloned()
            .collect())
    }

    async fn delete(&self, keys: Vec<String>) -> Result<u64> {
        let mut slots = self.write();
        Ok(keys
            .iter()
            .filter(|key| slots.remove(key.as_str()).is_some())
            .count() as u64)
    }
}

/// A connection over a [`MemoryStore`], the in-process rendition of the
/// key-value backend.
pub struct MemoryConnection {
    store: Arc<MemoryStore>,
    registry: Arc<EntityRegistry>,
    cache: Option<Arc<dyn KvStore>>,
    open: AtomicBool,
}

impl MemoryConnection {
    pub fn connect(registry: Arc<EntityRegistry>) -> ConnectionHandle {
        Arc::new(Self::with_store(Arc::new(MemoryStore::new()), registry))
    }

    pub fn with_store(store: Arc<MemoryStore>, registry: Arc<EntityRegistry>) -> Self {
        Self {
            store,
            registry,
            cache: None,
            open: AtomicBool::new(true),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn KvStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// The backing store, for direct inspection in tests.
    pub fn store(&self) -> Arc<MemoryStore> {
        Arc::clone(&self.store)
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    fn connected(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    async fn close(&self) -> Result<()> {
        self.open.store(false, Ordering::Release);
        Ok(())
    }

    async fn run(&self, query: Query) -> Result<ResultStream> {
        if !self.connected() {
            return Err(Error::Connection("connection is closed".into()));
        }
        KvCommunicator::new(Arc::clone(&self.store) as Arc<dyn KvStore>)
            .execute(query)
            .await
    }

    async fn tables(&self) -> Result<Vec<String>> {
        Ok(self
            .store
            .keys("*:indices")
            .await?
            .into_iter()
            .filter_map(|key| {
                key.strip_suffix(":indices")
                    .map(|table| table.to_owned())
            })
            .collect())
    }

    fn cache(&self) -> Option<Arc<dyn KvStore>> {
        self.cache.clone()
    }
}
