use crate::RedisStore;
use async_trait::async_trait;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use strata_core::{
    Connection, ConnectionHandle, EntityRegistry, Error, KvCommunicator, KvStore, Query, Result,
    ResultStream,
};

/// One Redis-backed connection plus the entity registry it hydrates against.
pub struct RedisConnection {
    store: Arc<RedisStore>,
    registry: Arc<EntityRegistry>,
    cache: Option<Arc<dyn KvStore>>,
    open: AtomicBool,
}

impl RedisConnection {
    /// Open `redis://[user:password@]host[:port][/db]`.
    pub async fn connect(url: &str, registry: Arc<EntityRegistry>) -> Result<ConnectionHandle> {
        let store = Arc::new(RedisStore::open(url).await?);
        Ok(Arc::new(Self {
            store,
            registry,
            cache: None,
            open: AtomicBool::new(true),
        }))
    }

    /// Like [`RedisConnection::connect`], with a secondary cache store that
    /// entity saves invalidate.
    pub async fn connect_cached(
        url: &str,
        registry: Arc<EntityRegistry>,
        cache: Arc<dyn KvStore>,
    ) -> Result<ConnectionHandle> {
        let store = Arc::new(RedisStore::open(url).await?);
        Ok(Arc::new(Self {
            store,
            registry,
            cache: Some(cache),
            open: AtomicBool::new(true),
        }))
    }

    /// The backing store, for direct inspection in tests.
    pub fn store(&self) -> Arc<RedisStore> {
        Arc::clone(&self.store)
    }
}

#[async_trait]
impl Connection for RedisConnection {
    fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    fn connected(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    async fn close(&self) -> Result<()> {
        // The multiplexed connection has no explicit hangup; dropping the
        // last clone ends it.
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
            .filter_map(|key| key.strip_suffix(":indices").map(|table| table.to_owned()))
            .collect())
    }

    fn cache(&self) -> Option<Arc<dyn KvStore>> {
        self.cache.clone()
    }
}
