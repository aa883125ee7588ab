use crate::{SqliteDriver, SqliteSqlWriter};
use async_trait::async_trait;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use strata_core::{
    Connection, EntityRegistry, Error, KvStore, Query, Result, ResultStream, RowsAffected,
    SqlCommunicator, SqlDriver,
};

const URL_PREFIX: &str = "sqlite://";

/// One open SQLite handle plus the entity registry it hydrates against.
pub struct SqliteConnection {
    driver: Arc<SqliteDriver>,
    registry: Arc<EntityRegistry>,
    cache: Option<Arc<dyn KvStore>>,
    open: AtomicBool,
}

impl SqliteConnection {
    /// Open `sqlite://<path>`; an empty path or `:memory:` opens an
    /// in-memory database.
    pub async fn connect(url: &str, registry: Arc<EntityRegistry>) -> Result<Arc<Self>> {
        Self::establish(url, registry, None)
    }

    /// Like [`SqliteConnection::connect`], with a secondary cache store that
    /// entity saves invalidate.
    pub async fn connect_cached(
        url: &str,
        registry: Arc<EntityRegistry>,
        cache: Arc<dyn KvStore>,
    ) -> Result<Arc<Self>> {
        Self::establish(url, registry, Some(cache))
    }

    fn establish(
        url: &str,
        registry: Arc<EntityRegistry>,
        cache: Option<Arc<dyn KvStore>>,
    ) -> Result<Arc<Self>> {
        let Some(path) = url.strip_prefix(URL_PREFIX) else {
            return Err(Error::Connection(format!(
                "expected sqlite connection url to start with `{URL_PREFIX}`"
            )));
        };
        Ok(Arc::new(Self {
            driver: Arc::new(SqliteDriver::open(path)?),
            registry,
            cache,
            open: AtomicBool::new(true),
        }))
    }

    /// Run one raw statement. Escape hatch for schema setup and migrations;
    /// everything else goes through the query model.
    pub async fn execute_raw(&self, sql: &str) -> Result<RowsAffected> {
        self.driver.execute(sql.to_owned(), Vec::new()).await
    }

    fn communicator(&self) -> SqlCommunicator {
        SqlCommunicator::new(
            Arc::clone(&self.driver) as Arc<dyn SqlDriver>,
            Arc::new(SqliteSqlWriter),
        )
    }
}

#[async_trait]
impl Connection for SqliteConnection {
    fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    fn connected(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    async fn close(&self) -> Result<()> {
        self.open.store(false, Ordering::Release);
        self.driver.close();
        Ok(())
    }

    async fn run(&self, query: Query) -> Result<ResultStream> {
        if !self.connected() {
            return Err(Error::Connection("connection is closed".into()));
        }
        self.communicator().execute(query).await
    }

    async fn tables(&self) -> Result<Vec<String>> {
        self.driver.tables().await
    }

    fn cache(&self) -> Option<Arc<dyn KvStore>> {
        self.cache.clone()
    }
}
