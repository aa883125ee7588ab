use async_trait::async_trait;
use redis::{AsyncCommands, aio::MultiplexedConnection};
use strata_core::{Error, KvStore, Result};

/// The Redis end of the key-value contract, over one multiplexed
/// connection.
///
/// `map_get_all` treats a missing key, an empty hash and a key of the wrong
/// type (`WRONGTYPE`) all as "no field map here": table scans walk every
/// key matching `<table>:*`, which includes the index set, and must step
/// over it.
#[derive(Clone)]
pub struct RedisStore {
    connection: MultiplexedConnection,
}

impl RedisStore {
    pub async fn open(url: &str) -> Result<Self> {
        let client =
            redis::Client::open(url).map_err(|e| Error::Connection(e.to_string()))?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;
        log::debug!("connected to {url}");
        Ok(Self { connection })
    }
}

fn execution(error: redis::RedisError) -> Error {
    Error::Execution(error.to_string())
}

#[async_trait]
impl KvStore for RedisStore {
    async fn set_add(&self, key: &str, member: &str) -> Result<()> {
        let mut connection = self.connection.clone();
        connection
            .sadd::<_, _, ()>(key, member)
            .await
            .map_err(execution)
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<()> {
        let mut connection = self.connection.clone();
        connection
            .srem::<_, _, ()>(key, member)
            .await
            .map_err(execution)
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        let mut connection = self.connection.clone();
        connection.smembers(key).await.map_err(execution)
    }

    async fn map_set(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let mut connection = self.connection.clone();
        connection
            .hset::<_, _, _, ()>(key, field, value)
            .await
            .map_err(execution)
    }

    async fn map_set_all(&self, key: &str, entries: &[(String, String)]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut connection = self.connection.clone();
        connection
            .hset_multiple::<_, _, _, ()>(key, entries)
            .await
            .map_err(execution)
    }

    async fn map_get_all(&self, key: &str) -> Result<Option<Vec<(String, String)>>> {
        let mut connection = self.connection.clone();
        match connection.hgetall::<_, Vec<(String, String)>>(key).await {
            Ok(entries) if entries.is_empty() => Ok(None),
            Ok(entries) => Ok(Some(entries)),
            Err(e) if e.code() == Some("WRONGTYPE") => Ok(None),
            Err(e) => Err(execution(e)),
        }
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut connection = self.connection.clone();
        connection.keys(pattern).await.map_err(execution)
    }

    async fn delete(&self, keys: Vec<String>) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut connection = self.connection.clone();
        connection.del(keys).await.map_err(execution)
    }
}
