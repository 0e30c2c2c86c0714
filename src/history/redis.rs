use async_trait::async_trait;
use crate::history::{ HistoryStore, StorageError };
use redis::aio::MultiplexedConnection;
use redis::{ Client, AsyncCommands };
use tokio::sync::OnceCell;

/// Stores the record as one Redis string under `<prefix><key>`.
pub struct RedisHistoryStore {
    client: Client,
    connection: OnceCell<MultiplexedConnection>,
    key: String,
    redis_key: String,
}

impl RedisHistoryStore {
    pub fn new(host: &str, prefix: &str, key: &str) -> Result<Self, StorageError> {
        Ok(Self {
            client: Client::open(host)?,
            connection: OnceCell::new(),
            key: key.to_string(),
            redis_key: format!("{}{}", prefix, key),
        })
    }

    /// Opens the multiplexed connection on first use and hands out clones of it.
    /// A failed attempt is not cached.
    async fn get_connection(&self) -> Result<MultiplexedConnection, redis::RedisError> {
        let conn = self.connection
            .get_or_try_init(|| self.client.get_multiplexed_async_connection()).await?;
        Ok(conn.clone())
    }
}

#[async_trait]
impl HistoryStore for RedisHistoryStore {
    fn key(&self) -> &str {
        &self.key
    }

    async fn read_blob(&self) -> Result<Option<String>, StorageError> {
        let mut conn = self.get_connection().await?;
        let blob: Option<String> = conn.get(&self.redis_key).await?;
        Ok(blob)
    }

    async fn write_blob(&self, blob: &str) -> Result<(), StorageError> {
        let mut conn = self.get_connection().await?;
        let _: () = conn.set(&self.redis_key, blob).await?;
        Ok(())
    }

    async fn remove_blob(&self) -> Result<(), StorageError> {
        let mut conn = self.get_connection().await?;
        let _: i64 = conn.del(&self.redis_key).await?;
        Ok(())
    }
}
