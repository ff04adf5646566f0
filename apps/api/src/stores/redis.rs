use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::stores::{KvEntry, RecordStore, StoreError};

/// RecordStore backed by Redis. Prefix listing is a SCAN with a `<prefix>*`
/// MATCH pattern followed by per-key GETs, so a key deleted mid-scan is
/// simply absent from the result rather than an error.
pub struct RedisRecordStore {
    client: redis::Client,
}

impl RedisRecordStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::Backend(format!("Redis connection failed: {e}")))
    }
}

#[async_trait]
impl RecordStore for RedisRecordStore {
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut con = self.connection().await?;
        con.set::<_, _, ()>(key, value)
            .await
            .map_err(|e| StoreError::Backend(format!("Redis SET failed: {e}")))
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut con = self.connection().await?;
        con.get::<_, Option<String>>(key)
            .await
            .map_err(|e| StoreError::Backend(format!("Redis GET failed: {e}")))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<KvEntry>, StoreError> {
        let pattern = format!("{prefix}*");

        let mut scan_con = self.connection().await?;
        let mut keys = Vec::new();
        {
            let mut iter: redis::AsyncIter<'_, String> = scan_con
                .scan_match(&pattern)
                .await
                .map_err(|e| StoreError::Backend(format!("Redis SCAN failed: {e}")))?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }

        let mut con = self.connection().await?;
        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            let value: Option<String> = con
                .get(&key)
                .await
                .map_err(|e| StoreError::Backend(format!("Redis GET failed: {e}")))?;
            if let Some(value) = value {
                entries.push(KvEntry { key, value });
            }
        }

        Ok(entries)
    }
}
