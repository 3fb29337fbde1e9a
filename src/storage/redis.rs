use crate::storage::{Result, Storage};
use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};

/// A Redis storage backend.
#[derive(Clone)]
pub struct RedisStorage {
    conn: ConnectionManager,
}

impl RedisStorage {
    /// Creates a new Redis storage backend from a connection manager.
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl Storage for RedisStorage {
    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let mut suffixes = Vec::new();
        {
            let mut iter: redis::AsyncIter<'_, String> =
                conn.scan_match(format!("{prefix}*")).await?;
            while let Some(item) = iter.next_item().await {
                let key = item?;
                if let Some(suffix) = key.strip_prefix(prefix) {
                    suffixes.push(suffix.to_string());
                }
            }
        }
        Ok(suffixes)
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let value = conn.get(key).await?;
        Ok(value)
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }
}
