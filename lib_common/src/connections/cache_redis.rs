//! # Redis Cache Backend
//!
//! Implements the cache backend contract over a shared Redis instance using
//! a `ConnectionManager`, which transparently reconnects after transient
//! connection loss. This is the backend to run once more than one gateway
//! instance shares the cache.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::cache_store::CacheBackend;

/// Redis-backed implementation of [`CacheBackend`].
pub struct RedisBackend {
    manager: ConnectionManager,
}

impl RedisBackend {
    /// Connects to a Redis server.
    ///
    /// # Arguments
    /// * `url` - The redis URL (e.g., "redis://127.0.0.1/").
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        let manager = client.get_connection_manager().await?;
        log::info!("Connected to Redis at {}", url);
        Ok(Self { manager })
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> anyhow::Result<()> {
        let mut conn = self.manager.clone();
        let _: () = conn.set_ex(key, value, ttl_secs).await?;
        Ok(())
    }

    async fn del(&self, key: &str) -> anyhow::Result<()> {
        let mut conn = self.manager.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> anyhow::Result<bool> {
        let mut conn = self.manager.clone();
        let found: bool = conn.exists(key).await?;
        Ok(found)
    }

    async fn ttl(&self, key: &str) -> anyhow::Result<i64> {
        let mut conn = self.manager.clone();
        let ttl: i64 = conn.ttl(key).await?;
        // Redis reports -2 for an absent key; the contract is -1.
        Ok(ttl.max(-1))
    }

    async fn keys(&self, pattern: &str) -> anyhow::Result<Vec<String>> {
        let mut conn = self.manager.clone();
        let keys: Vec<String> = conn.keys(pattern).await?;
        Ok(keys)
    }
}
