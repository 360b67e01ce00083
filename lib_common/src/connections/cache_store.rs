//! # Cache Store
//!
//! A key/value cache with TTLs and pattern-based key enumeration. All keys
//! are transparently namespaced with a fixed prefix before touching the
//! backend, and the prefix is stripped again on the way out, so unrelated
//! consumers sharing the same store cannot collide with ours.
//!
//! The cache is advisory, never a correctness dependency: every backend
//! failure is swallowed and logged, degrading reads to a miss and writes to
//! a no-op.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

/// Namespace prepended to every key before it reaches the backend.
const KEY_PREFIX: &str = "enroute:";

/// Default TTL for entries stored without an explicit lifetime.
pub const DEFAULT_TTL_SECS: u64 = 3600;

/// The primitives a backing store must provide. A TTL-aware hash map
/// satisfies this for a single-process deployment; a shared out-of-process
/// store (Redis) is required once more than one gateway instance runs.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Fetches the raw serialized value for a key.
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    /// Stores a raw value with a TTL in seconds.
    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> anyhow::Result<()>;
    /// Removes a key.
    async fn del(&self, key: &str) -> anyhow::Result<()>;
    /// Checks whether a key exists.
    async fn exists(&self, key: &str) -> anyhow::Result<bool>;
    /// Remaining TTL in seconds, or -1 when the key is absent.
    async fn ttl(&self, key: &str) -> anyhow::Result<i64>;
    /// Enumerates keys matching a glob-style pattern (`*` wildcard).
    async fn keys(&self, pattern: &str) -> anyhow::Result<Vec<String>>;
}

/// The namespaced cache facade used by the enrichment pipeline.
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
}

impl CacheStore {
    /// Wraps a backend in the namespacing, error-swallowing facade.
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    fn prefixed(key: &str) -> String {
        format!("{}{}", KEY_PREFIX, key)
    }

    fn strip_prefix(key: &str) -> &str {
        key.strip_prefix(KEY_PREFIX).unwrap_or(key)
    }

    /// Fetches and deserializes a value. Backend failures and values that no
    /// longer parse are both treated as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.backend.get(&Self::prefixed(key)).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(err) => {
                    log::error!("Cache value for key '{}' failed to parse: {}", key, err);
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                log::error!("Error getting cache key '{}': {}", key, err);
                None
            }
        }
    }

    /// Serializes and stores a value with a TTL. Failures are logged no-ops.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) {
        let serialized = match serde_json::to_string(value) {
            Ok(serialized) => serialized,
            Err(err) => {
                log::error!("Error serializing cache value for key '{}': {}", key, err);
                return;
            }
        };
        if let Err(err) = self.backend.set(&Self::prefixed(key), &serialized, ttl_secs).await {
            log::error!("Error setting cache key '{}': {}", key, err);
        }
    }

    /// Removes a key. Failures are logged no-ops.
    pub async fn delete(&self, key: &str) {
        if let Err(err) = self.backend.del(&Self::prefixed(key)).await {
            log::error!("Error deleting cache key '{}': {}", key, err);
        }
    }

    /// Whether a key currently exists. `false` on backend failure.
    pub async fn exists(&self, key: &str) -> bool {
        match self.backend.exists(&Self::prefixed(key)).await {
            Ok(found) => found,
            Err(err) => {
                log::error!("Error checking cache key '{}': {}", key, err);
                false
            }
        }
    }

    /// Remaining TTL in seconds, or -1 when absent or on backend failure.
    pub async fn time_to_live(&self, key: &str) -> i64 {
        match self.backend.ttl(&Self::prefixed(key)).await {
            Ok(ttl) => ttl,
            Err(err) => {
                log::error!("Error getting TTL for cache key '{}': {}", key, err);
                -1
            }
        }
    }

    /// Enumerates keys under our namespace matching a glob pattern. The
    /// namespace prefix is stripped from every returned key. Empty on
    /// backend failure.
    pub async fn keys_matching(&self, pattern: &str) -> Vec<String> {
        match self.backend.keys(&Self::prefixed(pattern)).await {
            Ok(keys) => keys
                .iter()
                .map(|key| Self::strip_prefix(key).to_string())
                .collect(),
            Err(err) => {
                log::error!("Error enumerating cache keys for pattern '{}': {}", pattern, err);
                Vec::new()
            }
        }
    }
}
