//! # Connections Module
//!
//! Persistent connections to external stores. Today that is the cache layer
//! backing geocoding enrichment: a namespaced, TTL-aware key/value store with
//! pattern enumeration, pluggable between Redis and an in-process map.

/// The namespaced, error-swallowing cache facade and its backend contract.
pub mod cache_store;
/// Redis implementation of the cache backend.
pub mod cache_redis;
/// In-process TTL hash map implementation of the cache backend.
pub mod cache_memory;

pub use cache_memory::MemoryBackend;
pub use cache_redis::RedisBackend;
pub use cache_store::{CacheBackend, CacheStore};
