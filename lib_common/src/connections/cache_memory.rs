//! # In-Memory Cache Backend
//!
//! A TTL-aware hash map satisfying the cache backend contract for a
//! single-process deployment, and for tests. Expired entries are dropped
//! lazily on access.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::cache_store::CacheBackend;

/// In-process implementation of [`CacheBackend`].
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryBackend {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Glob-style match supporting `*` as "any run of characters".
fn pattern_matches(pattern: &str, key: &str) -> bool {
    let mut parts = pattern.split('*');
    let first = parts.next().unwrap_or("");
    if !key.starts_with(first) {
        return false;
    }
    if !pattern.contains('*') {
        return key == pattern;
    }
    let mut rest = &key[first.len()..];
    let segments: Vec<&str> = parts.collect();
    for (idx, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            continue;
        }
        let last = idx == segments.len() - 1 && !pattern.ends_with('*');
        if last {
            return rest.ends_with(segment);
        }
        match rest.find(segment) {
            Some(pos) => rest = &rest[pos + segment.len()..],
            None => return false,
        }
    }
    true
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("Cache lock poisoned");
        let expired = match entries.get(key) {
            Some((value, expires)) if *expires > now => return Ok(Some(value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> anyhow::Result<()> {
        let expires = Instant::now() + Duration::from_secs(ttl_secs);
        let mut entries = self.entries.lock().expect("Cache lock poisoned");
        entries.insert(key.to_string(), (value.to_string(), expires));
        Ok(())
    }

    async fn del(&self, key: &str) -> anyhow::Result<()> {
        let mut entries = self.entries.lock().expect("Cache lock poisoned");
        entries.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn ttl(&self, key: &str) -> anyhow::Result<i64> {
        let entries = self.entries.lock().expect("Cache lock poisoned");
        match entries.get(key) {
            Some((_, expires)) => {
                let now = Instant::now();
                if *expires > now {
                    Ok((*expires - now).as_secs() as i64)
                } else {
                    Ok(-1)
                }
            }
            None => Ok(-1),
        }
    }

    async fn keys(&self, pattern: &str) -> anyhow::Result<Vec<String>> {
        let now = Instant::now();
        let entries = self.entries.lock().expect("Cache lock poisoned");
        Ok(entries
            .iter()
            .filter(|(_, (_, expires))| *expires > now)
            .filter(|(key, _)| pattern_matches(pattern, key))
            .map(|(key, _)| key.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_matching() {
        assert!(pattern_matches("enroute:geocode:*", "enroute:geocode:41.0:29.0"));
        assert!(pattern_matches("*", "anything"));
        assert!(pattern_matches("a*c", "abc"));
        assert!(pattern_matches("a*c", "ac"));
        assert!(!pattern_matches("a*c", "abd"));
        assert!(!pattern_matches("enroute:geocode:*", "enroute:route-search:x"));
        assert!(pattern_matches("exact", "exact"));
        assert!(!pattern_matches("exact", "exactly"));
    }
}
