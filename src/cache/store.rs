//! Page cache backends.
//!
//! Backends implement `get` and `set` with a TTL. Expired entries read as
//! absent and are evicted by the backend itself.

use std::num::NonZeroUsize;
use std::sync::{RwLock, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use metrics::counter;
use thiserror::Error;
use tokio::time::Instant;
use tracing::warn;

use super::METRIC_PAGE_CACHE_EVICT;
use super::config::CacheConfig;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
}

/// Key-value store with expiry holding serialized page item lists.
#[async_trait]
pub trait PageCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError>;

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError>;
}

struct Entry {
    value: Bytes,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// In-process page cache bounded by an LRU capacity.
pub struct MemoryPageCache {
    entries: RwLock<LruCache<String, Entry>>,
}

impl MemoryPageCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_capacity(config.capacity_non_zero())
    }

    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
        }
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries_mut("len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries_mut("clear").clear();
    }

    /// Remove expired entries, returning how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries_mut("purge_expired");
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| !entry.is_live(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        expired.len()
    }

    fn entries_mut(&self, op: &'static str) -> RwLockWriteGuard<'_, LruCache<String, Entry>> {
        match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!(
                    op,
                    lock_kind = "rwlock.write",
                    result = "poisoned_recovered",
                    "Recovered from poisoned page cache lock"
                );
                poisoned.into_inner()
            }
        }
    }
}

#[async_trait]
impl PageCache for MemoryPageCache {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let now = Instant::now();
        // LRU lookups reorder entries, so even reads take the write lock.
        let mut entries = self.entries_mut("get");
        let lookup = entries
            .get(key)
            .map(|entry| entry.is_live(now).then(|| entry.value.clone()));
        match lookup {
            Some(Some(value)) => Ok(Some(value)),
            Some(None) => {
                entries.pop(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError> {
        let expires_at = Instant::now().checked_add(ttl).ok_or_else(|| {
            CacheError::Unavailable(format!("ttl of {}s overflows the clock", ttl.as_secs()))
        })?;
        let entry = Entry { value, expires_at };
        let replaced = self.entries_mut("set").push(key.to_string(), entry);
        if let Some((evicted_key, _)) = replaced {
            if evicted_key != key {
                counter!(METRIC_PAGE_CACHE_EVICT).increment(1);
            }
        }
        Ok(())
    }
}

/// Backend used when page caching is switched off: every lookup misses.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledPageCache;

#[async_trait]
impl PageCache for DisabledPageCache {
    async fn get(&self, _key: &str) -> Result<Option<Bytes>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: Bytes, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }
}
