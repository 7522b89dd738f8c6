//! Shared cache tier - byte-oriented, out-of-process.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

use super::EntityCacheOptions;

/// The slower, shared tier of the cache manager.
///
/// Implementations talk to an external store (Redis, a sidecar, ...).
/// Errors are opaque to the cache manager and surface as
/// `cache.store_failure` with the cause as inner error.
#[async_trait]
pub trait DistributedCache: Send + Sync + 'static {
    /// Raw bytes for `key`, `None` when absent or expired.
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: Vec<u8>, options: &EntityCacheOptions)
    -> anyhow::Result<()>;

    async fn remove(&self, key: &str) -> anyhow::Result<()>;

    /// Renew the sliding window of `key` without reading its value.
    async fn refresh(&self, key: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
struct StoredEntry {
    bytes: Vec<u8>,
    deadline: Option<Instant>,
    sliding: Option<Duration>,
    sliding_deadline: Option<Instant>,
}

impl StoredEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|d| d <= now) || self.sliding_deadline.is_some_and(|d| d <= now)
    }

    fn touch(&mut self, now: Instant) {
        if let Some(window) = self.sliding {
            self.sliding_deadline = now.checked_add(window);
        }
    }
}

/// Process-local stand-in for a shared store.
///
/// Honours absolute and sliding expiration on the tokio clock. Useful for
/// tests and single-instance hosts.
#[derive(Debug, Default)]
pub struct InMemoryDistributedCache {
    entries: DashMap<String, StoredEntry>,
}

impl InMemoryDistributedCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included until touched.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl DistributedCache for InMemoryDistributedCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let now = Instant::now();
        let Some(mut entry) = self.entries.get_mut(key) else {
            return Ok(None);
        };

        if !entry.is_expired(now) {
            entry.touch(now);
            return Ok(Some(entry.bytes.clone()));
        }
        drop(entry);

        // a concurrent set may have replaced the entry since the guard dropped
        if self
            .entries
            .remove_if(key, |_, entry| entry.is_expired(now))
            .is_some()
        {
            debug!("Shared entry '{}' expired", key);
        }
        Ok(None)
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        options: &EntityCacheOptions,
    ) -> anyhow::Result<()> {
        let now = Instant::now();
        let deadline = options
            .absolute_remaining(Utc::now())
            .and_then(|remaining| now.checked_add(remaining));
        let mut entry = StoredEntry {
            bytes: value,
            deadline,
            sliding: options.sliding_expiration,
            sliding_deadline: None,
        };
        entry.touch(now);

        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn refresh(&self, key: &str) -> anyhow::Result<()> {
        let now = Instant::now();
        if let Some(mut entry) = self.entries.get_mut(key)
            && !entry.is_expired(now)
        {
            entry.touch(now);
        }
        Ok(())
    }
}
