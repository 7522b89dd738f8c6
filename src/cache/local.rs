//! Local cache tier - typed, in-process, built on Moka.

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use moka::Expiry;
use moka::sync::Cache;
use tracing::debug;

use super::{CacheConfig, EntityCacheOptions};

/// A value stored in the local tier together with its expiration policy.
#[derive(Clone)]
struct LocalEntry {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
    deadline: Option<Instant>,
    sliding: Option<Duration>,
}

/// Longest expiration handed to moka; longer ones are clamped.
const MAX_EXPIRY: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

impl LocalEntry {
    fn time_left(&self, now: Instant) -> Option<Duration> {
        let absolute = self.deadline.map(|d| d.saturating_duration_since(now));
        let left = match (absolute, self.sliding) {
            (Some(a), Some(s)) => Some(a.min(s)),
            (a, s) => a.or(s),
        };
        left.map(|d| d.min(MAX_EXPIRY))
    }
}

/// Per-entry expiration: absolute deadline, sliding window, or both.
struct EntryExpiry;

impl Expiry<String, LocalEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &LocalEntry,
        created_at: Instant,
    ) -> Option<Duration> {
        value.time_left(created_at)
    }

    fn expire_after_read(
        &self,
        _key: &String,
        value: &LocalEntry,
        read_at: Instant,
        duration_until_expiry: Option<Duration>,
        _last_modified_at: Instant,
    ) -> Option<Duration> {
        match value.sliding {
            Some(_) => value.time_left(read_at),
            None => duration_until_expiry,
        }
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &LocalEntry,
        updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.time_left(updated_at)
    }
}

/// The fast tier of the cache manager.
///
/// This cache is:
/// - Thread-safe and clone-friendly (clones share the same storage)
/// - Typed per entry: values keep their Rust type, reads ask for it back
/// - Bounded by capacity with per-entry absolute and sliding expiration
///
/// Reading a key with a different type than it was stored with is a miss.
#[derive(Clone)]
pub struct LocalCache {
    inner: Cache<String, LocalEntry>,
    config: Arc<CacheConfig>,
    name: Arc<str>,
}

impl LocalCache {
    /// Create a new local cache with the given name and config.
    pub fn new(name: impl Into<Arc<str>>, config: CacheConfig) -> Self {
        let inner = Cache::builder()
            .max_capacity(config.max_capacity)
            .expire_after(EntryExpiry)
            .build();

        Self {
            inner,
            config: Arc::new(config),
            name: name.into(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Get the name of this cache.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get a typed value. `None` if absent, expired or stored as another type.
    pub fn try_get<T>(&self, key: &str) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let entry = self.inner.get(key)?;
        match entry.value.downcast_ref::<T>() {
            Some(value) => Some(value.clone()),
            None => {
                debug!(
                    "Local cache '{}' holds {} for '{}', not {}",
                    self.name,
                    entry.type_name,
                    key,
                    std::any::type_name::<T>()
                );
                None
            }
        }
    }

    /// Store a value with the given expiration.
    ///
    /// Entries stored without any expiration fall back to the configured
    /// `ttl`/`tti`.
    pub fn set<T>(&self, key: &str, value: T, options: &EntityCacheOptions)
    where
        T: Send + Sync + 'static,
    {
        let options = self.config.resolve(options);

        // a deadline past the end of the clock is no deadline
        let deadline = options
            .absolute_remaining(Utc::now())
            .and_then(|remaining| Instant::now().checked_add(remaining));

        self.inner.insert(
            key.to_string(),
            LocalEntry {
                value: Arc::new(value),
                type_name: std::any::type_name::<T>(),
                deadline,
                sliding: options.sliding_expiration,
            },
        );
    }

    /// Remove a key from the cache.
    pub fn remove(&self, key: &str) {
        self.inner.invalidate(key);
    }

    /// Check if a key exists in the cache.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    /// Remove all entries from the cache.
    pub fn clear(&self) {
        self.inner.invalidate_all();
    }

    /// Get the number of entries in the cache.
    ///
    /// Note: This may not be perfectly accurate due to concurrent operations.
    pub fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }
}

impl std::fmt::Debug for LocalCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCache")
            .field("name", &self.name)
            .field("entry_count", &self.inner.entry_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> LocalCache {
        LocalCache::new("test", CacheConfig::with_capacity(100))
    }

    #[test]
    fn test_set_then_get_typed_value() {
        let cache = cache();
        cache.set("k", 42_i32, &EntityCacheOptions::default());

        assert_eq!(cache.try_get::<i32>("k"), Some(42));
        assert!(cache.contains("k"));
    }

    #[test]
    fn test_type_mismatch_is_a_miss() {
        let cache = cache();
        cache.set("k", String::from("text"), &EntityCacheOptions::default());

        assert_eq!(cache.try_get::<i32>("k"), None);
        assert_eq!(cache.try_get::<String>("k").as_deref(), Some("text"));
    }

    #[test]
    fn test_remove_and_clear() {
        let cache = cache();
        cache.set("a", 1_u8, &EntityCacheOptions::default());
        cache.set("b", 2_u8, &EntityCacheOptions::default());

        cache.remove("a");
        assert_eq!(cache.try_get::<u8>("a"), None);
        assert_eq!(cache.entry_count(), 1);

        cache.clear();
        assert_eq!(cache.try_get::<u8>("b"), None);
    }

    #[test]
    fn test_past_absolute_expiration_is_never_served() {
        let cache = cache();
        let options = EntityCacheOptions::new().absolute(Utc::now() - chrono::Duration::seconds(1));
        cache.set("gone", 1_u8, &options);

        assert_eq!(cache.try_get::<u8>("gone"), None);
    }

    #[test]
    fn test_relative_expiration_elapses() {
        let cache = cache();
        cache.set(
            "short",
            1_u8,
            &EntityCacheOptions::new().relative(Duration::from_millis(50)),
        );
        assert_eq!(cache.try_get::<u8>("short"), Some(1));

        std::thread::sleep(Duration::from_millis(120));
        assert_eq!(cache.try_get::<u8>("short"), None);
    }

    #[test]
    fn test_huge_expirations_do_not_overflow() {
        let cache = cache();
        cache.set("rel", 1_u8, &EntityCacheOptions::new().relative(Duration::MAX));
        cache.set("slide", 2_u8, &EntityCacheOptions::new().sliding(Duration::MAX));

        assert_eq!(cache.try_get::<u8>("rel"), Some(1));
        assert_eq!(cache.try_get::<u8>("slide"), Some(2));
        assert_eq!(cache.try_get::<u8>("slide"), Some(2));
    }

    #[test]
    fn test_time_left_combines_deadline_and_window() {
        let now = Instant::now();
        let entry = LocalEntry {
            value: Arc::new(()),
            type_name: "()",
            deadline: Some(now + Duration::from_secs(10)),
            sliding: Some(Duration::from_secs(3)),
        };

        assert_eq!(entry.time_left(now), Some(Duration::from_secs(3)));
        assert_eq!(
            entry.time_left(now + Duration::from_secs(8)),
            Some(Duration::from_secs(2))
        );
    }
}
