//! Two-tier cache-aside manager.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::{
    CacheConfig, DistributedCache, EntityCacheOptions, JsonSerializer, LocalCache, Serializer,
    SerializerError,
};
use crate::errors::{Cancellable, Cancelled, Error, Result};

/// The key is in neither tier.
pub const CACHE_MISS_CODE: &str = "cache.miss";

/// Bytes exist for the key but do not decode to the requested type.
pub const CACHE_UNKNOWN_VALUE_CODE: &str = "cache.unknown_value";

/// The shared tier reported an error.
pub const CACHE_STORE_FAILURE_CODE: &str = "cache.store_failure";

/// The value could not be encoded; nothing was written.
pub const CACHE_SERIALIZATION_FAILURE_CODE: &str = "cache.serialization_failure";

/// Cache operations that return [`Result`] values instead of raising.
///
/// Every operation takes a cancellation token. A cancelled operation returns
/// `Err(Cancelled)`; every other outcome, including store errors, is an
/// `Ok(Result)`.
#[async_trait]
pub trait CacheProvider: Send + Sync {
    async fn get<T>(&self, key: &str, cancel: &CancellationToken) -> Cancellable<Result<T>>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static;

    async fn set<T>(
        &self,
        key: &str,
        value: T,
        options: Option<&EntityCacheOptions>,
        cancel: &CancellationToken,
    ) -> Cancellable<Result<()>>
    where
        T: Serialize + Send + Sync + 'static;

    async fn get_or_set<T, F, Fut>(
        &self,
        key: &str,
        options: &EntityCacheOptions,
        compute: F,
        cancel: &CancellationToken,
    ) -> Cancellable<Result<T>>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
        F: FnOnce(CancellationToken) -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send;

    async fn remove(&self, key: &str, cancel: &CancellationToken) -> Cancellable<Result<()>>;

    async fn refresh(&self, key: &str, cancel: &CancellationToken) -> Cancellable<Result<()>>;
}

/// Options for building a [`CacheManager`] with the JSON serializer.
#[derive(Debug, Clone, Default)]
pub struct CacheManagerOptions {
    pub serializer: JsonSerializer,
    pub local: CacheConfig,
}

/// Cache-aside over a fast local tier and a shared byte-oriented tier.
///
/// - Reads try the local tier first and fall back to the shared tier.
///   A shared-tier hit is returned without warming the local tier; only an
///   explicit write does that.
/// - Writes go to the local tier, then the shared tier, with the same
///   expiration on both.
/// - Nothing is locked or retried. Concurrent writers race last-write-wins
///   per tier, and concurrent `get_or_set` misses may each compute.
pub struct CacheManager<S: Serializer = JsonSerializer> {
    local: LocalCache,
    distributed: Arc<dyn DistributedCache>,
    serializer: S,
}

impl CacheManager<JsonSerializer> {
    /// Create a manager with a fresh local tier and the JSON serializer.
    pub fn new(distributed: Arc<dyn DistributedCache>, options: CacheManagerOptions) -> Self {
        Self::with_serializer(
            LocalCache::new("cache_manager", options.local),
            distributed,
            options.serializer,
        )
    }
}

impl<S: Serializer> CacheManager<S> {
    /// Create a manager over existing tiers and a custom serializer.
    pub fn with_serializer(
        local: LocalCache,
        distributed: Arc<dyn DistributedCache>,
        serializer: S,
    ) -> Self {
        Self {
            local,
            distributed,
            serializer,
        }
    }

    pub fn local(&self) -> &LocalCache {
        &self.local
    }

    pub fn distributed(&self) -> &Arc<dyn DistributedCache> {
        &self.distributed
    }

    /// A null payload, unless `T` carries no data at all: `()` and unit
    /// structs encode as null too and are real values.
    fn is_absent<T>(&self, bytes: &[u8]) -> bool {
        std::mem::size_of::<T>() != 0 && self.serializer.is_null(bytes)
    }

    fn decode<T: DeserializeOwned>(&self, key: &str, bytes: &[u8]) -> Result<T> {
        if self.is_absent::<T>(bytes) {
            debug!("cache:deserialize_failed (null payload)");
            return unknown_value::<T>(key, None);
        }

        match self.serializer.deserialize::<T>(bytes) {
            Ok(value) => Result::Success(value),
            Err(err) => {
                warn!("Cache value for '{}' did not decode: {}", key, err);
                unknown_value::<T>(key, Some(&err))
            }
        }
    }

    /// Write an already encoded value to both tiers, local first.
    async fn write_both<T>(
        &self,
        key: &str,
        value: T,
        bytes: Vec<u8>,
        options: &EntityCacheOptions,
        cancel: &CancellationToken,
    ) -> Cancellable<Result<()>>
    where
        T: Send + Sync + 'static,
    {
        self.local.set(key, value, options);
        debug!("cache:set_memory");

        match guarded(cancel, self.distributed.set(key, bytes, options)).await? {
            Ok(()) => {
                debug!("cache:set_remote");
                Ok(Result::unit())
            }
            Err(err) => Ok(store_failure("set", key, &err)),
        }
    }
}

#[async_trait]
impl<S: Serializer> CacheProvider for CacheManager<S> {
    #[instrument(name = "cache:get", level = "debug", skip_all, fields(key = %key))]
    async fn get<T>(&self, key: &str, cancel: &CancellationToken) -> Cancellable<Result<T>>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }

        if let Some(value) = self.local.try_get::<T>(key) {
            debug!("cache:got_from_memory");
            return Ok(Result::Success(value));
        }
        debug!("cache:miss_from_memory");

        let content = match guarded(cancel, self.distributed.get(key)).await? {
            Ok(content) => content,
            Err(err) => return Ok(store_failure("get", key, &err)),
        };

        let Some(bytes) = content else {
            debug!("cache:miss_from_remote");
            return Ok(Error::new(CACHE_MISS_CODE)
                .with_message("Cache miss.")
                .with_target(key)
                .into());
        };

        debug!("cache:got_from_remote");
        Ok(self.decode(key, &bytes))
    }

    #[instrument(name = "cache:set", level = "debug", skip_all, fields(key = %key))]
    async fn set<T>(
        &self,
        key: &str,
        value: T,
        options: Option<&EntityCacheOptions>,
        cancel: &CancellationToken,
    ) -> Cancellable<Result<()>>
    where
        T: Serialize + Send + Sync + 'static,
    {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }

        let options = self
            .local
            .config()
            .resolve(&options.copied().unwrap_or_default());
        let bytes = match self.serializer.serialize(&value) {
            Ok(bytes) => bytes,
            Err(err) => return Ok(serialization_failure(key, &err)),
        };

        self.write_both(key, value, bytes, &options, cancel).await
    }

    #[instrument(name = "cache:get_or_set", level = "debug", skip_all, fields(key = %key))]
    async fn get_or_set<T, F, Fut>(
        &self,
        key: &str,
        options: &EntityCacheOptions,
        compute: F,
        cancel: &CancellationToken,
    ) -> Cancellable<Result<T>>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
        F: FnOnce(CancellationToken) -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
    {
        let cached = self.get::<T>(key, cancel).await?;
        let is_miss = matches!(&cached, Result::Fail(error) if error.code() == CACHE_MISS_CODE);
        if !is_miss {
            // hits and corrupt entries are returned as they are
            debug!("cache:got_value or non-miss failure");
            return Ok(cached);
        }

        debug!("cache:missed_value");
        let fresh = guarded(cancel, compute(cancel.clone())).await?;
        debug!("cache:fetched_current_value");

        let Result::Success(value) = &fresh else {
            return Ok(fresh);
        };

        let bytes = match self.serializer.serialize(value) {
            Ok(bytes) => bytes,
            Err(err) => return Ok(serialization_failure(key, &err)),
        };
        if self.is_absent::<T>(&bytes) {
            debug!("Computed value for '{}' is null, not caching", key);
            return Ok(fresh);
        }

        let options = self.local.config().resolve(options);
        match self
            .write_both(key, value.clone(), bytes, &options, cancel)
            .await?
        {
            Result::Success(()) => {
                debug!("cache:set_cache_with_current_value");
                Ok(fresh)
            }
            Result::Fail(error) => Ok(Result::Fail(error)),
        }
    }

    #[instrument(name = "cache:remove", level = "debug", skip_all, fields(key = %key))]
    async fn remove(&self, key: &str, cancel: &CancellationToken) -> Cancellable<Result<()>> {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }

        self.local.remove(key);
        match guarded(cancel, self.distributed.remove(key)).await? {
            Ok(()) => Ok(Result::unit()),
            Err(err) => Ok(store_failure("remove", key, &err)),
        }
    }

    #[instrument(name = "cache:refresh", level = "debug", skip_all, fields(key = %key))]
    async fn refresh(&self, key: &str, cancel: &CancellationToken) -> Cancellable<Result<()>> {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }

        match guarded(cancel, self.distributed.refresh(key)).await? {
            Ok(()) => Ok(Result::unit()),
            Err(err) => Ok(store_failure("refresh", key, &err)),
        }
    }
}

impl<S: Serializer> std::fmt::Debug for CacheManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("local", &self.local)
            .finish_non_exhaustive()
    }
}

/// Run `fut` unless `cancel` fires first.
async fn guarded<F: Future>(cancel: &CancellationToken, fut: F) -> Cancellable<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Cancelled),
        output = fut => Ok(output),
    }
}

fn unknown_value<T>(key: &str, cause: Option<&SerializerError>) -> Result<T> {
    let error = Error::new(CACHE_UNKNOWN_VALUE_CODE)
        .with_message(format!(
            "Unable to deserialize the cache value for key \"{}\" to type \"{}\".",
            key,
            std::any::type_name::<T>()
        ))
        .with_target(key);

    match cause {
        Some(cause) => error.with_inner(Error::from_std_error(cause)).into(),
        None => error.into(),
    }
}

fn serialization_failure<T>(key: &str, cause: &SerializerError) -> Result<T> {
    Error::new(CACHE_SERIALIZATION_FAILURE_CODE)
        .with_message(format!("Unable to serialize the cache value for key \"{key}\"."))
        .with_target(key)
        .with_inner(Error::from_std_error(cause))
        .into()
}

fn store_failure<T>(operation: &str, key: &str, cause: &anyhow::Error) -> Result<T> {
    warn!("Shared cache failed to {} '{}': {:#}", operation, key, cause);
    Error::new(CACHE_STORE_FAILURE_CODE)
        .with_message(format!(
            "The shared cache failed to {operation} the key \"{key}\"."
        ))
        .with_target(key)
        .with_inner(Error::from_anyhow(cause))
        .into()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::cache::InMemoryDistributedCache;

    /// Shared tier that counts reads and can be switched to fail or hang.
    #[derive(Default)]
    struct ProbeStore {
        inner: InMemoryDistributedCache,
        gets: AtomicUsize,
        failing: bool,
        hanging: bool,
    }

    impl ProbeStore {
        fn failing() -> Self {
            Self {
                failing: true,
                ..Default::default()
            }
        }

        fn hanging() -> Self {
            Self {
                hanging: true,
                ..Default::default()
            }
        }

        async fn gate(&self) -> anyhow::Result<()> {
            if self.hanging {
                std::future::pending::<()>().await;
            }
            if self.failing {
                anyhow::bail!("connection reset by peer");
            }
            Ok(())
        }
    }

    #[async_trait]
    impl DistributedCache for ProbeStore {
        async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            self.gate().await?;
            self.inner.get(key).await
        }

        async fn set(
            &self,
            key: &str,
            value: Vec<u8>,
            options: &EntityCacheOptions,
        ) -> anyhow::Result<()> {
            self.gate().await?;
            self.inner.set(key, value, options).await
        }

        async fn remove(&self, key: &str) -> anyhow::Result<()> {
            self.gate().await?;
            self.inner.remove(key).await
        }

        async fn refresh(&self, key: &str) -> anyhow::Result<()> {
            self.gate().await?;
            self.inner.refresh(key).await
        }
    }

    fn manager(store: ProbeStore) -> (CacheManager, Arc<ProbeStore>) {
        let store = Arc::new(store);
        let manager = CacheManager::new(store.clone(), CacheManagerOptions::default());
        (manager, store)
    }

    fn token() -> CancellationToken {
        CancellationToken::new()
    }

    #[tokio::test]
    async fn test_missing_key_is_a_miss() {
        let (cache, _) = manager(ProbeStore::default());
        let result = cache.get::<i32>("missing-key", &token()).await.unwrap();

        assert_eq!(result.error().code(), CACHE_MISS_CODE);
        assert_eq!(result.error().target(), Some("missing-key"));
    }

    #[tokio::test]
    async fn test_set_then_get_is_served_locally() {
        let (cache, store) = manager(ProbeStore::default());
        let set = cache.set("k", 42_i32, None, &token()).await.unwrap();
        assert!(set.is_success());

        let result = cache.get::<i32>("k", &token()).await.unwrap();
        assert_eq!(result, Result::success(42));
        assert_eq!(store.gets.load(Ordering::SeqCst), 0);
        assert_eq!(store.inner.get("k").await.unwrap(), Some(b"42".to_vec()));
    }

    #[tokio::test]
    async fn test_shared_hit_does_not_warm_local_tier() {
        let (cache, store) = manager(ProbeStore::default());
        store
            .inner
            .set("k", b"\"from-remote\"".to_vec(), &EntityCacheOptions::default())
            .await
            .unwrap();

        let result = cache.get::<String>("k", &token()).await.unwrap();
        assert_eq!(result.value(), "from-remote");
        assert!(!cache.local().contains("k"));

        let _ = cache.get::<String>("k", &token()).await.unwrap();
        assert_eq!(store.gets.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_get_or_set_computes_once() {
        let (cache, _) = manager(ProbeStore::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let options = EntityCacheOptions::new().relative(Duration::from_secs(60));

        let compute = |calls: Arc<AtomicUsize>| {
            move |_: CancellationToken| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Result::success(7_i32)
            }
        };

        let first = cache
            .get_or_set("k2", &options, compute(calls.clone()), &token())
            .await
            .unwrap();
        assert_eq!(first, Result::success(7));

        let second = cache
            .get_or_set("k2", &options, compute(calls.clone()), &token())
            .await
            .unwrap();
        assert_eq!(second, Result::success(7));
        assert_eq!(cache.get::<i32>("k2", &token()).await.unwrap(), Result::success(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_not_treated_as_miss() {
        let (cache, store) = manager(ProbeStore::default());
        store
            .inner
            .set("k3", b"\"not a number\"".to_vec(), &EntityCacheOptions::default())
            .await
            .unwrap();

        let result = cache.get::<i32>("k3", &token()).await.unwrap();
        assert_eq!(result.error().code(), CACHE_UNKNOWN_VALUE_CODE);
        assert!(result.error().inner_error().is_some());

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let result = cache
            .get_or_set(
                "k3",
                &EntityCacheOptions::default(),
                move |_| async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Result::success(1_i32)
                },
                &token(),
            )
            .await
            .unwrap();

        assert_eq!(result.error().code(), CACHE_UNKNOWN_VALUE_CODE);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_null_payload_is_unknown_value() {
        let (cache, store) = manager(ProbeStore::default());
        store
            .inner
            .set("n", b"null".to_vec(), &EntityCacheOptions::default())
            .await
            .unwrap();

        let result = cache.get::<Option<i32>>("n", &token()).await.unwrap();
        assert_eq!(result.error().code(), CACHE_UNKNOWN_VALUE_CODE);
    }

    #[tokio::test]
    async fn test_remove_clears_both_tiers() {
        let (cache, store) = manager(ProbeStore::default());
        let _ = cache.set("k", 1_u8, None, &token()).await.unwrap();

        let removed = cache.remove("k", &token()).await.unwrap();
        assert!(removed.is_success());
        assert!(store.inner.is_empty());

        let result = cache.get::<u8>("k", &token()).await.unwrap();
        assert_eq!(result.error().code(), CACHE_MISS_CODE);
    }

    #[tokio::test]
    async fn test_failed_compute_is_returned_without_write() {
        let (cache, store) = manager(ProbeStore::default());
        let result = cache
            .get_or_set(
                "k",
                &EntityCacheOptions::default(),
                |_| async { Result::<i32>::fail(Error::new("upstream.down")) },
                &token(),
            )
            .await
            .unwrap();

        assert_eq!(result.error().code(), "upstream.down");
        assert!(store.inner.is_empty());
        assert!(!cache.local().contains("k"));
    }

    #[tokio::test]
    async fn test_null_compute_result_is_not_cached() {
        let (cache, store) = manager(ProbeStore::default());
        let result = cache
            .get_or_set(
                "k",
                &EntityCacheOptions::default(),
                |_| async { Result::success(None::<i32>) },
                &token(),
            )
            .await
            .unwrap();

        assert_eq!(result, Result::success(None));
        assert!(store.inner.is_empty());
    }

    #[tokio::test]
    async fn test_unit_value_is_cached() {
        let (cache, store) = manager(ProbeStore::default());
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let counter = calls.clone();
            let result = cache
                .get_or_set(
                    "done",
                    &EntityCacheOptions::default(),
                    move |_| async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Result::unit()
                    },
                    &token(),
                )
                .await
                .unwrap();
            assert!(result.is_success());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // first lookup went to the shared tier, the second was a local hit
        assert_eq!(store.gets.load(Ordering::SeqCst), 1);

        cache.local().remove("done");
        assert!(cache.get::<()>("done", &token()).await.unwrap().is_success());
        assert_eq!(store.gets.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_huge_expiration_is_accepted() {
        let (cache, _) = manager(ProbeStore::default());
        let options = EntityCacheOptions::new()
            .relative(Duration::MAX)
            .sliding(Duration::MAX);

        let set = cache.set("k", 3_u16, Some(&options), &token()).await.unwrap();
        assert!(set.is_success());
        assert_eq!(cache.get::<u16>("k", &token()).await.unwrap(), Result::success(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_expiration_reaches_shared_tier() {
        let store = Arc::new(ProbeStore::default());
        let options = CacheManagerOptions {
            local: CacheConfig::default().ttl(Duration::from_secs(10)),
            ..Default::default()
        };
        let cache = CacheManager::new(store.clone(), options);

        let set = cache.set("k", 1_u8, None, &token()).await.unwrap();
        assert!(set.is_success());
        assert!(store.inner.get("k").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(store.inner.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_failure_is_wrapped() {
        let (cache, _) = manager(ProbeStore::failing());
        let result = cache.get::<i32>("k", &token()).await.unwrap();

        let error = result.error();
        assert_eq!(error.code(), CACHE_STORE_FAILURE_CODE);
        assert_eq!(
            error.inner_error().and_then(Error::message),
            Some("connection reset by peer")
        );
    }

    #[tokio::test]
    async fn test_failed_shared_write_leaves_local_value() {
        let (cache, _) = manager(ProbeStore::failing());
        let result = cache.set("k", 5_u32, None, &token()).await.unwrap();

        assert_eq!(result.error().code(), CACHE_STORE_FAILURE_CODE);
        assert_eq!(cache.local().try_get::<u32>("k"), Some(5));
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_before_any_tier() {
        let (cache, store) = manager(ProbeStore::default());
        let cancel = token();
        cancel.cancel();

        assert_eq!(cache.get::<i32>("k", &cancel).await, Err(Cancelled));
        assert_eq!(cache.set("k", 1, None, &cancel).await, Err(Cancelled));
        assert_eq!(cache.remove("k", &cancel).await, Err(Cancelled));
        assert_eq!(cache.refresh("k", &cancel).await, Err(Cancelled));
        assert_eq!(store.gets.load(Ordering::SeqCst), 0);
        assert!(!cache.local().contains("k"));
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_shared_tier() {
        let (cache, _) = manager(ProbeStore::hanging());
        let cancel = token();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let outcome = cache.get::<i32>("k", &cancel).await;
        assert_eq!(outcome, Err(Cancelled));
    }

    #[tokio::test]
    async fn test_refresh_reaches_shared_tier() {
        let (cache, _) = manager(ProbeStore::default());
        let _ = cache
            .set(
                "k",
                1_u8,
                Some(&EntityCacheOptions::new().sliding(Duration::from_secs(30))),
                &token(),
            )
            .await
            .unwrap();

        assert!(cache.refresh("k", &token()).await.unwrap().is_success());
    }
}
