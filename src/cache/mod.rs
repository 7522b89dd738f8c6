//! Cache module - two-tier cache-aside built on Moka and a shared store.
//!
//! ## Architecture
//!
//! - `LocalCache` - typed in-process tier (Moka, per-entry expiration)
//! - `DistributedCache` - byte-oriented shared tier, supplied by the host
//! - `Serializer` - bytes <-> values for the shared tier (`JsonSerializer`)
//! - `CacheManager` - cache-aside over both tiers, returning `Result`s
//!
//! ## Usage
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use tokio_util::sync::CancellationToken;
//! use appkit::cache::{
//!     CacheManager, CacheManagerOptions, CacheProvider, EntityCacheOptions,
//!     InMemoryDistributedCache,
//! };
//! use appkit::errors::Result;
//!
//! # async fn demo() {
//! let cache = CacheManager::new(
//!     Arc::new(InMemoryDistributedCache::new()),
//!     CacheManagerOptions::default(),
//! );
//! let cancel = CancellationToken::new();
//!
//! let user = cache
//!     .get_or_set("user:1", &EntityCacheOptions::default(), |_| async {
//!         Result::success(String::from("ada"))
//!     }, &cancel)
//!     .await;
//! # }
//! ```

mod config;
mod distributed;
mod local;
mod manager;
mod serializer;

pub use config::{CacheConfig, EntityCacheOptions};
pub use distributed::{DistributedCache, InMemoryDistributedCache};
pub use local::LocalCache;
pub use manager::{
    CACHE_MISS_CODE, CACHE_SERIALIZATION_FAILURE_CODE, CACHE_STORE_FAILURE_CODE,
    CACHE_UNKNOWN_VALUE_CODE, CacheManager, CacheManagerOptions, CacheProvider,
};
pub use serializer::{JsonSerializer, Serializer, SerializerError};
