//! State storage providers and their named factory.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::factory::{GenericFactory, NamedOptions, ServiceRegistry};

/// Request metadata forwarded to the underlying store.
pub type Metadata = HashMap<String, String>;

/// Options for one named state store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateStorageProviderOptions {
    /// Name of the store on the backing platform.
    pub store_name: String,
}

impl StateStorageProviderOptions {
    pub fn new(store_name: impl Into<String>) -> Self {
        Self {
            store_name: store_name.into(),
        }
    }
}

/// Key/value state storage with optimistic concurrency through etags.
///
/// An etag is an opaque version marker. The `try_*` operations only apply
/// when the supplied etag matches the stored one and report whether they
/// did.
#[async_trait]
pub trait StateStorageProvider: Send + Sync {
    async fn get_state(&self, key: &str, metadata: Option<&Metadata>)
    -> anyhow::Result<Option<Value>>;

    /// Value and etag; the etag is empty when the key is absent.
    async fn get_state_and_etag(
        &self,
        key: &str,
        metadata: Option<&Metadata>,
    ) -> anyhow::Result<(Option<Value>, String)>;

    async fn save_state(
        &self,
        key: &str,
        value: Value,
        metadata: Option<&Metadata>,
    ) -> anyhow::Result<()>;

    async fn try_save_state(
        &self,
        key: &str,
        value: Value,
        etag: &str,
        metadata: Option<&Metadata>,
    ) -> anyhow::Result<bool>;

    async fn delete_state(&self, key: &str, metadata: Option<&Metadata>) -> anyhow::Result<()>;

    async fn try_delete_state(
        &self,
        key: &str,
        etag: &str,
        metadata: Option<&Metadata>,
    ) -> anyhow::Result<bool>;
}

/// Typed helpers over any [`StateStorageProvider`].
#[async_trait]
pub trait StateStorageExt: StateStorageProvider {
    async fn get_typed<T: DeserializeOwned + Send>(&self, key: &str) -> anyhow::Result<Option<T>> {
        match self.get_state(key, None).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn save_typed<T: Serialize + Sync>(&self, key: &str, value: &T) -> anyhow::Result<()> {
        self.save_state(key, serde_json::to_value(value)?, None).await
    }
}

impl<P: StateStorageProvider + ?Sized> StateStorageExt for P {}

#[derive(Debug, Clone)]
struct Versioned {
    value: Value,
    version: u64,
}

/// Process-local state store. Etags are increasing version numbers.
#[derive(Debug)]
pub struct InMemoryStateStore {
    options: StateStorageProviderOptions,
    entries: DashMap<String, Versioned>,
    next_version: AtomicU64,
}

impl InMemoryStateStore {
    pub fn new(options: StateStorageProviderOptions) -> Self {
        Self {
            options,
            entries: DashMap::new(),
            next_version: AtomicU64::new(1),
        }
    }

    pub fn store_name(&self) -> &str {
        &self.options.store_name
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn bump(&self) -> u64 {
        self.next_version.fetch_add(1, Ordering::Relaxed)
    }
}

#[async_trait]
impl StateStorageProvider for InMemoryStateStore {
    async fn get_state(
        &self,
        key: &str,
        _metadata: Option<&Metadata>,
    ) -> anyhow::Result<Option<Value>> {
        Ok(self.entries.get(key).map(|e| e.value.clone()))
    }

    async fn get_state_and_etag(
        &self,
        key: &str,
        _metadata: Option<&Metadata>,
    ) -> anyhow::Result<(Option<Value>, String)> {
        Ok(match self.entries.get(key) {
            Some(entry) => (Some(entry.value.clone()), entry.version.to_string()),
            None => (None, String::new()),
        })
    }

    async fn save_state(
        &self,
        key: &str,
        value: Value,
        _metadata: Option<&Metadata>,
    ) -> anyhow::Result<()> {
        let version = self.bump();
        self.entries
            .insert(key.to_string(), Versioned { value, version });
        debug!("Saved '{}' in store '{}'", key, self.options.store_name);
        Ok(())
    }

    async fn try_save_state(
        &self,
        key: &str,
        value: Value,
        etag: &str,
        _metadata: Option<&Metadata>,
    ) -> anyhow::Result<bool> {
        let saved = match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().version.to_string() != etag {
                    false
                } else {
                    let version = self.bump();
                    occupied.insert(Versioned { value, version });
                    true
                }
            }
            Entry::Vacant(vacant) => {
                if etag.is_empty() {
                    let version = self.bump();
                    vacant.insert(Versioned { value, version });
                    true
                } else {
                    false
                }
            }
        };

        debug!("Conditional save of '{}' applied: {}", key, saved);
        Ok(saved)
    }

    async fn delete_state(&self, key: &str, _metadata: Option<&Metadata>) -> anyhow::Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn try_delete_state(
        &self,
        key: &str,
        etag: &str,
        _metadata: Option<&Metadata>,
    ) -> anyhow::Result<bool> {
        let removed = self
            .entries
            .remove_if(key, |_, entry| entry.version.to_string() == etag)
            .is_some();
        Ok(removed)
    }
}

/// Resolves state stores by logical name (`global`, `shared`, `appScoped`).
#[derive(Clone, Debug)]
pub struct StateStorageProviderFactory {
    inner: GenericFactory<StateStorageProviderOptions, dyn StateStorageProvider>,
}

impl StateStorageProviderFactory {
    pub fn new<F>(
        services: ServiceRegistry,
        options: NamedOptions<StateStorageProviderOptions>,
        create: F,
    ) -> Self
    where
        F: Fn(
                &ServiceRegistry,
                Option<&StateStorageProviderOptions>,
            ) -> anyhow::Result<Arc<dyn StateStorageProvider>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            inner: GenericFactory::new(services, options, create),
        }
    }

    pub fn get_state_storage_provider(&self, name: &str) -> Result<Arc<dyn StateStorageProvider>> {
        self.inner.get_item(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.inner.names()
    }
}
