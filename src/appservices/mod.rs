//! Application services - state storage, pub/sub and managed caching wired
//! together behind one handle.
//!
//! ## Architecture
//!
//! - `StateStorageProviderFactory` - state stores by logical name
//!   (`global`, `shared`, `appScoped`)
//! - `PubSubProviderFactory` - pub/sub components by name
//! - `CacheManager` - the managed two-tier cache
//! - `AppServices` - built once at startup, cheap to clone
//!
//! ## Usage
//!
//! ```rust
//! use appkit::appservices::{AppServices, StateStorageExt};
//! use appkit::config::Config;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> anyhow::Result<()> {
//! let app = AppServices::in_memory(&Config::default());
//!
//! let store = app.default_state_storage().get_value_or_throw();
//! store.save_typed("greeting", &"hello").await?;
//! assert_eq!(store.get_typed::<String>("greeting").await?.as_deref(), Some("hello"));
//! # Ok(())
//! # }
//! ```

mod pubsub;
mod state;

use std::sync::Arc;

use tracing::info;

use crate::cache::{CacheManager, CacheManagerOptions, DistributedCache, InMemoryDistributedCache};
use crate::config::Config;
use crate::errors::{Error, Result};
use crate::factory::{NamedOptions, ServiceRegistry};

pub use pubsub::{
    InMemoryPubSub, PubSubExt, PubSubProvider, PubSubProviderFactory, PubSubProviderOptions,
    PublishedEvent,
};
pub use state::{
    InMemoryStateStore, Metadata, StateStorageExt, StateStorageProvider,
    StateStorageProviderFactory, StateStorageProviderOptions,
};

/// A service family was used without being registered on the builder.
pub const NOT_REGISTERED_CODE: &str = "app_services.not_registered";

pub const GLOBAL_STATE_STORE: &str = "global";
pub const SHARED_STATE_STORE: &str = "shared";
pub const APP_SCOPED_STATE_STORE: &str = "appScoped";

/// Buffer of the in-memory pub/sub channel.
const IN_MEMORY_PUB_SUB_CAPACITY: usize = 256;

struct PubSubRegistration {
    factory: PubSubProviderFactory,
    default_name: String,
}

/// Handle to the registered application services.
#[derive(Clone)]
pub struct AppServices {
    services: ServiceRegistry,
    state: Option<StateStorageProviderFactory>,
    pub_sub: Option<Arc<PubSubRegistration>>,
    cache: Option<Arc<CacheManager>>,
}

impl AppServices {
    pub fn builder(services: ServiceRegistry) -> AppServicesBuilder {
        AppServicesBuilder {
            services,
            state: None,
            pub_sub: None,
            cache: None,
        }
    }

    /// Every family backed by process-local providers, named from `config`.
    pub fn in_memory(config: &Config) -> Self {
        Self::builder(ServiceRegistry::new())
            .state_storage(
                &config.state_global,
                &config.state_shared,
                &config.state_app_scoped,
                |_, options| {
                    let options = options.cloned().unwrap_or_default();
                    Ok(Arc::new(InMemoryStateStore::new(options)) as Arc<dyn StateStorageProvider>)
                },
            )
            .pub_sub(&config.pub_sub_name, |_, options| {
                let options = options.cloned().unwrap_or_default();
                Ok(Arc::new(InMemoryPubSub::new(options, IN_MEMORY_PUB_SUB_CAPACITY))
                    as Arc<dyn PubSubProvider>)
            })
            .managed_caching(
                config.cache_options(),
                Arc::new(InMemoryDistributedCache::new()),
            )
            .build()
    }

    pub fn services(&self) -> &ServiceRegistry {
        &self.services
    }

    /// The state store registered under `name`.
    pub fn state_storage(&self, name: &str) -> Result<Arc<dyn StateStorageProvider>> {
        match &self.state {
            Some(factory) => factory.get_state_storage_provider(name),
            None => not_registered("state_storage"),
        }
    }

    /// The application-scoped state store.
    pub fn default_state_storage(&self) -> Result<Arc<dyn StateStorageProvider>> {
        self.state_storage(APP_SCOPED_STATE_STORE)
    }

    pub fn pub_sub(&self, name: &str) -> Result<Arc<dyn PubSubProvider>> {
        match &self.pub_sub {
            Some(registration) => registration.factory.get_pub_sub_provider(name),
            None => not_registered("pub_sub"),
        }
    }

    /// The pub/sub component registered on the builder.
    pub fn default_pub_sub(&self) -> Result<Arc<dyn PubSubProvider>> {
        match &self.pub_sub {
            Some(registration) => self.pub_sub(&registration.default_name),
            None => not_registered("pub_sub"),
        }
    }

    pub fn cache(&self) -> Result<Arc<CacheManager>> {
        match &self.cache {
            Some(cache) => Result::success(cache.clone()),
            None => not_registered("cache"),
        }
    }
}

impl std::fmt::Debug for AppServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppServices")
            .field("state", &self.state.as_ref().map(|s| s.names()))
            .field(
                "pub_sub",
                &self.pub_sub.as_ref().map(|p| p.default_name.as_str()),
            )
            .field("cache", &self.cache.is_some())
            .finish()
    }
}

/// Registers service families, then freezes them into [`AppServices`].
pub struct AppServicesBuilder {
    services: ServiceRegistry,
    state: Option<StateStorageProviderFactory>,
    pub_sub: Option<Arc<PubSubRegistration>>,
    cache: Option<Arc<CacheManager>>,
}

impl AppServicesBuilder {
    /// Register the three state stores, each backed by the named store on
    /// the platform.
    #[must_use]
    pub fn state_storage<F>(
        mut self,
        global_store: &str,
        shared_store: &str,
        app_scoped_store: &str,
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
        let options = NamedOptions::new()
            .configure(GLOBAL_STATE_STORE, StateStorageProviderOptions::new(global_store))
            .configure(SHARED_STATE_STORE, StateStorageProviderOptions::new(shared_store))
            .configure(
                APP_SCOPED_STATE_STORE,
                StateStorageProviderOptions::new(app_scoped_store),
            );

        info!(
            "State storage registered: global={}, shared={}, appScoped={}",
            global_store, shared_store, app_scoped_store
        );
        self.state = Some(StateStorageProviderFactory::new(
            self.services.clone(),
            options,
            create,
        ));
        self
    }

    /// Register a pub/sub component; `name` is both its logical name and
    /// the platform component name.
    #[must_use]
    pub fn pub_sub<F>(mut self, name: &str, create: F) -> Self
    where
        F: Fn(&ServiceRegistry, Option<&PubSubProviderOptions>) -> anyhow::Result<Arc<dyn PubSubProvider>>
            + Send
            + Sync
            + 'static,
    {
        let options = NamedOptions::new().configure(name, PubSubProviderOptions::new(name));

        info!("Pub/sub registered: {}", name);
        self.pub_sub = Some(Arc::new(PubSubRegistration {
            factory: PubSubProviderFactory::new(self.services.clone(), options, create),
            default_name: name.to_string(),
        }));
        self
    }

    /// Register the managed cache over `distributed`. The manager is also
    /// published in the service registry.
    #[must_use]
    pub fn managed_caching(
        mut self,
        options: CacheManagerOptions,
        distributed: Arc<dyn DistributedCache>,
    ) -> Self {
        let manager = self
            .services
            .insert(CacheManager::new(distributed, options));

        info!("Managed caching registered");
        self.cache = Some(manager);
        self
    }

    pub fn build(self) -> AppServices {
        AppServices {
            services: self.services,
            state: self.state,
            pub_sub: self.pub_sub,
            cache: self.cache,
        }
    }
}

fn not_registered<T>(family: &str) -> Result<T> {
    Error::new(NOT_REGISTERED_CODE)
        .with_message(format!("No {} services were registered.", family))
        .with_target(family)
        .into()
}
