//! Generic named-instance factory.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use tracing::{debug, warn};

use super::{NamedOptions, ServiceRegistry};
use crate::errors::{Error, Result};

/// Error code when no options are registered under the requested name.
pub const NOT_CONFIGURED_CODE: &str = "factory.not_configured";

/// Error code when the creation function fails.
pub const CONSTRUCTION_FAILED_CODE: &str = "factory.construction_failed";

/// Builds a service from its (possibly unset) named options.
pub type CreateFn<O, S> =
    Arc<dyn Fn(&ServiceRegistry, Option<&O>) -> anyhow::Result<Arc<S>> + Send + Sync>;

/// Resolves a logical name to a lazily built, reused service instance.
///
/// The first successful lookup of a name runs the creation function and
/// keeps the instance for the lifetime of the factory. Concurrent first
/// lookups of the same name wait on a per-name cell, so construction runs
/// at most once. A failed construction is not cached; the next lookup
/// tries again.
///
/// `S` is usually a trait object such as `dyn StateStorageProvider`.
pub struct GenericFactory<O, S: ?Sized> {
    services: ServiceRegistry,
    options: Arc<NamedOptions<O>>,
    create: CreateFn<O, S>,
    instances: Arc<RwLock<HashMap<String, Arc<OnceCell<Arc<S>>>>>>,
}

// Manual Clone so neither O nor S needs to be Clone
impl<O, S: ?Sized> Clone for GenericFactory<O, S> {
    fn clone(&self) -> Self {
        Self {
            services: self.services.clone(),
            options: Arc::clone(&self.options),
            create: Arc::clone(&self.create),
            instances: Arc::clone(&self.instances),
        }
    }
}

impl<O, S> GenericFactory<O, S>
where
    O: Send + Sync + 'static,
    S: ?Sized + Send + Sync + 'static,
{
    /// Create a factory over frozen options and a creation function.
    pub fn new<F>(services: ServiceRegistry, options: NamedOptions<O>, create: F) -> Self
    where
        F: Fn(&ServiceRegistry, Option<&O>) -> anyhow::Result<Arc<S>> + Send + Sync + 'static,
    {
        debug!(
            "Generic factory initialized for {} with names {:?}",
            std::any::type_name::<S>(),
            options.names()
        );

        Self {
            services,
            options: Arc::new(options),
            create: Arc::new(create),
            instances: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get the instance registered under `name`, building it on first use.
    ///
    /// Fails with `factory.not_configured` for unknown names and with
    /// `factory.construction_failed` (cause attached as inner error) when
    /// the creation function returns an error. Never panics.
    pub fn get_item(&self, name: &str) -> Result<Arc<S>> {
        let Some(options) = self.options.get(name) else {
            debug!("No options registered for '{}'", name);
            return Error::new(NOT_CONFIGURED_CODE)
                .with_message(format!(
                    "No {} is configured under the name \"{}\".",
                    std::any::type_name::<S>(),
                    name
                ))
                .with_target(name)
                .into();
        };

        let cell = self.cell_for(name);
        let built = cell.get_or_try_init(|| {
            debug!("Creating instance for '{}'", name);
            (self.create)(&self.services, options)
        });

        match built {
            Ok(instance) => Result::Success(Arc::clone(instance)),
            Err(err) => {
                warn!("Failed to create instance for '{}': {:#}", name, err);
                Error::new(CONSTRUCTION_FAILED_CODE)
                    .with_message(format!("Unable to create the instance named \"{name}\"."))
                    .with_target(name)
                    .with_inner(Error::from_anyhow(&err))
                    .into()
            }
        }
    }

    /// Check if options are registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.options.contains(name)
    }

    /// Names with registered options.
    pub fn names(&self) -> Vec<&str> {
        self.options.names()
    }

    /// Number of instances built so far.
    pub fn instance_count(&self) -> usize {
        self.instances
            .read()
            .values()
            .filter(|cell| cell.get().is_some())
            .count()
    }

    pub fn services(&self) -> &ServiceRegistry {
        &self.services
    }

    fn cell_for(&self, name: &str) -> Arc<OnceCell<Arc<S>>> {
        if let Some(cell) = self.instances.read().get(name) {
            return Arc::clone(cell);
        }

        let mut instances = self.instances.write();
        Arc::clone(instances.entry(name.to_string()).or_default())
    }
}

impl<O, S: ?Sized> std::fmt::Debug for GenericFactory<O, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenericFactory")
            .field("service", &std::any::type_name::<S>())
            .field("names", &self.options.len())
            .field("instances", &self.instances.read().len())
            .finish()
    }
}
