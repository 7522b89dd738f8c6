//! Service registry - shared collaborators keyed by type.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::errors::{Error, Result};

/// Error code for [`ServiceRegistry::require`] when nothing is registered.
pub const SERVICE_NOT_REGISTERED_CODE: &str = "services.not_registered";

/// Type-keyed registry of shared collaborators.
///
/// Creation functions receive a handle to this registry so they can pull
/// whatever else they need (a client, a serializer, another factory).
/// Cloning is cheap and every clone sees the same entries.
///
/// ## Example
///
/// ```rust
/// use appkit::factory::ServiceRegistry;
///
/// struct Clock;
///
/// let services = ServiceRegistry::new();
/// services.insert(Clock);
/// assert!(services.get::<Clock>().is_some());
/// ```
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    entries: Arc<RwLock<HashMap<TypeId, ServiceEntry>>>,
}

/// Internal entry storing a type-erased shared service.
struct ServiceEntry {
    service: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service, replacing any previous one of the same type.
    pub fn insert<T>(&self, service: T) -> Arc<T>
    where
        T: Send + Sync + 'static,
    {
        self.insert_arc(Arc::new(service))
    }

    /// Register an already shared service.
    pub fn insert_arc<T>(&self, service: Arc<T>) -> Arc<T>
    where
        T: Send + Sync + 'static,
    {
        let type_name = std::any::type_name::<T>();
        debug!("Registering service: {}", type_name);

        self.entries.write().insert(
            TypeId::of::<T>(),
            ServiceEntry {
                service: service.clone(),
                type_name,
            },
        );

        service
    }

    /// Get a service by type, `None` if it was never registered.
    pub fn get<T>(&self) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        let entries = self.entries.read();
        entries
            .get(&TypeId::of::<T>())
            .and_then(|entry| Arc::clone(&entry.service).downcast::<T>().ok())
    }

    /// Get a service by type, failing with `services.not_registered`.
    pub fn require<T>(&self) -> Result<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        match self.get::<T>() {
            Some(service) => Result::Success(service),
            None => Error::new(SERVICE_NOT_REGISTERED_CODE)
                .with_message(format!(
                    "No service of type {} is registered.",
                    std::any::type_name::<T>()
                ))
                .with_target(std::any::type_name::<T>())
                .into(),
        }
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.entries.read().contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.read();
        f.debug_struct("ServiceRegistry")
            .field("service_count", &entries.len())
            .field(
                "services",
                &entries.values().map(|e| e.type_name).collect::<Vec<_>>(),
            )
            .finish()
    }
}
