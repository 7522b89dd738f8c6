//! Named-instance factories.
//!
//! Callers ask for "the X named Y" and get back a shared instance without
//! knowing how it is built.
//!
//! ## Architecture
//!
//! - `NamedOptions` - options registered per logical name at startup
//! - `ServiceRegistry` - shared collaborators a creation function may pull
//! - `GenericFactory` - resolves name -> options -> instance, once per name
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use appkit::factory::{GenericFactory, NamedOptions, ServiceRegistry};
//!
//! let options = NamedOptions::new().configure("primary", 5432_u16);
//! let factory: GenericFactory<u16, String> =
//!     GenericFactory::new(ServiceRegistry::new(), options, |_, port| {
//!         Ok(Arc::new(format!("db:{}", port.copied().unwrap_or_default())))
//!     });
//!
//! assert_eq!(factory.get_item("primary").value().as_str(), "db:5432");
//! assert!(factory.get_item("replica").is_fail());
//! ```

mod generic;
mod named_options;
mod services;

pub use generic::{CONSTRUCTION_FAILED_CODE, CreateFn, GenericFactory, NOT_CONFIGURED_CODE};
pub use named_options::NamedOptions;
pub use services::{SERVICE_NOT_REGISTERED_CODE, ServiceRegistry};
