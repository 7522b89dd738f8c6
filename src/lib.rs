//! appkit - building blocks for application services.
//!
//! - [`errors`] - `Result`/`Error` values with a stable JSON shape
//! - [`factory`] - named, lazily built, shared instances
//! - [`cache`] - two-tier cache-aside manager
//! - [`appservices`] - state storage, pub/sub and caching behind one handle
//! - [`config`] / [`logging`] - host startup helpers

pub mod appservices;
pub mod cache;
pub mod config;
pub mod errors;
pub mod factory;
pub mod logging;
