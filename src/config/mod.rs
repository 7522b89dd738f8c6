//! Configuration module for appkit hosts.
//!
//! Loads configuration from environment variables (and `.env`).

use std::env;

use crate::cache::{CacheConfig, CacheManagerOptions, JsonSerializer};

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Pub/sub component behind the default pub/sub provider.
    pub pub_sub_name: String,

    // State stores
    pub state_global: String,
    pub state_shared: String,
    pub state_app_scoped: String,

    // Cache
    pub cache_local_capacity: u64,
    pub cache_pretty_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pub_sub_name: "pubsub".to_string(),
            state_global: "statestore-global".to_string(),
            state_shared: "statestore-shared".to_string(),
            state_app_scoped: "statestore-appscoped".to_string(),
            cache_local_capacity: 10_000,
            cache_pretty_json: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Every variable is optional; missing or unparseable values fall back
    /// to the defaults.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let text = |key: &str, default: String| {
            lookup(key)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or(default)
        };

        let cache_local_capacity = lookup("APPKIT_CACHE_LOCAL_CAPACITY")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(defaults.cache_local_capacity);

        let cache_pretty_json = match lookup("APPKIT_CACHE_PRETTY_JSON")
            .map(|s| s.trim().to_lowercase())
            .as_deref()
        {
            Some("1" | "true" | "yes") => true,
            Some("0" | "false" | "no") => false,
            _ => defaults.cache_pretty_json,
        };

        Self {
            pub_sub_name: text("APPKIT_PUBSUB_NAME", defaults.pub_sub_name),
            state_global: text("APPKIT_STATE_GLOBAL", defaults.state_global),
            state_shared: text("APPKIT_STATE_SHARED", defaults.state_shared),
            state_app_scoped: text("APPKIT_STATE_APP_SCOPED", defaults.state_app_scoped),
            cache_local_capacity,
            cache_pretty_json,
        }
    }

    /// Options for a JSON-backed cache manager.
    pub fn cache_options(&self) -> CacheManagerOptions {
        CacheManagerOptions {
            serializer: JsonSerializer::new().pretty(self.cache_pretty_json),
            local: CacheConfig::with_capacity(self.cache_local_capacity),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        assert_eq!(config_from(&[]), Config::default());
    }

    #[test]
    fn test_reads_overrides() {
        let config = config_from(&[
            ("APPKIT_PUBSUB_NAME", "events"),
            ("APPKIT_STATE_APP_SCOPED", " orders-state "),
            ("APPKIT_CACHE_LOCAL_CAPACITY", "256"),
            ("APPKIT_CACHE_PRETTY_JSON", "TRUE"),
        ]);

        assert_eq!(config.pub_sub_name, "events");
        assert_eq!(config.state_app_scoped, "orders-state");
        assert_eq!(config.state_global, "statestore-global");
        assert_eq!(config.cache_local_capacity, 256);
        assert!(config.cache_pretty_json);
    }

    #[test]
    fn test_unparseable_values_fall_back() {
        let config = config_from(&[
            ("APPKIT_CACHE_LOCAL_CAPACITY", "lots"),
            ("APPKIT_CACHE_PRETTY_JSON", "maybe"),
            ("APPKIT_PUBSUB_NAME", "   "),
        ]);

        assert_eq!(config.cache_local_capacity, 10_000);
        assert!(!config.cache_pretty_json);
        assert_eq!(config.pub_sub_name, "pubsub");
    }

    #[test]
    fn test_cache_options() {
        let options = config_from(&[("APPKIT_CACHE_LOCAL_CAPACITY", "42")]).cache_options();
        assert_eq!(options.local.max_capacity, 42);
        assert!(!options.serializer.pretty);
    }
}
