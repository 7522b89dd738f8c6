//! Cache configuration.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Configuration for the local (in-process) cache tier.
///
/// The fallback `ttl`/`tti` is resolved before a `CacheManager` write, so
/// the shared tier stores the entry with the same expiration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache.
    pub max_capacity: u64,

    /// Time-to-live applied to entries stored without expiration options.
    pub ttl: Option<Duration>,

    /// Time-to-idle applied to entries stored without expiration options.
    pub tti: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            ttl: None,
            tti: None,
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with the given max capacity.
    pub fn with_capacity(max_capacity: u64) -> Self {
        Self {
            max_capacity,
            ..Default::default()
        }
    }

    /// Set max capacity for cache (builder pattern).
    #[must_use]
    pub fn max_capacity(mut self, max_capacity: u64) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    /// Set the fallback time-to-live.
    #[must_use]
    pub fn ttl(mut self, duration: Duration) -> Self {
        self.ttl = Some(duration);
        self
    }

    /// Set the fallback time-to-idle.
    #[must_use]
    pub fn tti(mut self, duration: Duration) -> Self {
        self.tti = Some(duration);
        self
    }

    /// The expiration used for an entry that was stored without any.
    pub(crate) fn fallback_options(&self) -> EntityCacheOptions {
        EntityCacheOptions {
            absolute_expiration: None,
            absolute_expiration_relative_to_now: self.ttl,
            sliding_expiration: self.tti,
        }
    }

    /// `options`, or the fallback when they set no expiration at all.
    pub fn resolve(&self, options: &EntityCacheOptions) -> EntityCacheOptions {
        if options.is_unbounded() {
            self.fallback_options()
        } else {
            *options
        }
    }
}

/// Expiration policy for a single cache entry.
///
/// The same options are applied to both tiers. When both an absolute point
/// in time and a relative duration are given, the earlier one wins. A
/// sliding window is renewed on every read but never extends an entry past
/// its absolute deadline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntityCacheOptions {
    pub absolute_expiration: Option<DateTime<Utc>>,
    pub absolute_expiration_relative_to_now: Option<Duration>,
    pub sliding_expiration: Option<Duration>,
}

impl EntityCacheOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expire at a fixed point in time.
    #[must_use]
    pub fn absolute(mut self, at: DateTime<Utc>) -> Self {
        self.absolute_expiration = Some(at);
        self
    }

    /// Expire a fixed duration after the write.
    #[must_use]
    pub fn relative(mut self, duration: Duration) -> Self {
        self.absolute_expiration_relative_to_now = Some(duration);
        self
    }

    /// Expire after a period without reads.
    #[must_use]
    pub fn sliding(mut self, duration: Duration) -> Self {
        self.sliding_expiration = Some(duration);
        self
    }

    /// True when no expiration of any kind is set.
    pub fn is_unbounded(&self) -> bool {
        self.absolute_expiration.is_none()
            && self.absolute_expiration_relative_to_now.is_none()
            && self.sliding_expiration.is_none()
    }

    /// Time left until the absolute deadline, measured from `now`.
    ///
    /// A deadline already in the past yields `Duration::ZERO`.
    pub fn absolute_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        let from_point = self
            .absolute_expiration
            .map(|at| (at - now).to_std().unwrap_or(Duration::ZERO));

        match (from_point, self.absolute_expiration_relative_to_now) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_remaining_takes_the_earlier_deadline() {
        let now = Utc::now();
        let options = EntityCacheOptions::new()
            .absolute(now + chrono::Duration::seconds(30))
            .relative(Duration::from_secs(60));

        assert_eq!(options.absolute_remaining(now), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_past_deadline_is_zero() {
        let now = Utc::now();
        let options = EntityCacheOptions::new().absolute(now - chrono::Duration::seconds(5));

        assert_eq!(options.absolute_remaining(now), Some(Duration::ZERO));
    }

    #[test]
    fn test_unbounded_and_fallback() {
        assert!(EntityCacheOptions::new().is_unbounded());
        assert!(!EntityCacheOptions::new().sliding(Duration::from_secs(1)).is_unbounded());

        let fallback = CacheConfig::with_capacity(10)
            .ttl(Duration::from_secs(5))
            .fallback_options();
        assert_eq!(
            fallback.absolute_expiration_relative_to_now,
            Some(Duration::from_secs(5))
        );
    }

    #[test]
    fn test_resolve_keeps_explicit_options() {
        let config = CacheConfig::default().tti(Duration::from_secs(60));
        let explicit = EntityCacheOptions::new().relative(Duration::from_secs(1));

        assert_eq!(config.resolve(&explicit), explicit);
        assert_eq!(
            config.resolve(&EntityCacheOptions::new()).sliding_expiration,
            Some(Duration::from_secs(60))
        );
    }
}
