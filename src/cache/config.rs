//! Cache configuration.

use std::time::Duration;

/// Configuration for a cache instance.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache.
    pub max_capacity: u64,

    /// Time-to-live for cache entries.
    /// After this duration, entries are automatically evicted.
    pub ttl: Option<Duration>,

    /// Time-to-idle for cache entries.
    pub tti: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            ttl: Some(Duration::from_secs(300)), // 5 minutes
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

    /// Set time-to-live for cache entries.
    #[must_use]
    pub fn ttl(mut self, duration: Duration) -> Self {
        self.ttl = Some(duration);
        self
    }

    /// User ledger rows read on every menu interaction.
    /// Writes invalidate, so the TTL only bounds staleness from other processes.
    pub fn user_profile() -> Self {
        Self {
            max_capacity: 20_000,
            ttl: Some(Duration::from_secs(600)), // 10 minutes
            tti: Some(Duration::from_secs(300)),
        }
    }

    /// Flood guard membership window. The TTL *is* the window length.
    pub fn throttle_window(window: Duration) -> Self {
        Self {
            max_capacity: 10_000,
            ttl: Some(window),
            tti: None,
        }
    }

    /// Referral codes remembered while a visitor still has to join the main channel.
    pub fn pending_referral() -> Self {
        Self {
            max_capacity: 10_000,
            ttl: Some(Duration::from_secs(3600)), // 1 hour
            tti: None,
        }
    }
}
