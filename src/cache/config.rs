//! In-process cache configuration.

use std::time::Duration;

const DEFAULT_TTL_SECS: u64 = 300;

/// TTL cache configuration resolved from `[cache]` settings.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Serve and fill the in-process cache.
    pub enabled: bool,
    /// Lifetime applied uniformly to every entry.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            ttl: settings.ttl,
        }
    }
}
