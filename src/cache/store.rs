//! Time-boxed in-process cache.
//!
//! Every entry carries the instant it was stored; it is readable while
//! `now - stored_at < ttl` and removed lazily by the first read after that.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::counter;
use serde::Serialize;
use tokio::time::Instant;
use tracing::trace;

use super::clock::{Clock, TokioClock};
use super::config::CacheConfig;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::store";
const METRIC_TTL_HIT: &str = "vellum_cache_ttl_hit_total";
const METRIC_TTL_MISS: &str = "vellum_cache_ttl_miss_total";
const METRIC_TTL_EXPIRED: &str = "vellum_cache_ttl_expired_total";

struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

/// Point-in-time counters of a [`TtlCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
}

/// Key/value store with a uniform, absolute expiry per entry.
pub struct TtlCache<K, V> {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Create a cache driven by the tokio clock.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(TokioClock))
    }

    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expired: AtomicU64::new(0),
        }
    }

    /// Return the value for `key` if present and unexpired.
    ///
    /// An expired entry is removed as a side effect of this call.
    pub fn get(&self, key: &K) -> Option<V> {
        if !self.config.enabled {
            return None;
        }

        let now = self.clock.now();
        let mut entries = mutex_lock(&self.entries, SOURCE, "get");
        let fresh = match entries.get(key) {
            Some(entry) if now.saturating_duration_since(entry.stored_at) < self.config.ttl => {
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                self.expired.fetch_add(1, Ordering::Relaxed);
                counter!(METRIC_TTL_EXPIRED).increment(1);
                trace!(cache = "ttl", outcome = "expired", "removed stale entry");
                None
            }
            None => None,
        };

        if fresh.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            counter!(METRIC_TTL_HIT).increment(1);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            counter!(METRIC_TTL_MISS).increment(1);
        }
        fresh
    }

    /// Store `value` stamped with the current time, replacing any prior entry.
    pub fn set(&self, key: K, value: V) {
        if !self.config.enabled {
            return;
        }

        let stored_at = self.clock.now();
        mutex_lock(&self.entries, SOURCE, "set").insert(key, CacheEntry { value, stored_at });
    }

    /// Drop every entry.
    pub fn clear(&self) {
        mutex_lock(&self.entries, SOURCE, "clear").clear();
    }

    /// Number of physically stored entries, expired ones included.
    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
        }
    }
}
