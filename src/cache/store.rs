//! TTL Cache Module
//!
//! Time-expiring map from normalized subject name to college record.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::cache::stats::StatsCounters;
use crate::cache::{normalize_key, CacheEntry, CacheStats};
use crate::models::College;

// == TTL Cache ==
/// In-process cache with per-entry expiry.
///
/// The map is only reachable through the methods below. Lookups share a read
/// lock; `set`, lazy eviction and the sweep take the write lock.
#[derive(Debug)]
pub struct TtlCache {
    /// Normalized key to entry
    entries: RwLock<HashMap<String, CacheEntry>>,
    /// Hit/miss counters
    stats: StatsCounters,
    /// TTL applied by `insert`
    default_ttl: Duration,
}

impl TtlCache {
    // == Constructor ==
    /// Creates an empty cache whose `insert` uses `default_ttl`.
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            stats: StatsCounters::default(),
            default_ttl,
        }
    }

    /// TTL applied by [`TtlCache::insert`].
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    // == Get ==
    /// Returns a copy of the record if present and not expired.
    ///
    /// Absent and expired both surface as `None`. An expired entry found here
    /// is removed.
    pub async fn get(&self, key: &str) -> Option<College> {
        let key = normalize_key(key);
        let now = Instant::now();

        {
            let entries = self.entries.read().await;
            match entries.get(&key) {
                Some(entry) if !entry.is_expired_at(now) => {
                    self.stats.record_hit();
                    return Some(entry.value.clone());
                }
                Some(_) => {}
                None => {
                    self.stats.record_miss();
                    return None;
                }
            }
        }

        // Expired: upgrade to the write lock and evict, unless a writer
        // refreshed the entry in between.
        self.stats.record_miss();
        let mut entries = self.entries.write().await;
        if entries
            .get(&key)
            .is_some_and(|entry| entry.is_expired_at(Instant::now()))
        {
            entries.remove(&key);
            self.stats.record_expired(1);
            debug!(key = %key, "Evicted expired cache entry on read");
        }
        None
    }

    // == Set ==
    /// Inserts or overwrites `key`, resetting its expiry to `now + ttl`.
    pub async fn set(&self, key: &str, value: College, ttl: Duration) {
        let key = normalize_key(key);
        let entry = CacheEntry::new(value, ttl);
        self.entries.write().await.insert(key, entry);
    }

    /// Same as [`TtlCache::set`] using the default TTL.
    pub async fn insert(&self, key: &str, value: College) {
        self.set(key, value, self.default_ttl).await;
    }

    // == Cleanup Expired ==
    /// Removes all expired entries and returns how many were removed.
    pub async fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        let removed = before - entries.len();

        self.stats.record_expired(removed);
        removed
    }

    // == Stats ==
    pub async fn stats(&self) -> CacheStats {
        let total = self.entries.read().await.len();
        self.stats.snapshot(total)
    }

    /// Number of stored entries, expired ones included until evicted.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
