//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::Duration;

use tokio::time::Instant;

use crate::models::College;

// == Cache Entry ==
/// A cached college record and its expiry deadline.
///
/// Timestamps come from `tokio::time::Instant`, so tests running on a paused
/// runtime clock control expiry deterministically.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored record
    pub value: College,
    /// When the entry was written
    pub created_at: Instant,
    /// The entry is visible only while `now < expires_at`
    pub expires_at: Instant,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry that expires `ttl` from now.
    pub fn new(value: College, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            value,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    // == Is Expired ==
    /// Checks whether the entry has expired at `now`.
    ///
    /// An entry is expired once `now >= expires_at`. Both lazy eviction on
    /// read and the periodic sweep use this test.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    /// Checks whether the entry has expired at the current instant.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    // == Time To Live ==
    /// Returns the remaining lifetime, or zero once expired.
    pub fn ttl_remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn college() -> College {
        College::named("MIT", "United States")
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_not_expired_before_ttl() {
        let entry = CacheEntry::new(college(), Duration::from_secs(60));
        assert!(!entry.is_expired());

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(!entry.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let entry = CacheEntry::new(college(), Duration::from_secs(1));
        tokio::time::advance(Duration::from_millis(1100)).await;
        assert!(entry.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_remaining() {
        let entry = CacheEntry::new(college(), Duration::from_secs(10));
        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(entry.ttl_remaining(), Duration::from_secs(6));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(entry.ttl_remaining(), Duration::ZERO);
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let entry = CacheEntry::new(college(), Duration::ZERO);
        // Entry should be expired when now >= expires_at
        assert!(entry.is_expired_at(entry.expires_at), "Entry should be expired at boundary");
        assert!(!entry.is_expired_at(entry.created_at - Duration::from_millis(1)));
    }
}
