//! Cache Entry Module
//!
//! Defines the stored entry, its expiry arithmetic, and the public snapshot type.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

/// Lifetime used when `now + ttl` overflows the clock (roughly 30 years).
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

// == Cache Entry ==
/// A single stored value with its absolute expiration.
#[derive(Debug, Clone)]
pub struct Entry<V> {
    /// The stored value
    pub value: V,
    /// Absolute instant at which the entry stops being observable
    pub expires_at: Instant,
    /// Index of this entry's slot in the expiry heap
    pub position: usize,
}

impl<V> Entry<V> {
    /// Creates an entry that is not yet placed in the heap.
    pub fn new(value: V, expires_at: Instant) -> Self {
        Self {
            value,
            expires_at,
            position: usize::MAX,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now`.
    ///
    /// Boundary condition: an entry is expired once `now >= expires_at`, so a
    /// read exactly at `t0 + ttl` already misses.
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    /// Returns the remaining lifetime at `now`, zero once expired.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }
}

// == Expiry Arithmetic ==
/// Computes `now + ttl`, saturating to a far-future instant on overflow.
pub fn expires_at(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl).unwrap_or_else(|| now + FAR_FUTURE)
}

/// Projects a monotonic expiry onto the wall clock.
pub fn wall_clock_expiry(
    expires_at: Instant,
    now: Instant,
    now_utc: DateTime<Utc>,
) -> DateTime<Utc> {
    let remaining = expires_at.saturating_duration_since(now);
    chrono::Duration::from_std(remaining)
        .ok()
        .and_then(|delta| now_utc.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

// == Cache Item ==
/// A point-in-time view of a live entry, as returned by enumeration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheItem<V> {
    /// The entry's key
    pub key: String,
    /// A clone of the stored value
    pub value: V,
    /// Wall-clock expiration time
    pub expires_at: DateTime<Utc>,
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_creation() {
        let now = Instant::now();
        let entry = Entry::new("test_value", expires_at(now, Duration::from_secs(60)));

        assert_eq!(entry.value, "test_value");
        assert_eq!(entry.position, usize::MAX);
        assert!(!entry.is_expired(now));
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let now = Instant::now();
        let entry = Entry::new("test", expires_at(now, Duration::from_millis(100)));

        assert!(!entry.is_expired(now + Duration::from_millis(99)));
        assert!(
            entry.is_expired(now + Duration::from_millis(100)),
            "Entry should be expired at boundary"
        );
    }

    #[test]
    fn test_zero_ttl_expires_immediately() {
        let now = Instant::now();
        let entry = Entry::new(1, expires_at(now, Duration::ZERO));

        assert!(entry.is_expired(now));
    }

    #[test]
    fn test_remaining() {
        let now = Instant::now();
        let entry = Entry::new(1, expires_at(now, Duration::from_secs(10)));

        assert_eq!(entry.remaining(now), Duration::from_secs(10));
        assert_eq!(entry.remaining(now + Duration::from_secs(4)), Duration::from_secs(6));
        assert_eq!(entry.remaining(now + Duration::from_secs(11)), Duration::ZERO);
    }

    #[test]
    fn test_expires_at_saturates() {
        let now = Instant::now();
        let deadline = expires_at(now, Duration::MAX);

        assert_eq!(deadline, now + FAR_FUTURE);
    }

    #[test]
    fn test_wall_clock_expiry() {
        let now = Instant::now();
        let now_utc = Utc::now();
        let deadline = expires_at(now, Duration::from_secs(5));

        let wall = wall_clock_expiry(deadline, now, now_utc);
        assert_eq!(wall - now_utc, chrono::Duration::seconds(5));

        // Past deadlines clamp to the snapshot time
        let wall = wall_clock_expiry(now, now + Duration::from_secs(1), now_utc);
        assert_eq!(wall, now_utc);
    }

    #[test]
    fn test_cache_item_serializes() {
        let item = CacheItem {
            key: "k".to_string(),
            value: "v".to_string(),
            expires_at: DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
        };

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["key"], "k");
        assert_eq!(json["value"], "v");
        assert_eq!(json["expires_at"], "1970-01-01T00:00:00Z");
    }
}
