//! Cache Statistics Module
//!
//! Tracks cache activity: read hits and misses, reaped expirations, and
//! explicit deletes.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Stats ==
/// Point-in-time copy of the cache counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Number of reads that found a live value
    pub hits: u64,
    /// Number of reads that found nothing (absent or expired)
    pub misses: u64,
    /// Number of entries removed by the reaper
    pub expired: u64,
    /// Number of entries removed by explicit deletes
    pub deleted: u64,
    /// Current number of stored entries, including expired but unreaped ones
    pub total_entries: usize,
}

impl CacheStats {
    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no reads have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// == Stats Recorder ==
/// Lock-free counters shared by readers, writers and the reaper.
///
/// Reads record under the shared lock, so the counters are atomics rather
/// than fields mutated through `&mut`.
#[derive(Debug, Default)]
pub struct StatsRecorder {
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
    deleted: AtomicU64,
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expired(&self, count: usize) {
        self.expired.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_deleted(&self, count: usize) {
        self.deleted.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Copies the counters into a [`CacheStats`].
    pub fn snapshot(&self, total_entries: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            deleted: self.deleted.load(Ordering::Relaxed),
            total_entries,
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = StatsRecorder::new().snapshot(0);
        assert_eq!(stats, CacheStats::default());
    }

    #[test]
    fn test_hit_rate_no_requests() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let recorder = StatsRecorder::new();
        recorder.record_hit();
        recorder.record_hit();
        recorder.record_hit();
        recorder.record_miss();

        assert_eq!(recorder.snapshot(0).hit_rate(), 0.75);
    }

    #[test]
    fn test_record_removals() {
        let recorder = StatsRecorder::new();
        recorder.record_expired(3);
        recorder.record_expired(0);
        recorder.record_deleted(2);

        let stats = recorder.snapshot(42);
        assert_eq!(stats.expired, 3);
        assert_eq!(stats.deleted, 2);
        assert_eq!(stats.total_entries, 42);
    }

    #[test]
    fn test_stats_serialize() {
        let json = serde_json::to_value(StatsRecorder::new().snapshot(1)).unwrap();
        assert_eq!(json["total_entries"], 1);
        assert_eq!(json["hits"], 0);
    }
}
