//! Cache Module
//!
//! Provides the expiry engine: entries, the key index, the expiry heap, and
//! the store that keeps the two in lockstep.

mod entry;
mod heap;
mod index;
mod stats;
mod store;


// Re-export public types
pub use entry::{expires_at, wall_clock_expiry, CacheItem, Entry};
pub use heap::{ExpiryHeap, PositionMap, Slot};
pub use index::KeyIndex;
pub use stats::{CacheStats, StatsRecorder};
pub use store::ExpiryStore;
