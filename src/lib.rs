//! TTL Cache - An in-process time-to-live cache
//!
//! Stores values under string keys with an absolute expiration. Expired
//! entries are hidden from reads immediately and removed by a background
//! reaper that wakes exactly when the soonest entry falls due.

pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;
mod ttl_cache;

pub use backend::Cache;
pub use cache::{CacheItem, CacheStats};
pub use config::Config;
pub use error::{CacheError, Result};
pub use ttl_cache::TtlCache;
