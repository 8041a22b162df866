//! Error types for the TTL cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the TTL cache.
///
/// Misses are never errors: lookups report them as `None`. The variants here
/// describe misuse of a cache instance.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheError {
    /// The cache has been closed and no longer accepts operations
    #[error("cache is closed")]
    Closed,

    /// The cache was constructed outside of a Tokio runtime
    #[error("no Tokio runtime available to spawn the reaper task")]
    NoRuntime,
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
