//! Cache Backend Trait
//!
//! Backend-neutral cache contract. Callers written against [`Cache`] do not
//! depend on the concrete engine.

use std::time::Duration;

use crate::cache::CacheItem;
use crate::error::Result;

// == Cache Trait ==
/// Standard cache operations over values of type `V`.
///
/// Object safe, so backends can be held as `Box<dyn Cache<V>>`.
pub trait Cache<V>: Send + Sync {
    /// Stores `value` under `key` for `ttl`, replacing any existing entry.
    fn set(&self, key: &str, value: V, ttl: Duration) -> Result<()>;

    /// Returns the live value for `key`, or `None` if absent or expired.
    fn get(&self, key: &str) -> Result<Option<V>>;

    /// Removes the listed keys, returning how many were present.
    fn delete(&self, keys: &[&str]) -> Result<usize>;

    /// Counts the listed keys that are present and not expired.
    fn exists(&self, keys: &[&str]) -> Result<usize>;

    /// Moves the expiry of `key` to `ttl` from now. False if absent.
    fn renew_expiry(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Returns every live entry.
    fn enumerate(&self) -> Result<Vec<CacheItem<V>>>;

    /// Releases the backend. Later operations fail with `CacheError::Closed`.
    fn close(&self) -> Result<()>;
}
