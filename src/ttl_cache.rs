//! TTL Cache Facade
//!
//! Public entry point. Serializes every mutation behind the write half of a
//! `RwLock` and re-arms the reaper before the lock is released.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::Utc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, trace};

use crate::backend::Cache;
use crate::cache::{
    expires_at, wall_clock_expiry, CacheItem, CacheStats, ExpiryStore, StatsRecorder,
};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::tasks::{spawn_reaper, Reap, Schedule};

// == Shared State ==
/// Store plus lifecycle flag, guarded together.
struct State<V> {
    store: ExpiryStore<V>,
    closed: bool,
}

/// State shared between the facade and the reaper task.
struct Shared<V> {
    state: RwLock<State<V>>,
    schedule: watch::Sender<Schedule>,
    stats: StatsRecorder,
}

impl<V> Shared<V> {
    // A value's `Drop` may panic while the write lock is held. Entries are
    // fully detached before they drop, so a poisoned lock still guards
    // consistent structures.
    fn read(&self) -> RwLockReadGuard<'_, State<V>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State<V>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publishes the schedule for the store's current soonest deadline.
    ///
    /// Must be called while the write lock is held.
    fn rearm(&self, store: &ExpiryStore<V>) {
        let next = Schedule::from_deadline(store.next_deadline());
        let changed = self.schedule.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if changed {
            trace!(?next, "Reaper re-armed");
        }
    }
}

impl<V: Send + Sync + 'static> Reap for Shared<V> {
    fn reap_expired(&self) -> usize {
        let mut state = self.write();
        if state.closed {
            return 0;
        }

        let removed = state.store.pop_expired(Instant::now());
        self.rearm(&state.store);
        self.stats.record_expired(removed);
        removed
    }
}

// == TTL Cache ==
/// In-process key/value cache with per-entry time-to-live.
///
/// Each instance owns one background reaper task on the Tokio runtime it was
/// created in. All operations are synchronous and never block on I/O.
///
/// # Example
/// ```no_run
/// use std::time::Duration;
/// use ttl_cache::{Config, TtlCache};
///
/// #[tokio::main]
/// async fn main() -> ttl_cache::Result<()> {
///     let cache = TtlCache::new(Config::default())?;
///     cache.set("session", "token".to_string(), Duration::from_secs(30))?;
///     assert_eq!(cache.get("session")?, Some("token".to_string()));
///     cache.close()
/// }
/// ```
pub struct TtlCache<V> {
    shared: Arc<Shared<V>>,
    reaper: JoinHandle<()>,
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a cache and spawns its reaper on the current Tokio runtime.
    ///
    /// # Errors
    /// Returns `CacheError::NoRuntime` when called outside a Tokio runtime.
    pub fn new(config: Config) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| CacheError::NoRuntime)?;
        let (schedule_tx, schedule_rx) = watch::channel(Schedule::Idle);

        let shared = Arc::new(Shared {
            state: RwLock::new(State {
                store: ExpiryStore::new(),
                closed: false,
            }),
            schedule: schedule_tx,
            stats: StatsRecorder::new(),
        });
        let reaper = spawn_reaper(
            &runtime,
            Arc::clone(&shared),
            schedule_rx,
            config.idle_rearm,
        );

        Ok(Self { shared, reaper })
    }

    /// Creates a cache with the default configuration.
    pub fn with_defaults() -> Result<Self> {
        Self::new(Config::default())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State<V>>> {
        let state = self.shared.read();
        if state.closed {
            return Err(CacheError::Closed);
        }
        Ok(state)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State<V>>> {
        let state = self.shared.write();
        if state.closed {
            return Err(CacheError::Closed);
        }
        Ok(state)
    }

    // == Set ==
    /// Stores a value that expires `ttl` from now.
    ///
    /// An existing entry for the key is replaced, value and expiry both.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `value` - The value to store
    /// * `ttl` - Lifetime of the entry; zero expires it immediately
    pub fn set(&self, key: &str, value: V, ttl: Duration) -> Result<()> {
        let mut state = self.write()?;
        let deadline = expires_at(Instant::now(), ttl);

        if state.store.set(key, value, deadline) {
            trace!(key, "Replaced existing entry");
        }
        self.shared.rearm(&state.store);
        Ok(())
    }

    // == Get ==
    /// Returns a clone of the value for `key`.
    ///
    /// Expired entries read as `None` even before the reaper removes them.
    pub fn get(&self, key: &str) -> Result<Option<V>> {
        let state = self.read()?;
        let value = state.store.get(key, Instant::now()).cloned();

        match value {
            Some(_) => self.shared.stats.record_hit(),
            None => self.shared.stats.record_miss(),
        }
        Ok(value)
    }

    // == Delete ==
    /// Removes every listed key that is present.
    ///
    /// Missing keys are ignored. Returns how many entries were removed.
    pub fn delete<I>(&self, keys: I) -> Result<usize>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut state = self.write()?;
        let mut removed = 0;
        for key in keys {
            if state.store.remove(key.as_ref()).is_some() {
                removed += 1;
            }
        }

        if removed > 0 {
            self.shared.rearm(&state.store);
            self.shared.stats.record_deleted(removed);
        }
        Ok(removed)
    }

    // == Exists ==
    /// Counts the listed keys that are present and not expired.
    ///
    /// A key listed twice is counted twice.
    pub fn exists<I>(&self, keys: I) -> Result<usize>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let state = self.read()?;
        let now = Instant::now();

        Ok(keys
            .into_iter()
            .filter(|key| state.store.is_live(key.as_ref(), now))
            .count())
    }

    // == Renew Expiry ==
    /// Moves the expiry of `key` to `ttl` from now.
    ///
    /// Returns false, without changing anything, when the key is absent.
    pub fn renew_expiry(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut state = self.write()?;
        let deadline = expires_at(Instant::now(), ttl);

        let renewed = state.store.renew(key, deadline);
        if renewed {
            self.shared.rearm(&state.store);
        }
        Ok(renewed)
    }

    // == Enumerate ==
    /// Returns a snapshot of every unexpired entry, in no particular order.
    pub fn enumerate(&self) -> Result<Vec<CacheItem<V>>> {
        let state = self.read()?;
        let now = Instant::now();
        let now_utc = Utc::now();

        Ok(state
            .store
            .live(now)
            .map(|(key, entry)| CacheItem {
                key: key.to_string(),
                value: entry.value.clone(),
                expires_at: wall_clock_expiry(entry.expires_at, now, now_utc),
            })
            .collect())
    }

    // == TTL ==
    /// Returns the remaining lifetime of `key`, or `None` if absent or expired.
    pub fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let state = self.read()?;
        Ok(state.store.remaining(key, Instant::now()))
    }

    // == Length ==
    /// Returns the number of stored entries, including expired ones the
    /// reaper has not removed yet.
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.store.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.store.is_empty())
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> Result<CacheStats> {
        let total_entries = self.read()?.store.len();
        Ok(self.shared.stats.snapshot(total_entries))
    }

    // == Close ==
    /// Stops the reaper and discards every entry.
    ///
    /// Every later operation fails with `CacheError::Closed`. Closing an
    /// already closed cache is a no-op.
    pub fn close(&self) -> Result<()> {
        let mut state = self.shared.write();
        if state.closed {
            return Ok(());
        }

        state.closed = true;
        state.store.clear();
        self.shared.schedule.send_replace(Schedule::Stopped);
        info!("Cache closed");
        Ok(())
    }

    /// Returns true once `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.shared.read().closed
    }

    /// Returns true while the background reaper task is alive.
    pub fn is_reaper_running(&self) -> bool {
        !self.reaper.is_finished()
    }
}

impl<V> Cache<V> for TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn set(&self, key: &str, value: V, ttl: Duration) -> Result<()> {
        TtlCache::set(self, key, value, ttl)
    }

    fn get(&self, key: &str) -> Result<Option<V>> {
        TtlCache::get(self, key)
    }

    fn delete(&self, keys: &[&str]) -> Result<usize> {
        TtlCache::delete(self, keys)
    }

    fn exists(&self, keys: &[&str]) -> Result<usize> {
        TtlCache::exists(self, keys)
    }

    fn renew_expiry(&self, key: &str, ttl: Duration) -> Result<bool> {
        TtlCache::renew_expiry(self, key, ttl)
    }

    fn enumerate(&self) -> Result<Vec<CacheItem<V>>> {
        TtlCache::enumerate(self)
    }

    fn close(&self) -> Result<()> {
        TtlCache::close(self)
    }
}

impl<V> Drop for TtlCache<V> {
    fn drop(&mut self) {
        self.shared.schedule.send_replace(Schedule::Stopped);
    }
}

impl<V> std::fmt::Debug for TtlCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.read();
        f.debug_struct("TtlCache")
            .field("entries", &state.store.len())
            .field("closed", &state.closed)
            .finish()
    }
}
