//! Expiry Store Module
//!
//! Core cache engine keeping the key index and the expiry heap in lockstep.
//! The store is single-threaded and takes the current instant as an argument;
//! locking and scheduling live in [`crate::TtlCache`].

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::cache::entry::Entry;
use crate::cache::heap::{ExpiryHeap, Slot};
use crate::cache::index::KeyIndex;

// == Expiry Store ==
/// Key index plus expiry heap.
///
/// A key is in the index iff its slot is in the heap, and every entry's
/// `position` names the heap slot holding its key.
#[derive(Debug)]
pub struct ExpiryStore<V> {
    /// Key lookup
    index: KeyIndex<V>,
    /// Expiration ordering
    heap: ExpiryHeap,
}

impl<V> ExpiryStore<V> {
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            index: KeyIndex::new(),
            heap: ExpiryHeap::new(),
        }
    }

    // == Set ==
    /// Stores `value` under `key` until `expires_at`.
    ///
    /// An existing entry for the key is detached from both structures first,
    /// so a key never owns more than one heap slot. Returns true if an entry
    /// was replaced.
    pub fn set(&mut self, key: &str, value: V, expires_at: Instant) -> bool {
        let (key, replaced) = match self.detach(key) {
            Some((slot, _)) => (slot.key, true),
            None => (Arc::from(key), false),
        };

        self.index.insert(Arc::clone(&key), Entry::new(value, expires_at));
        self.heap.insert(Slot { key, expires_at }, &mut self.index);
        replaced
    }

    // == Get ==
    /// Returns the value for `key` if it is stored and not expired at `now`.
    ///
    /// Expired entries are left in place for the reaper.
    pub fn get(&self, key: &str, now: Instant) -> Option<&V> {
        self.index
            .lookup(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| &entry.value)
    }

    /// Returns true if `key` is stored and not expired at `now`.
    pub fn is_live(&self, key: &str, now: Instant) -> bool {
        self.get(key, now).is_some()
    }

    /// Returns the remaining lifetime of a live key.
    pub fn remaining(&self, key: &str, now: Instant) -> Option<Duration> {
        self.index
            .lookup(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.remaining(now))
    }

    // == Remove ==
    /// Removes `key` from both structures, returning its value.
    ///
    /// Absent keys are a no-op.
    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.detach(key).map(|(_, entry)| entry.value)
    }

    // == Renew ==
    /// Moves `key` to a new expiration. Returns false if the key is absent.
    pub fn renew(&mut self, key: &str, expires_at: Instant) -> bool {
        let Some(position) = self.index.lookup(key).map(|entry| entry.position) else {
            return false;
        };
        let Some(slot) = self.heap.remove_at(position, &mut self.index) else {
            return false;
        };

        if let Some(entry) = self.index.lookup_mut(key) {
            entry.expires_at = expires_at;
        }
        self.heap.insert(
            Slot {
                key: slot.key,
                expires_at,
            },
            &mut self.index,
        );
        true
    }

    // == Pop Expired ==
    /// Removes every entry whose expiration is at or before `now`.
    ///
    /// Returns the number of entries removed.
    pub fn pop_expired(&mut self, now: Instant) -> usize {
        let mut removed = 0;

        while self
            .heap
            .peek_min()
            .is_some_and(|slot| slot.expires_at <= now)
        {
            let Some(slot) = self.heap.pop_min(&mut self.index) else {
                break;
            };
            self.index.remove(&slot.key);
            removed += 1;
        }

        removed
    }

    // == Next Deadline ==
    /// Returns the soonest expiration, or `None` when empty.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.heap.peek_min().map(|slot| slot.expires_at)
    }

    // == Live Entries ==
    /// Iterates entries that are not expired at `now`, in no particular order.
    pub fn live(&self, now: Instant) -> impl Iterator<Item = (&str, &Entry<V>)> {
        self.index
            .iter()
            .filter(move |(_, entry)| !entry.is_expired(now))
            .map(|(key, entry)| (&**key, entry))
    }

    // == Length ==
    /// Returns the number of stored entries, including expired but unreaped ones.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Discards every entry.
    pub fn clear(&mut self) {
        self.index.clear();
        self.heap.clear();
    }

    /// Removes `key` from the index, then its slot from the heap.
    fn detach(&mut self, key: &str) -> Option<(Slot, Entry<V>)> {
        let entry = self.index.remove(key)?;
        let slot = self.heap.remove_at(entry.position, &mut self.index)?;
        debug_assert_eq!(&*slot.key, key, "heap slot out of sync with index");
        Some((slot, entry))
    }

    // == Consistency Check ==
    /// Checks index/heap lockstep, recorded positions, and the heap property.
    #[cfg(test)]
    pub(crate) fn is_consistent(&self) -> bool {
        self.index.len() == self.heap.len()
            && self.heap.is_valid()
            && self.heap.iter().enumerate().all(|(position, slot)| {
                self.index.lookup(&slot.key).is_some_and(|entry| {
                    entry.position == position && entry.expires_at == slot.expires_at
                })
            })
    }
}

impl<V> Default for ExpiryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}
