//! Key Index Module
//!
//! O(1) key lookup over stored entries. Also records heap positions on behalf
//! of the expiry heap.

use std::collections::hash_map::{HashMap, Iter};
use std::sync::Arc;

use crate::cache::entry::Entry;
use crate::cache::heap::PositionMap;

// == Key Index ==
/// Mapping from key to entry.
///
/// Keys are `Arc<str>` so the heap slot and the index share one allocation.
#[derive(Debug)]
pub struct KeyIndex<V> {
    entries: HashMap<Arc<str>, Entry<V>>,
}

impl<V> KeyIndex<V> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Returns the entry for `key`, or `None` on a miss.
    pub fn lookup(&self, key: &str) -> Option<&Entry<V>> {
        self.entries.get(key)
    }

    pub fn lookup_mut(&mut self, key: &str) -> Option<&mut Entry<V>> {
        self.entries.get_mut(key)
    }

    pub fn insert(&mut self, key: Arc<str>, entry: Entry<V>) -> Option<Entry<V>> {
        self.entries.insert(key, entry)
    }

    /// Removes `key`. Absent keys are a no-op.
    pub fn remove(&mut self, key: &str) -> Option<Entry<V>> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> Iter<'_, Arc<str>, Entry<V>> {
        self.entries.iter()
    }
}

impl<V> Default for KeyIndex<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> PositionMap for KeyIndex<V> {
    fn set_position(&mut self, key: &str, position: usize) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.position = position;
        }
    }
}
