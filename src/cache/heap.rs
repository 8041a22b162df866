//! Expiry Heap Module
//!
//! Array-backed binary min-heap ordered by expiration instant. Unlike
//! `std::collections::BinaryHeap`, it can remove an element at an arbitrary
//! position in O(log n), because every slot move is reported through
//! [`PositionMap`] so the owner always knows where each key lives.

use std::sync::Arc;

use tokio::time::Instant;

// == Position Map ==
/// Receives the new position of a key whenever the heap moves its slot.
pub trait PositionMap {
    /// Records that `key` now lives at `position`.
    fn set_position(&mut self, key: &str, position: usize);
}

// == Slot ==
/// One heap element: a key and the instant it expires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub key: Arc<str>,
    pub expires_at: Instant,
}

// == Expiry Heap ==
/// Min-heap of slots keyed by `expires_at`.
///
/// Ties between equal instants are ordered arbitrarily.
#[derive(Debug, Default)]
pub struct ExpiryHeap {
    slots: Vec<Slot>,
}

impl ExpiryHeap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Iterates slots in backing-array order.
    pub fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter()
    }

    // == Insert ==
    /// Appends a slot and sifts it up. Returns its final position.
    pub fn insert(&mut self, slot: Slot, positions: &mut impl PositionMap) -> usize {
        let position = self.slots.len();
        positions.set_position(&slot.key, position);
        self.slots.push(slot);
        self.sift_up(position, positions)
    }

    // == Peek Min ==
    /// Returns the soonest-expiring slot without removing it.
    pub fn peek_min(&self) -> Option<&Slot> {
        self.slots.first()
    }

    // == Pop Min ==
    /// Removes and returns the soonest-expiring slot.
    pub fn pop_min(&mut self, positions: &mut impl PositionMap) -> Option<Slot> {
        self.remove_at(0, positions)
    }

    // == Remove At ==
    /// Removes the slot at `position`.
    ///
    /// The last slot is swapped into the hole and then sifted down, or up if
    /// it did not move down. Out-of-range positions return `None`.
    pub fn remove_at(
        &mut self,
        position: usize,
        positions: &mut impl PositionMap,
    ) -> Option<Slot> {
        if position >= self.slots.len() {
            return None;
        }

        let last = self.slots.len() - 1;
        if position != last {
            self.swap(position, last, positions);
        }
        let removed = self.slots.pop();

        if position < self.slots.len() && !self.sift_down(position, positions) {
            self.sift_up(position, positions);
        }

        removed
    }

    // == Heap Property ==
    /// Checks that every slot expires no later than its children.
    pub fn is_valid(&self) -> bool {
        (1..self.slots.len())
            .all(|i| self.slots[(i - 1) / 2].expires_at <= self.slots[i].expires_at)
    }

    // == Sifting ==
    fn sift_up(&mut self, mut position: usize, positions: &mut impl PositionMap) -> usize {
        while position > 0 {
            let parent = (position - 1) / 2;
            if self.slots[parent].expires_at <= self.slots[position].expires_at {
                break;
            }
            self.swap(parent, position, positions);
            position = parent;
        }
        position
    }

    /// Returns true if the slot moved.
    fn sift_down(&mut self, start: usize, positions: &mut impl PositionMap) -> bool {
        let len = self.slots.len();
        let mut position = start;

        loop {
            let left = 2 * position + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let smallest =
                if right < len && self.slots[right].expires_at < self.slots[left].expires_at {
                    right
                } else {
                    left
                };
            if self.slots[position].expires_at <= self.slots[smallest].expires_at {
                break;
            }
            self.swap(position, smallest, positions);
            position = smallest;
        }

        position != start
    }

    fn swap(&mut self, a: usize, b: usize, positions: &mut impl PositionMap) {
        self.slots.swap(a, b);
        positions.set_position(&self.slots[a].key, a);
        positions.set_position(&self.slots[b].key, b);
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    impl PositionMap for HashMap<String, usize> {
        fn set_position(&mut self, key: &str, position: usize) {
            self.insert(key.to_string(), position);
        }
    }

    fn slot(key: &str, base: Instant, offset_ms: u64) -> Slot {
        Slot {
            key: Arc::from(key),
            expires_at: base + Duration::from_millis(offset_ms),
        }
    }

    fn assert_positions(heap: &ExpiryHeap, positions: &HashMap<String, usize>) {
        for (i, slot) in heap.iter().enumerate() {
            assert_eq!(positions[&*slot.key], i, "stale position for {}", slot.key);
        }
    }

    #[test]
    fn test_insert_keeps_min_on_top() {
        let base = Instant::now();
        let mut heap = ExpiryHeap::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for (key, offset) in [("c", 30), ("a", 10), ("d", 40), ("b", 20)] {
            heap.insert(slot(key, base, offset), &mut positions);
        }

        assert_eq!(heap.len(), 4);
        assert_eq!(&*heap.peek_min().unwrap().key, "a");
        assert!(heap.is_valid());
        assert_positions(&heap, &positions);
    }

    #[test]
    fn test_pop_min_yields_ascending_order() {
        let base = Instant::now();
        let mut heap = ExpiryHeap::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for (i, offset) in [50, 10, 40, 20, 30, 60, 0].into_iter().enumerate() {
            heap.insert(slot(&format!("k{}", i), base, offset), &mut positions);
        }

        let mut last = base;
        while let Some(popped) = heap.pop_min(&mut positions) {
            assert!(popped.expires_at >= last);
            last = popped.expires_at;
            assert!(heap.is_valid());
            assert_positions(&heap, &positions);
        }
        assert!(heap.is_empty());
    }

    #[test]
    fn test_remove_at_arbitrary_position() {
        let base = Instant::now();
        let mut heap = ExpiryHeap::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for (i, offset) in [10, 20, 30, 40, 50, 60, 70].into_iter().enumerate() {
            heap.insert(slot(&format!("k{}", i), base, offset), &mut positions);
        }

        let target = positions["k3"];
        let removed = heap.remove_at(target, &mut positions).unwrap();

        assert_eq!(&*removed.key, "k3");
        assert_eq!(heap.len(), 6);
        assert!(heap.is_valid());
        assert!(heap.iter().all(|s| &*s.key != "k3"));
        assert_positions(&heap, &positions);
    }

    #[test]
    fn test_remove_at_sifts_moved_slot_up() {
        let base = Instant::now();
        let mut heap = ExpiryHeap::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        // Left subtree holds late deadlines, right subtree early ones, so the
        // last slot must climb when it fills a hole on the left.
        let layout = [
            ("root", 0),
            ("l", 100),
            ("r", 10),
            ("ll", 110),
            ("lr", 120),
            ("rl", 20),
        ];
        for (key, offset) in layout {
            heap.insert(slot(key, base, offset), &mut positions);
        }

        heap.remove_at(positions["ll"], &mut positions).unwrap();

        assert!(heap.is_valid());
        assert_positions(&heap, &positions);
        assert_eq!(positions["rl"], 1);
    }

    #[test]
    fn test_remove_last_and_out_of_range() {
        let base = Instant::now();
        let mut heap = ExpiryHeap::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        heap.insert(slot("only", base, 5), &mut positions);

        assert!(heap.remove_at(3, &mut positions).is_none());
        assert_eq!(&*heap.remove_at(0, &mut positions).unwrap().key, "only");
        assert!(heap.peek_min().is_none());
        assert!(heap.pop_min(&mut positions).is_none());
    }

    #[test]
    fn test_equal_deadlines() {
        let base = Instant::now();
        let mut heap = ExpiryHeap::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for i in 0..8 {
            heap.insert(slot(&format!("k{}", i), base, 10), &mut positions);
        }
        heap.remove_at(positions["k5"], &mut positions);

        assert_eq!(heap.len(), 7);
        assert!(heap.is_valid());
        assert_positions(&heap, &positions);
    }
}
