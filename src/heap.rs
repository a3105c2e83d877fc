/*
Indexed binary min-heap over node ids with float priorities.

The backing array is laid out as usual (children of slot i at 2i+1 and 2i+2).
A position index maps every queued node to its slot, which gives O(1)
membership tests and lets decrease-key start sifting from the right place.
*/

use fnv::FnvHashMap;
use std::hash::Hash;

use crate::graph::{Cost, VertexId};

#[derive(Copy, Clone, Debug, PartialEq)]
struct Entry<N> {
    node: N,
    priority: Cost,
}

#[derive(Debug)]
pub struct IndexedMinHeap<N = VertexId> {
    heap: Vec<Entry<N>>,
    position: FnvHashMap<N, usize>,
}

impl<N> Default for IndexedMinHeap<N> {
    fn default() -> Self {
        Self {
            heap: Vec::new(),
            position: FnvHashMap::default(),
        }
    }
}

impl<N: Copy + Eq + Hash> IndexedMinHeap<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let mut position = FnvHashMap::default();
        position.reserve(capacity);
        Self {
            heap: Vec::with_capacity(capacity),
            position,
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn contains(&self, node: N) -> bool {
        self.position.contains_key(&node)
    }

    /// Current priority of a queued node.
    pub fn priority(&self, node: N) -> Option<Cost> {
        self.position.get(&node).map(|&i| self.heap[i].priority)
    }

    pub fn peek(&self) -> Option<(N, Cost)> {
        self.heap.first().map(|e| (e.node, e.priority))
    }

    /// Queues a node that is not queued yet. Use `decrease_key` for queued nodes.
    pub fn insert(&mut self, node: N, priority: Cost) {
        debug_assert!(!self.contains(node), "node inserted twice");
        let slot = self.heap.len();
        self.heap.push(Entry { node, priority });
        self.position.insert(node, slot);
        self.sift_up(slot);
    }

    /// Removes and returns the node with the lowest priority.
    pub fn extract_min(&mut self) -> Option<N> {
        if self.heap.is_empty() {
            return None;
        }
        let last = self.heap.len() - 1;
        self.swap(0, last);
        let min = self.heap.pop()?;
        self.position.remove(&min.node);
        if !self.heap.is_empty() {
            self.sift_down(0);
        }
        Some(min.node)
    }

    /// Lowers the priority of a queued node. Unknown nodes and priorities that
    /// are not strictly lower are ignored. Returns whether the heap changed.
    pub fn decrease_key(&mut self, node: N, priority: Cost) -> bool {
        let Some(&slot) = self.position.get(&node) else {
            return false;
        };
        if !(priority < self.heap[slot].priority) {
            return false;
        }
        self.heap[slot].priority = priority;
        self.sift_up(slot);
        true
    }

    fn sift_up(&mut self, mut slot: usize) {
        while slot > 0 {
            let parent = (slot - 1) / 2;
            if self.heap[parent].priority > self.heap[slot].priority {
                self.swap(parent, slot);
                slot = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut slot: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * slot + 1;
            let right = left + 1;
            if left >= len {
                break;
            }
            // left child wins ties
            let child = if right < len && self.heap[right].priority < self.heap[left].priority {
                right
            } else {
                left
            };
            if self.heap[child].priority < self.heap[slot].priority {
                self.swap(slot, child);
                slot = child;
            } else {
                break;
            }
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.position.insert(self.heap[a].node, a);
        self.position.insert(self.heap[b].node, b);
    }

    /// Checks heap order and position index consistency.
    #[cfg(test)]
    fn assert_invariants(&self) {
        assert_eq!(self.position.len(), self.heap.len());
        for (i, entry) in self.heap.iter().enumerate() {
            assert_eq!(self.position[&entry.node], i);
            for child in [2 * i + 1, 2 * i + 2] {
                if child < self.heap.len() {
                    assert!(entry.priority <= self.heap[child].priority);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orx_priority_queue::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn drain(heap: &mut IndexedMinHeap<i64>) -> Vec<(i64, f64)> {
        let mut out = Vec::new();
        while let Some((node, priority)) = heap.peek() {
            assert_eq!(heap.extract_min(), Some(node));
            heap.assert_invariants();
            out.push((node, priority));
        }
        out
    }

    #[test]
    fn it_works() {
        let mut heap = IndexedMinHeap::new();
        heap.insert(0, 10.0);
        heap.insert(3, 5.0);
        heap.insert(2, 7.5);
        heap.insert(4, 8.0);
        assert!(heap.decrease_key(4, 2.5));
        heap.assert_invariants();
        assert_eq!(heap.len(), 4);
        assert_eq!(heap.extract_min(), Some(4));
        assert_eq!(heap.extract_min(), Some(3));
        assert_eq!(heap.extract_min(), Some(2));
        assert_eq!(heap.extract_min(), Some(0));
        assert_eq!(heap.extract_min(), None);
        assert!(heap.is_empty());
    }

    #[test]
    fn contains_tracks_membership() {
        let mut heap = IndexedMinHeap::new();
        assert!(!heap.contains(7));
        heap.insert(7, 1.0);
        heap.insert(8, 2.0);
        assert!(heap.contains(7));
        assert_eq!(heap.priority(8), Some(2.0));
        heap.extract_min();
        assert!(!heap.contains(7));
        assert!(heap.contains(8));
        assert_eq!(heap.priority(7), None);
    }

    #[test]
    fn decrease_key_never_raises_or_adds() {
        let mut heap = IndexedMinHeap::new();
        heap.insert(1, 1.0);
        heap.insert(2, 2.0);
        heap.insert(3, 3.0);
        let before = heap.heap.clone();
        assert!(!heap.decrease_key(2, 2.0));
        assert!(!heap.decrease_key(2, 9.0));
        assert!(!heap.decrease_key(42, 0.0));
        assert!(!heap.decrease_key(3, f64::NAN));
        assert_eq!(heap.heap, before);
        assert!(!heap.contains(42));
    }

    #[test]
    fn ties_prefer_left_child() {
        let mut heap = IndexedMinHeap::new();
        heap.insert(0, 0.0);
        heap.insert(1, 1.0);
        heap.insert(2, 1.0);
        heap.insert(3, 5.0);
        assert_eq!(heap.extract_min(), Some(0));
        // 3 moved to the root and sank into the left slot
        assert_eq!(heap.peek(), Some((1, 1.0)));
        assert_eq!(heap.heap[1].node, 3);
        assert_eq!(heap.heap[2].node, 2);
        heap.assert_invariants();
    }

    #[test]
    fn random_operations_keep_invariants() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let mut heap = IndexedMinHeap::new();
            for _ in 0..200 {
                let node = rng.gen_range(0..64);
                match rng.gen_range(0..3) {
                    0 if !heap.contains(node) => heap.insert(node, rng.gen_range(0.0..100.0)),
                    1 => {
                        let p = rng.gen_range(0.0..100.0);
                        let old = heap.priority(node);
                        let changed = heap.decrease_key(node, p);
                        assert_eq!(changed, old.map_or(false, |o| p < o));
                    }
                    _ => {
                        heap.extract_min();
                    }
                }
                heap.assert_invariants();
            }
            let order = drain(&mut heap);
            assert!(order.windows(2).all(|w| w[0].1 <= w[1].1));
        }
    }

    #[test]
    fn matches_reference_queue() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut heap = IndexedMinHeap::new();
        let mut reference = BinaryHeapWithMap::new();
        for node in 0..500i64 {
            // integral priorities keep the comparison exact
            let p = rng.gen_range(0..1000) as f64;
            heap.insert(node, p);
            reference.push(node, p);
        }
        for _ in 0..300 {
            let node = rng.gen_range(0..500i64);
            let p = rng.gen_range(0..1000) as f64;
            if heap.decrease_key(node, p) {
                reference.decrease_key_or_push(&node, p);
            }
        }
        let ours: Vec<f64> = drain(&mut heap).into_iter().map(|(_, p)| p).collect();
        let mut theirs = Vec::new();
        while let Some((_, p)) = reference.pop() {
            theirs.push(p);
        }
        assert_eq!(ours, theirs);
    }
}
