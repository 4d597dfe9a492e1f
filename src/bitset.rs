//! Fixed-capacity bitset used for per-vertex visited sets during graph traversal.
//!
//! The relaxation loops keep one of these per vertex and propagate them along
//! edges, so the representation favors cheap clone-and-insert over dynamic growth.

/// A bitset over a fixed range of small indices.
///
/// Capacity is chosen at construction and never grows; inserting an index at or
/// beyond the capacity is a programming error and panics in debug builds only,
/// matching the contract that vertex indices are always in range for the view
/// they came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitSet {
    words: Vec<u64>,
    capacity: usize,
}

impl BitSet {
    /// Creates an empty set able to hold indices in `0..capacity`.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            words: vec![0; capacity.div_ceil(64)],
            capacity,
        }
    }

    /// Number of indices the set can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Inserts `index`, returning whether it was newly inserted.
    pub fn insert(&mut self, index: usize) -> bool {
        debug_assert!(index < self.capacity, "bitset index out of range");
        let (word, bit) = (index / 64, 1u64 << (index % 64));
        let fresh = self.words[word] & bit == 0;
        self.words[word] |= bit;
        fresh
    }

    /// Returns whether `index` is in the set.
    pub fn contains(&self, index: usize) -> bool {
        debug_assert!(index < self.capacity, "bitset index out of range");
        self.words[index / 64] & (1u64 << (index % 64)) != 0
    }

    /// Removes every index from the set, keeping the capacity.
    pub fn clear(&mut self) {
        self.words.fill(0);
    }

    /// Replaces the contents of `self` with the contents of `other`, reusing
    /// the existing word storage. Both sets must share a capacity.
    pub fn copy_from(&mut self, other: &BitSet) {
        debug_assert_eq!(self.capacity, other.capacity);
        self.words.copy_from_slice(&other.words);
    }

    /// Returns whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_contains() {
        let mut set = BitSet::with_capacity(130);
        assert!(!set.contains(0));
        assert!(set.insert(0));
        assert!(!set.insert(0));
        assert!(set.insert(129));
        assert!(set.contains(0));
        assert!(set.contains(129));
        assert!(!set.contains(64));
    }

    #[test]
    fn clear_and_copy_from() {
        let mut a = BitSet::with_capacity(70);
        let mut b = BitSet::with_capacity(70);
        a.insert(3);
        a.insert(69);
        b.copy_from(&a);
        assert!(b.contains(3) && b.contains(69));
        a.clear();
        assert!(a.is_empty());
        // b keeps its own storage
        assert!(b.contains(3));
    }
}
