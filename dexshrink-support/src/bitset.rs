//! A fixed-length bitset over dense indices (value ids, block ids).

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitSet {
    bits: Vec<u64>,
    len: usize,
}

impl BitSet {
    #[must_use]
    pub fn new_empty(len: usize) -> Self {
        Self {
            bits: vec![0; len.div_ceil(64)],
            len,
        }
    }

    /// Number of addressable bits.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// # Panics
    ///
    /// Panics if `idx` is out of range. The same holds for `set`, `insert`
    /// and `clear`.
    #[must_use]
    pub fn get(&self, idx: usize) -> bool {
        assert!(idx < self.len, "bit {idx} out of range for length {}", self.len);
        (self.bits[idx / 64] >> (idx % 64)) & 1 == 1
    }

    pub fn set(&mut self, idx: usize) {
        assert!(idx < self.len, "bit {idx} out of range for length {}", self.len);
        self.bits[idx / 64] |= 1_u64 << (idx % 64);
    }

    /// Sets `idx` and returns true if it was not set before.
    pub fn insert(&mut self, idx: usize) -> bool {
        if self.get(idx) {
            return false;
        }
        self.set(idx);
        true
    }

    pub fn clear(&mut self, idx: usize) {
        assert!(idx < self.len, "bit {idx} out of range for length {}", self.len);
        self.bits[idx / 64] &= !(1_u64 << (idx % 64));
    }

    pub fn union_with(&mut self, other: &Self) {
        for (a, b) in self.bits.iter_mut().zip(other.bits.iter()) {
            *a |= *b;
        }
    }

    /// Number of set bits.
    pub fn count(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(move |&i| self.get(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_insert_reports_new_bits() {
        let mut set = BitSet::new_empty(130);
        assert!(set.insert(0));
        assert!(set.insert(129));
        assert!(!set.insert(129));
        assert!(set.get(0));
        assert!(set.get(129));
        assert!(!set.get(64));
        assert_eq!(set.count(), 2);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_out_of_range_insert_panics() {
        let mut set = BitSet::new_empty(3);
        set.insert(3);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_out_of_range_get_panics() {
        let set = BitSet::new_empty(64);
        let _ = set.get(64);
    }

    #[test]
    fn test_union_and_clear() {
        let mut a = BitSet::new_empty(70);
        let mut b = BitSet::new_empty(70);
        a.set(1);
        b.set(65);
        a.union_with(&b);
        assert_eq!(a.iter().collect::<Vec<_>>(), vec![1, 65]);
        a.clear(1);
        assert_eq!(a.iter().collect::<Vec<_>>(), vec![65]);
    }

    proptest! {
        #[test]
        fn bitset_matches_vec_bool(indices in proptest::collection::vec(0usize..200, 0..64)) {
            let mut set = BitSet::new_empty(200);
            let mut reference = vec![false; 200];
            for &i in &indices {
                prop_assert_eq!(set.insert(i), !reference[i]);
                reference[i] = true;
            }
            for (i, &expected) in reference.iter().enumerate() {
                prop_assert_eq!(set.get(i), expected);
            }
            prop_assert_eq!(set.count(), reference.iter().filter(|b| **b).count());
        }
    }
}
