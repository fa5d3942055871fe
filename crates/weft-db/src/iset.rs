//! A bucketed set of 64-bit integers.
//!
//! Used as the visited set during ancestor traversal, where membership
//! checks dominate and the key distribution is arbitrary. Keys are mixed
//! with xorshift64* and land in one of a fixed number of small vector
//! buckets; clearing reuses the allocations.

/// One round of xorshift64*, a cheap full-period mixer.
fn xorshift64star(mut x: u64) -> u64 {
    // Zero is the one fixed point; nudge it off.
    if x == 0 {
        x = 0x9e3779b97f4a7c15;
    }
    x ^= x >> 12;
    x ^= x << 25;
    x ^= x >> 27;
    x.wrapping_mul(0x2545f4914f6cdd1d)
}

/// A hash set of `i64` built from vector buckets.
pub struct ISet {
    buckets: Vec<Vec<i64>>,
    len: usize,
}

impl ISet {
    /// Create a set with the given bucket count (rounded up to at least 64).
    pub fn new(bucket_count: usize) -> Self {
        let bucket_count = bucket_count.max(64);
        Self {
            buckets: (0..bucket_count).map(|_| Vec::new()).collect(),
            len: 0,
        }
    }

    fn bucket_of(&self, i: i64) -> usize {
        (xorshift64star(i as u64) % self.buckets.len() as u64) as usize
    }

    /// Insert `i`; returns true if it was not already present.
    pub fn put(&mut self, i: i64) -> bool {
        let b = self.bucket_of(i);
        let v = &mut self.buckets[b];
        if v.contains(&i) {
            return false;
        }
        v.push(i);
        self.len += 1;
        true
    }

    /// Membership test.
    pub fn contains(&self, i: i64) -> bool {
        self.buckets[self.bucket_of(i)].contains(&i)
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Remove all elements, keeping bucket allocations.
    pub fn clear(&mut self) {
        for b in &mut self.buckets {
            b.clear();
        }
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_contains_dedup() {
        let mut s = ISet::new(128);
        assert!(s.put(42));
        assert!(!s.put(42));
        assert!(s.contains(42));
        assert!(!s.contains(43));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn test_many_keys_and_clear() {
        let mut s = ISet::new(256);
        for i in -1000i64..1000 {
            assert!(s.put(i));
        }
        assert_eq!(s.len(), 2000);
        for i in -1000i64..1000 {
            assert!(s.contains(i));
        }
        s.clear();
        assert!(s.is_empty());
        assert!(!s.contains(0));
        assert!(s.put(0));
    }
}
