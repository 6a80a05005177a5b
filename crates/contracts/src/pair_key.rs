//! Pair keys for symmetric relations
//!
//! Szudzik's elegant pairing over two u32 ids always fits in a u64, even for
//! `u32::MAX`.

use crate::EntityId;

/// Ordered pairing: `ordered_pair_key(a, b) != ordered_pair_key(b, a)` unless `a == b`
pub fn ordered_pair_key(a: EntityId, b: EntityId) -> u64 {
    let (a, b) = (u64::from(a.0), u64::from(b.0));
    if a >= b {
        a * a + a + b
    } else {
        b * b + a
    }
}

/// Commutative pairing: identifies the unordered pair `{a, b}`
pub fn pair_key(a: EntityId, b: EntityId) -> u64 {
    if a >= b {
        ordered_pair_key(a, b)
    } else {
        ordered_pair_key(b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_pair_key_is_symmetric() {
        for (a, b) in [(1, 2), (7, 3), (0, 0), (100, 99_999)] {
            assert_eq!(
                pair_key(EntityId(a), EntityId(b)),
                pair_key(EntityId(b), EntityId(a))
            );
        }
    }

    #[test]
    fn test_pair_key_is_unique_for_unordered_pairs() {
        let mut seen = HashSet::new();
        for a in 0..40u32 {
            for b in a..40u32 {
                assert!(seen.insert(pair_key(EntityId(a), EntityId(b))));
            }
        }
    }

    #[test]
    fn test_ordered_pair_key_distinguishes_direction() {
        let ab = ordered_pair_key(EntityId(3), EntityId(8));
        let ba = ordered_pair_key(EntityId(8), EntityId(3));
        assert_ne!(ab, ba);
        // Either ordering of an unordered key matches one of the directed keys
        assert!(pair_key(EntityId(3), EntityId(8)) == ab || pair_key(EntityId(3), EntityId(8)) == ba);
    }

    #[test]
    fn test_no_overflow_at_max() {
        let key = pair_key(EntityId(u32::MAX), EntityId(u32::MAX));
        assert_eq!(key, u64::MAX);
    }
}
