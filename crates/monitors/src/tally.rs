//! Per-entity overlap counting.
//!
//! An entity may overlap a volume with several shapes at once; only the first
//! begin and the last end are interaction transitions.

use std::collections::HashMap;

use contracts::EntityId;

#[derive(Debug, Default)]
pub(crate) struct OverlapTally {
    counts: HashMap<EntityId, u32>,
}

impl OverlapTally {
    /// True on the first overlapping shape
    pub fn begin(&mut self, id: EntityId) -> bool {
        let count = self.counts.entry(id).or_insert(0);
        *count += 1;
        *count == 1
    }

    /// `Some(true)` on the last shape leaving, `None` if nothing was counted
    pub fn end(&mut self, id: EntityId) -> Option<bool> {
        let count = self.counts.get_mut(&id)?;
        *count -= 1;
        if *count == 0 {
            self.counts.remove(&id);
            Some(true)
        } else {
            Some(false)
        }
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiple_shapes_one_transition() {
        let mut tally = OverlapTally::default();
        let id = EntityId(4);

        assert!(tally.begin(id));
        assert!(!tally.begin(id));
        assert_eq!(tally.end(id), Some(false));
        assert_eq!(tally.end(id), Some(true));
        assert_eq!(tally.end(id), None);
    }
}
