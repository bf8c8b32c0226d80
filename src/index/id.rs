//! Marker id lookup

use crate::model::MarkerId;
use std::collections::HashMap;

/// `markerId -> slot`, resolving collisions by dimension rank
#[derive(Debug, Default)]
pub struct IdIndex {
    slots: HashMap<MarkerId, (usize, usize)>,
}

impl IdIndex {
    /// Record `id` at `slot`; `rank` is the owning dimension's position in
    /// the configured order. The lowest rank keeps the id, and for equal
    /// ranks the first slot recorded.
    pub fn insert(&mut self, id: &MarkerId, slot: usize, rank: usize) {
        match self.slots.get(id) {
            Some(&(_, kept_rank)) if kept_rank <= rank => {}
            _ => {
                self.slots.insert(id.clone(), (slot, rank));
            }
        }
    }

    pub fn get(&self, id: &MarkerId) -> Option<usize> {
        self.slots.get(id).map(|&(slot, _)| slot)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lower_rank_wins_regardless_of_insert_order() {
        let id = MarkerId::from("marker_3");
        let mut index = IdIndex::default();
        index.insert(&id, 0, 2);
        index.insert(&id, 1, 0);
        index.insert(&id, 2, 1);
        assert_eq!(index.get(&id), Some(1));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn equal_rank_keeps_first() {
        let id = MarkerId::from("marker_3");
        let mut index = IdIndex::default();
        index.insert(&id, 4, 0);
        index.insert(&id, 9, 0);
        assert_eq!(index.get(&id), Some(4));
        assert_eq!(index.get(&MarkerId::from("marker_4")), None);
    }
}
