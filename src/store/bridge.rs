//! Two-column bridge table realizing the many-to-many relationship.

use std::collections::BTreeSet;

use crate::model::EntityId;

/// Pair set keyed by `(owning id, related id)`: unique per pair, no payload
/// columns, no identity of its own.
#[derive(Debug, Clone)]
pub struct BridgeTable {
    name: &'static str,
    pairs: BTreeSet<(EntityId, EntityId)>,
}

impl BridgeTable {
    pub fn new(name: &'static str) -> Self {
        BridgeTable {
            name,
            pairs: BTreeSet::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Inserts a pair; returns false when it was already present.
    pub fn insert(&mut self, owner: EntityId, related: EntityId) -> bool {
        self.pairs.insert((owner, related))
    }

    pub fn contains(&self, owner: EntityId, related: EntityId) -> bool {
        self.pairs.contains(&(owner, related))
    }

    /// Related identifiers for an owner, in ascending order.
    pub fn related_of(&self, owner: EntityId) -> Vec<EntityId> {
        self.pairs
            .range((owner, EntityId(0))..=(owner, EntityId(u64::MAX)))
            .map(|(_, related)| *related)
            .collect()
    }

    /// Owner identifiers referencing `related` (reverse lookup).
    pub fn owners_of(&self, related: EntityId) -> Vec<EntityId> {
        self.pairs
            .iter()
            .filter(|(_, r)| *r == related)
            .map(|(owner, _)| *owner)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub(crate) fn pairs_vec(&self) -> Vec<(EntityId, EntityId)> {
        self.pairs.iter().copied().collect()
    }

    pub(crate) fn from_pairs(name: &'static str, pairs: Vec<(EntityId, EntityId)>) -> Self {
        BridgeTable {
            name,
            pairs: pairs.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn pairs_are_unique() {
        let mut bridge = BridgeTable::new("t_post_tag");
        assert!(bridge.insert(EntityId(1), EntityId(10)));
        assert!(!bridge.insert(EntityId(1), EntityId(10)));
        assert_eq!(bridge.len(), 1);
    }

    #[test]
    fn lookups_work_in_both_directions() {
        let mut bridge = BridgeTable::new("t_post_tag");
        bridge.insert(EntityId(1), EntityId(10));
        bridge.insert(EntityId(1), EntityId(11));
        bridge.insert(EntityId(2), EntityId(10));

        assert_eq!(bridge.related_of(EntityId(1)), vec![EntityId(10), EntityId(11)]);
        assert_eq!(bridge.owners_of(EntityId(10)), vec![EntityId(1), EntityId(2)]);
        assert_eq!(bridge.owners_of(EntityId(99)), Vec::<EntityId>::new());
    }
}
