//! Generic typed table with auto-assigned integer identifiers.

use std::collections::BTreeMap;

use crate::model::EntityId;

/// Row stored in a [`Table`].
pub trait TableRow: Clone {
    fn id(&self) -> EntityId;
    fn set_id(&mut self, id: EntityId);
}

/// In-memory table keyed by identifier.
///
/// Identifiers start at 1 and are assigned exactly once at insert; the
/// counter never rewinds, so an identifier is never reused even after a
/// snapshot round trip.
#[derive(Debug, Clone)]
pub struct Table<R: TableRow> {
    name: &'static str,
    rows: BTreeMap<EntityId, R>,
    next_id: u64,
}

impl<R: TableRow> Table<R> {
    pub fn new(name: &'static str) -> Self {
        Table {
            name,
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Inserts a row, assigning the next identifier regardless of what the
    /// row carried. Returns the assigned identifier.
    pub fn insert(&mut self, mut row: R) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        row.set_id(id);
        self.rows.insert(id, row);
        id
    }

    /// Replaces an existing row in place. Returns false when no row with the
    /// row's identifier exists.
    pub fn update(&mut self, row: R) -> bool {
        match self.rows.get_mut(&row.id()) {
            Some(slot) => {
                *slot = row;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: EntityId) -> Option<&R> {
        self.rows.get(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.rows.contains_key(&id)
    }

    pub fn scan(&self) -> impl Iterator<Item = &R> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub(crate) fn next_id(&self) -> u64 {
        self.next_id
    }

    pub(crate) fn rows_vec(&self) -> Vec<R> {
        self.rows.values().cloned().collect()
    }

    /// Rebuilds a table from snapshot state.
    pub(crate) fn from_rows(name: &'static str, rows: Vec<R>, next_id: u64) -> Self {
        Table {
            name,
            rows: rows.into_iter().map(|row| (row.id(), row)).collect(),
            next_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::rows::TagRow;
    use pretty_assertions::assert_eq;

    #[test]
    fn insert_assigns_sequential_identifiers() {
        let mut table = Table::new("t_tag");
        let first = table.insert(TagRow::new("Java"));
        let second = table.insert(TagRow::new("Database"));
        assert_eq!(first, EntityId(1));
        assert_eq!(second, EntityId(2));
        assert_eq!(table.get(first).unwrap().name, "Java");
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn update_requires_existing_row() {
        let mut table = Table::new("t_tag");
        let id = table.insert(TagRow::new("Java"));

        let mut renamed = table.get(id).unwrap().clone();
        renamed.name = "JVM".to_string();
        assert!(table.update(renamed));
        assert_eq!(table.get(id).unwrap().name, "JVM");

        let mut phantom = TagRow::new("ghost");
        phantom.set_id(EntityId(99));
        assert!(!table.update(phantom));
    }
}
