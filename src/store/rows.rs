//! Persisted row types: one auto-assigned integer identifier column, the
//! scalar columns, and the owning foreign-key column where applicable.

use serde::{Deserialize, Serialize};

use crate::model::EntityId;
use crate::store::table::TableRow;

/// Placeholder identifier for rows not yet inserted; [`super::table::Table`]
/// assigns the real one.
const UNASSIGNED: EntityId = EntityId(0);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRow {
    pub id: EntityId,
    pub username: String,
}

impl UserRow {
    pub fn new(username: impl Into<String>) -> Self {
        UserRow {
            id: UNASSIGNED,
            username: username.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailRow {
    pub id: EntityId,
    pub address: String,
    /// Unique across all detail rows: at most one detail per user.
    pub user_id: EntityId,
}

impl DetailRow {
    pub fn new(address: impl Into<String>, user_id: EntityId) -> Self {
        DetailRow {
            id: UNASSIGNED,
            address: address.into(),
            user_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRow {
    pub id: EntityId,
    pub title: String,
    pub user_id: EntityId,
}

impl PostRow {
    pub fn new(title: impl Into<String>, user_id: EntityId) -> Self {
        PostRow {
            id: UNASSIGNED,
            title: title.into(),
            user_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRow {
    pub id: EntityId,
    pub name: String,
}

impl TagRow {
    pub fn new(name: impl Into<String>) -> Self {
        TagRow {
            id: UNASSIGNED,
            name: name.into(),
        }
    }
}

macro_rules! impl_table_row {
    ($($row:ty),*) => {
        $(impl TableRow for $row {
            fn id(&self) -> EntityId {
                self.id
            }

            fn set_id(&mut self, id: EntityId) {
                self.id = id;
            }
        })*
    };
}

impl_table_row!(UserRow, DetailRow, PostRow, TagRow);
