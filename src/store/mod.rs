//! Synchronous in-memory relational backing store.
//!
//! One typed table per entity kind, the Post↔Tag bridge table, and the unique
//! index backing the one-detail-per-user constraint. The store is `Clone` so
//! the cascade resolver can stage a full write set and swap it in atomically.

pub mod bridge;
pub mod rows;
pub mod snapshot;
pub mod table;

use std::collections::HashMap;

use crate::error::{DbError, Result};
use crate::model::EntityId;
use crate::registry::EntityKind;

use bridge::BridgeTable;
use rows::{DetailRow, PostRow, TagRow, UserRow};
use table::Table;

#[derive(Debug, Clone)]
pub struct Store {
    users: Table<UserRow>,
    details: Table<DetailRow>,
    posts: Table<PostRow>,
    tags: Table<TagRow>,
    post_tags: BridgeTable,
    /// Unique index: user id -> detail id
    detail_owner: HashMap<EntityId, EntityId>,
}

impl Store {
    pub fn new() -> Self {
        Store {
            users: Table::new(EntityKind::User.table_name()),
            details: Table::new(EntityKind::Detail.table_name()),
            posts: Table::new(EntityKind::Post.table_name()),
            tags: Table::new(EntityKind::Tag.table_name()),
            post_tags: BridgeTable::new("t_post_tag"),
            detail_owner: HashMap::new(),
        }
    }

    // --- users ---

    pub fn insert_user(&mut self, row: UserRow) -> EntityId {
        self.users.insert(row)
    }

    pub fn update_user(&mut self, row: UserRow) -> Result<()> {
        let id = row.id;
        if !self.users.update(row) {
            return Err(DbError::NotFound {
                kind: EntityKind::User,
                id,
            });
        }
        Ok(())
    }

    pub fn user(&self, id: EntityId) -> Result<UserRow> {
        self.users.get(id).cloned().ok_or(DbError::NotFound {
            kind: EntityKind::User,
            id,
        })
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    // --- details ---

    /// Inserts a detail row, enforcing the uniqueness of its `user_id`
    /// foreign key.
    pub fn insert_detail(&mut self, row: DetailRow) -> Result<EntityId> {
        let user_id = row.user_id;
        if self.detail_owner.contains_key(&user_id) {
            return Err(DbError::UniquenessViolation {
                table: self.details.name(),
                column: "user_id",
                value: user_id,
            });
        }
        let id = self.details.insert(row);
        self.detail_owner.insert(user_id, id);
        Ok(id)
    }

    /// Updates a detail row, keeping the unique index consistent when the
    /// foreign key moved to another user.
    pub fn update_detail(&mut self, row: DetailRow) -> Result<()> {
        if let Some(&owner) = self.detail_owner.get(&row.user_id) {
            if owner != row.id {
                return Err(DbError::UniquenessViolation {
                    table: self.details.name(),
                    column: "user_id",
                    value: row.user_id,
                });
            }
        }
        let previous = self.details.get(row.id).cloned().ok_or(DbError::NotFound {
            kind: EntityKind::Detail,
            id: row.id,
        })?;
        self.detail_owner.remove(&previous.user_id);
        self.detail_owner.insert(row.user_id, row.id);
        self.details.update(row);
        Ok(())
    }

    pub fn detail(&self, id: EntityId) -> Result<DetailRow> {
        self.details.get(id).cloned().ok_or(DbError::NotFound {
            kind: EntityKind::Detail,
            id,
        })
    }

    /// The detail owned by `user_id`, resolved through the unique index.
    pub fn detail_for_user(&self, user_id: EntityId) -> Option<DetailRow> {
        self.detail_owner
            .get(&user_id)
            .and_then(|id| self.details.get(*id))
            .cloned()
    }

    pub fn detail_count(&self) -> usize {
        self.details.len()
    }

    // --- posts ---

    pub fn insert_post(&mut self, row: PostRow) -> EntityId {
        self.posts.insert(row)
    }

    pub fn update_post(&mut self, row: PostRow) -> Result<()> {
        let id = row.id;
        if !self.posts.update(row) {
            return Err(DbError::NotFound {
                kind: EntityKind::Post,
                id,
            });
        }
        Ok(())
    }

    pub fn post(&self, id: EntityId) -> Result<PostRow> {
        self.posts.get(id).cloned().ok_or(DbError::NotFound {
            kind: EntityKind::Post,
            id,
        })
    }

    /// All posts whose foreign key references `user_id`.
    pub fn posts_for_user(&self, user_id: EntityId) -> Vec<PostRow> {
        self.posts
            .scan()
            .filter(|row| row.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn post_count(&self) -> usize {
        self.posts.len()
    }

    // --- tags ---

    pub fn insert_tag(&mut self, row: TagRow) -> EntityId {
        self.tags.insert(row)
    }

    pub fn update_tag(&mut self, row: TagRow) -> Result<()> {
        let id = row.id;
        if !self.tags.update(row) {
            return Err(DbError::NotFound {
                kind: EntityKind::Tag,
                id,
            });
        }
        Ok(())
    }

    pub fn tag(&self, id: EntityId) -> Result<TagRow> {
        self.tags.get(id).cloned().ok_or(DbError::NotFound {
            kind: EntityKind::Tag,
            id,
        })
    }

    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    // --- bridge ---

    /// Inserts a bridge pair; returns false when already present.
    pub fn link_post_tag(&mut self, post_id: EntityId, tag_id: EntityId) -> bool {
        self.post_tags.insert(post_id, tag_id)
    }

    pub fn tags_for_post(&self, post_id: EntityId) -> Vec<EntityId> {
        self.post_tags.related_of(post_id)
    }

    pub fn posts_for_tag(&self, tag_id: EntityId) -> Vec<EntityId> {
        self.post_tags.owners_of(tag_id)
    }

    pub fn bridge_contains(&self, post_id: EntityId, tag_id: EntityId) -> bool {
        self.post_tags.contains(post_id, tag_id)
    }

    pub fn bridge_len(&self) -> usize {
        self.post_tags.len()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
