//! Versioned JSON snapshot of the whole store.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DbError, Result};
use crate::model::EntityId;
use crate::registry::EntityKind;

use super::bridge::BridgeTable;
use super::rows::{DetailRow, PostRow, TagRow, UserRow};
use super::table::Table;
use super::Store;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoreSnapshot {
    version: u32,
    users: Vec<UserRow>,
    details: Vec<DetailRow>,
    posts: Vec<PostRow>,
    tags: Vec<TagRow>,
    post_tags: Vec<(EntityId, EntityId)>,
    /// Next-identifier counters for users, details, posts, tags
    next_ids: [u64; 4],
}

impl Store {
    /// Writes the full store state as a versioned JSON document.
    pub fn snapshot_to(&self, path: &Path) -> Result<()> {
        let snapshot = StoreSnapshot {
            version: SNAPSHOT_VERSION,
            users: self.users.rows_vec(),
            details: self.details.rows_vec(),
            posts: self.posts.rows_vec(),
            tags: self.tags.rows_vec(),
            post_tags: self.post_tags.pairs_vec(),
            next_ids: [
                self.users.next_id(),
                self.details.next_id(),
                self.posts.next_id(),
                self.tags.next_id(),
            ],
        };
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &snapshot)?;
        debug!(path = %path.display(), "store snapshot written");
        Ok(())
    }

    /// Restores a store from a snapshot, rebuilding the in-memory indexes.
    pub fn restore_from(path: &Path) -> Result<Store> {
        let reader = BufReader::new(File::open(path)?);
        let snapshot: StoreSnapshot = serde_json::from_reader(reader)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(DbError::InvalidSnapshot(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }

        let details = Table::from_rows(
            EntityKind::Detail.table_name(),
            snapshot.details,
            snapshot.next_ids[1],
        );
        let detail_owner = details.scan().map(|row| (row.user_id, row.id)).collect();

        let store = Store {
            users: Table::from_rows(
                EntityKind::User.table_name(),
                snapshot.users,
                snapshot.next_ids[0],
            ),
            details,
            posts: Table::from_rows(
                EntityKind::Post.table_name(),
                snapshot.posts,
                snapshot.next_ids[2],
            ),
            tags: Table::from_rows(
                EntityKind::Tag.table_name(),
                snapshot.tags,
                snapshot.next_ids[3],
            ),
            post_tags: BridgeTable::from_pairs("t_post_tag", snapshot.post_tags),
            detail_owner,
        };
        debug!(path = %path.display(), "store snapshot restored");
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn snapshot_round_trip_preserves_rows_and_counters() {
        let mut store = Store::new();
        let user_id = store.insert_user(UserRow::new("JohnDoe"));
        store
            .insert_detail(DetailRow::new("123 Baker Street", user_id))
            .unwrap();
        let post_id = store.insert_post(PostRow::new("On gardening", user_id));
        let tag_id = store.insert_tag(TagRow::new("Java"));
        store.link_post_tag(post_id, tag_id);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        store.snapshot_to(&path).unwrap();

        let mut restored = Store::restore_from(&path).unwrap();
        assert_eq!(restored.user(user_id).unwrap().username, "JohnDoe");
        assert_eq!(
            restored.detail_for_user(user_id).unwrap().address,
            "123 Baker Street"
        );
        assert!(restored.bridge_contains(post_id, tag_id));

        // Identifier counters survive: the next insert does not reuse ids.
        let next_user = restored.insert_user(UserRow::new("second"));
        assert_eq!(next_user, EntityId(user_id.0 + 1));
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let mut file = File::create(&path).unwrap();
        file.write_all(
            br#"{"version":99,"users":[],"details":[],"posts":[],"tags":[],"post_tags":[],"next_ids":[1,1,1,1]}"#,
        )
        .unwrap();

        let err = Store::restore_from(&path).unwrap_err();
        assert!(matches!(err, DbError::InvalidSnapshot(_)));
    }
}
