use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{DbError, Result};
use crate::model::{Entity, EntityId, MirrorList, MirrorListState, Post, SharedRef};
use crate::registry::EntityKind;
use crate::session::{self, Binding};
use crate::store::rows::TagRow;

/// A tag shared across posts.
///
/// The post collection is a derived view computed by reverse lookup on the
/// bridge table; the bridge rows themselves are owned and written by the
/// posts.
#[derive(Debug)]
pub struct Tag {
    pub(crate) id: Option<EntityId>,
    pub(crate) name: String,
    pub(crate) posts: MirrorList<Post>,
}

impl Tag {
    /// Creates a transient tag with no identifier.
    pub fn new(name: impl Into<String>) -> SharedRef<Tag> {
        Rc::new(RefCell::new(Tag {
            id: None,
            name: name.into(),
            posts: MirrorList::empty(),
        }))
    }

    pub(crate) fn from_row(row: &TagRow, binding: &Binding) -> Tag {
        Tag {
            id: Some(row.id),
            name: row.name.clone(),
            posts: MirrorList::unloaded(binding.clone()),
        }
    }

    pub fn id(&self) -> Option<EntityId> {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Replaces the in-memory post mirror. Never persisted.
    pub fn set_posts(&mut self, posts: &[SharedRef<Post>]) {
        self.posts = MirrorList::of(posts);
    }

    /// The posts referencing this tag, recomputed by reverse bridge lookup on
    /// first access.
    pub fn posts(&mut self) -> Result<Vec<SharedRef<Post>>> {
        match &self.posts.0 {
            MirrorListState::Loaded(weaks) => weaks
                .iter()
                .map(|weak| {
                    weak.upgrade().ok_or(DbError::DetachedAccess {
                        kind: EntityKind::Tag,
                        field: "posts",
                    })
                })
                .collect(),
            MirrorListState::Unloaded(binding) => {
                let core = session::live(binding, EntityKind::Tag, "posts")?;
                let Some(id) = self.id else {
                    self.posts = MirrorList::empty();
                    return Ok(Vec::new());
                };
                let posts = session::posts_of_tag(&core, id)?;
                self.posts = MirrorList::of(&posts);
                Ok(posts)
            }
        }
    }
}

impl Entity for Tag {
    const KIND: EntityKind = EntityKind::Tag;

    fn entity_id(&self) -> Option<EntityId> {
        self.id
    }

    fn assign_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }
}
