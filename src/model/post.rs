use std::cell::RefCell;
use std::rc::Rc;

use crate::error::Result;
use crate::model::{
    Entity, EntityId, Link, LinkList, LinkListState, LinkState, SharedRef, Tag, User,
};
use crate::registry::EntityKind;
use crate::session::{self, Binding};
use crate::store::rows::PostRow;

/// A post owned by a user, carrying the many-to-one foreign key and the
/// owning side of the Post↔Tag bridge.
///
/// The in-memory tag collection is the source of truth reconciled into the
/// bridge table on save; it never holds duplicate tag identifiers.
#[derive(Debug)]
pub struct Post {
    pub(crate) id: Option<EntityId>,
    pub(crate) title: String,
    pub(crate) user: Link<User>,
    pub(crate) tags: LinkList<Tag>,
}

impl Post {
    /// Creates a transient post with no identifier, no user, and no tags.
    pub fn new(title: impl Into<String>) -> SharedRef<Post> {
        Rc::new(RefCell::new(Post {
            id: None,
            title: title.into(),
            user: Link::unset(),
            tags: LinkList::empty(),
        }))
    }

    pub(crate) fn from_row(row: &PostRow, binding: &Binding) -> Post {
        Post {
            id: Some(row.id),
            title: row.title.clone(),
            user: Link::unloaded(binding.clone(), row.user_id),
            tags: LinkList::unloaded(binding.clone()),
        }
    }

    pub fn id(&self) -> Option<EntityId> {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Sets the owning user reference backing the foreign key column.
    pub fn set_user(&mut self, user: &SharedRef<User>) {
        self.user = Link::to(user);
    }

    /// The referenced user, fetched by identifier on first access when this
    /// instance came out of a unit of work.
    pub fn user(&mut self) -> Result<Option<SharedRef<User>>> {
        match &self.user.0 {
            LinkState::Unset => Ok(None),
            LinkState::Loaded(user) => Ok(Some(user.clone())),
            LinkState::Unloaded { binding, target } => {
                let core = session::live(binding, EntityKind::Post, "user")?;
                let user = session::user_by_id(&core, *target)?;
                self.user = Link::to(&user);
                Ok(Some(user))
            }
        }
    }

    /// The foreign key value without resolving the referent.
    pub fn user_id(&self) -> Option<EntityId> {
        match &self.user.0 {
            LinkState::Unset => None,
            LinkState::Loaded(user) => user.borrow().id(),
            LinkState::Unloaded { target, .. } => Some(*target),
        }
    }

    /// Adds a tag, skipping referents already present (by instance or by
    /// persisted identifier). An unresolved collection loaded from the store
    /// is replaced rather than fetched first.
    pub fn add_tag(&mut self, tag: &SharedRef<Tag>) {
        match &mut self.tags.0 {
            LinkListState::Loaded(tags) => {
                let duplicate = tags.iter().any(|existing| {
                    Rc::ptr_eq(existing, tag)
                        || (existing.borrow().id().is_some()
                            && existing.borrow().id() == tag.borrow().id())
                });
                if !duplicate {
                    tags.push(tag.clone());
                }
            }
            LinkListState::Unloaded(_) => {
                self.tags = LinkList::of(std::slice::from_ref(tag));
            }
        }
    }

    /// Replaces the tag collection.
    pub fn set_tags(&mut self, tags: &[SharedRef<Tag>]) {
        self.tags = LinkList::of(tags);
    }

    /// The tag collection, fetched through the bridge table on first access.
    pub fn tags(&mut self) -> Result<Vec<SharedRef<Tag>>> {
        match &self.tags.0 {
            LinkListState::Loaded(tags) => Ok(tags.clone()),
            LinkListState::Unloaded(binding) => {
                let core = session::live(binding, EntityKind::Post, "tags")?;
                let Some(id) = self.id else {
                    self.tags = LinkList::empty();
                    return Ok(Vec::new());
                };
                let tags = session::tags_of_post(&core, id)?;
                self.tags = LinkList::of(&tags);
                Ok(tags)
            }
        }
    }

    /// Loaded tag collection for cascade and bridge reconciliation. `None`
    /// when the collection is unloaded, leaving stored pairs untouched.
    pub(crate) fn cascade_tags(&self) -> Option<Vec<SharedRef<Tag>>> {
        match &self.tags.0 {
            LinkListState::Loaded(tags) => Some(tags.clone()),
            LinkListState::Unloaded(_) => None,
        }
    }

    pub(crate) fn user_link(&self) -> &Link<User> {
        &self.user
    }
}

impl Entity for Post {
    const KIND: EntityKind = EntityKind::Post;

    fn entity_id(&self) -> Option<EntityId> {
        self.id
    }

    fn assign_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }
}
