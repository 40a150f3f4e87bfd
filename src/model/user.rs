use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{DbError, Result};
use crate::model::{
    Detail, Entity, EntityId, MirrorLink, MirrorLinkState, MirrorList, MirrorListState, Post,
    SharedRef,
};
use crate::registry::EntityKind;
use crate::session::{self, Binding};
use crate::store::rows::UserRow;

/// A user with an optional owned [`Detail`] and a collection of owned
/// [`Post`]s.
///
/// Both association fields are mirrors: the one-to-one foreign key lives on
/// the detail and the one-to-many foreign key lives on each post. Callers
/// linking a transient graph keep both sides consistent themselves; instances
/// loaded through a unit of work recompute the mirrors from the owning side.
#[derive(Debug)]
pub struct User {
    pub(crate) id: Option<EntityId>,
    pub(crate) username: String,
    pub(crate) detail: MirrorLink<Detail>,
    pub(crate) posts: MirrorList<Post>,
}

impl User {
    /// Creates a transient user with no identifier and no associations.
    pub fn new(username: impl Into<String>) -> SharedRef<User> {
        Rc::new(RefCell::new(User {
            id: None,
            username: username.into(),
            detail: MirrorLink::unset(),
            posts: MirrorList::empty(),
        }))
    }

    pub(crate) fn from_row(row: &UserRow, binding: &Binding) -> User {
        User {
            id: Some(row.id),
            username: row.username.clone(),
            detail: MirrorLink::unloaded(binding.clone()),
            posts: MirrorList::unloaded(binding.clone()),
        }
    }

    pub fn id(&self) -> Option<EntityId> {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn set_username(&mut self, username: impl Into<String>) {
        self.username = username.into();
    }

    /// Points the in-memory mirror at `detail`. The store-of-truth foreign
    /// key is the detail's user reference.
    pub fn set_detail(&mut self, detail: &SharedRef<Detail>) {
        self.detail = MirrorLink::to(detail);
    }

    pub fn clear_detail(&mut self) {
        self.detail = MirrorLink::unset();
    }

    /// Replaces the post mirror collection.
    pub fn set_posts(&mut self, posts: &[SharedRef<Post>]) {
        self.posts = MirrorList::of(posts);
    }

    /// Appends to the post mirror collection. An unresolved view loaded from
    /// the store is replaced rather than fetched first.
    pub fn add_post(&mut self, post: &SharedRef<Post>) {
        match &mut self.posts.0 {
            MirrorListState::Loaded(posts) => posts.push(Rc::downgrade(post)),
            MirrorListState::Unloaded(_) => {
                self.posts = MirrorList::of(std::slice::from_ref(post));
            }
        }
    }

    /// The owned detail, fetched through the owning foreign key on first
    /// access when this instance came out of a unit of work.
    pub fn detail(&mut self) -> Result<Option<SharedRef<Detail>>> {
        match &self.detail.0 {
            MirrorLinkState::Unset => Ok(None),
            MirrorLinkState::Loaded(weak) => match weak.upgrade() {
                Some(detail) => Ok(Some(detail)),
                None => Err(DbError::DetachedAccess {
                    kind: EntityKind::User,
                    field: "detail",
                }),
            },
            MirrorLinkState::Unloaded(binding) => {
                let core = session::live(binding, EntityKind::User, "detail")?;
                let Some(id) = self.id else {
                    self.detail = MirrorLink::unset();
                    return Ok(None);
                };
                let detail = session::detail_of_user(&core, id)?;
                self.detail = match &detail {
                    Some(detail) => MirrorLink::to(detail),
                    None => MirrorLink::unset(),
                };
                Ok(detail)
            }
        }
    }

    /// The owned posts, fetched by reverse foreign-key lookup on first
    /// access.
    pub fn posts(&mut self) -> Result<Vec<SharedRef<Post>>> {
        match &self.posts.0 {
            MirrorListState::Loaded(weaks) => weaks
                .iter()
                .map(|weak| {
                    weak.upgrade().ok_or(DbError::DetachedAccess {
                        kind: EntityKind::User,
                        field: "posts",
                    })
                })
                .collect(),
            MirrorListState::Unloaded(binding) => {
                let core = session::live(binding, EntityKind::User, "posts")?;
                let Some(id) = self.id else {
                    self.posts = MirrorList::empty();
                    return Ok(Vec::new());
                };
                let posts = session::posts_of_user(&core, id)?;
                self.posts = MirrorList::of(&posts);
                Ok(posts)
            }
        }
    }

    /// Loaded detail mirror, if the referent is still alive. Unloaded and
    /// severed mirrors cascade nothing.
    pub(crate) fn cascade_detail(&self) -> Option<SharedRef<Detail>> {
        match &self.detail.0 {
            MirrorLinkState::Loaded(weak) => weak.upgrade(),
            _ => None,
        }
    }

    /// Loaded post mirrors whose referents are still alive.
    pub(crate) fn cascade_posts(&self) -> Vec<SharedRef<Post>> {
        match &self.posts.0 {
            MirrorListState::Loaded(weaks) => weaks.iter().filter_map(|w| w.upgrade()).collect(),
            MirrorListState::Unloaded(_) => Vec::new(),
        }
    }
}

impl Entity for User {
    const KIND: EntityKind = EntityKind::User;

    fn entity_id(&self) -> Option<EntityId> {
        self.id
    }

    fn assign_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }
}
