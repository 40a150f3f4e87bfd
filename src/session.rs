//! Unit-of-work scope: identity map plus lazy association loading.
//!
//! A [`UnitOfWork`] wraps a shared [`SessionCore`] holding the liveness flag
//! and one identity map per entity kind. Materialized instances carry a weak
//! [`Binding`] back to the core; lazy accessors upgrade it on every fetch, so
//! the moment the scope closes (or the handle is dropped) further lazy access
//! fails with a detached-access error instead of returning stale data.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::error::{DbError, Result};
use crate::model::{Detail, Entity, EntityId, Post, SharedRef, Tag, User};
use crate::registry::EntityKind;
use crate::store::Store;

/// Weak handle binding a lazy field to the unit of work that produced it.
pub type Binding = Weak<SessionCore>;

/// Shared state behind an open unit of work. Exclusively owned by its scope;
/// never shared across scopes.
pub struct SessionCore {
    store: Rc<RefCell<Store>>,
    open: Cell<bool>,
    identity: RefCell<IdentityMap>,
}

#[derive(Default)]
struct IdentityMap {
    users: HashMap<EntityId, SharedRef<User>>,
    details: HashMap<EntityId, SharedRef<Detail>>,
    posts: HashMap<EntityId, SharedRef<Post>>,
    tags: HashMap<EntityId, SharedRef<Tag>>,
}

impl IdentityMap {
    fn clear(&mut self) {
        self.users.clear();
        self.details.clear();
        self.posts.clear();
        self.tags.clear();
    }
}

/// Transactional scope: Closed → begin → Open → commit | rollback → Closed.
///
/// Lookups inside the scope act as an identity map: repeated finds for the
/// same identifier return the same instance. Closing the scope releases the
/// map and invalidates every lazy binding handed out through it. Dropping the
/// handle without committing closes the scope the same way.
pub struct UnitOfWork {
    core: Rc<SessionCore>,
}

impl UnitOfWork {
    pub(crate) fn begin(store: Rc<RefCell<Store>>) -> Self {
        debug!("unit of work opened");
        UnitOfWork {
            core: Rc::new(SessionCore {
                store,
                open: Cell::new(true),
                identity: RefCell::new(IdentityMap::default()),
            }),
        }
    }

    /// Looks up an entity by identifier, enabling lazy access on the result.
    pub fn find<E: Materialize>(&self, id: EntityId) -> Result<SharedRef<E>> {
        E::load(&self.core, id)
    }

    pub fn is_open(&self) -> bool {
        self.core.open.get()
    }

    /// Closes the scope. Writes were already flushed eagerly by `save`; this
    /// finalizes visibility and releases the identity map.
    pub fn commit(self) {
        self.close("committed");
    }

    /// Closes the scope, discarding the identity map. With eager per-save
    /// atomicity the observable effect is ending lazy access.
    pub fn rollback(self) {
        self.close("rolled back");
    }

    fn close(&self, outcome: &str) {
        self.core.open.set(false);
        self.core.identity.borrow_mut().clear();
        debug!(outcome, "unit of work closed");
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if self.core.open.get() {
            self.close("dropped");
        }
    }
}

/// Upgrades a binding, failing with detached access when the scope is gone
/// or no longer open.
pub(crate) fn live(
    binding: &Binding,
    kind: EntityKind,
    field: &'static str,
) -> Result<Rc<SessionCore>> {
    match binding.upgrade() {
        Some(core) if core.open.get() => Ok(core),
        _ => Err(DbError::DetachedAccess { kind, field }),
    }
}

/// Entity kinds loadable by identifier through a session core.
pub trait Materialize: Entity + Sized {
    /// Loads by identifier, consulting the identity map first so repeated
    /// lookups return the same instance.
    fn load(core: &Rc<SessionCore>, id: EntityId) -> Result<SharedRef<Self>>;
}

impl Materialize for User {
    fn load(core: &Rc<SessionCore>, id: EntityId) -> Result<SharedRef<User>> {
        if let Some(existing) = core.identity.borrow().users.get(&id) {
            return Ok(existing.clone());
        }
        let row = core.store.borrow().user(id)?;
        let user = Rc::new(RefCell::new(User::from_row(&row, &Rc::downgrade(core))));
        core.identity.borrow_mut().users.insert(id, user.clone());
        trace!(id = %id, "user materialized");
        Ok(user)
    }
}

impl Materialize for Detail {
    fn load(core: &Rc<SessionCore>, id: EntityId) -> Result<SharedRef<Detail>> {
        if let Some(existing) = core.identity.borrow().details.get(&id) {
            return Ok(existing.clone());
        }
        let row = core.store.borrow().detail(id)?;
        let detail = Rc::new(RefCell::new(Detail::from_row(&row, &Rc::downgrade(core))));
        core.identity.borrow_mut().details.insert(id, detail.clone());
        trace!(id = %id, "detail materialized");
        Ok(detail)
    }
}

impl Materialize for Post {
    fn load(core: &Rc<SessionCore>, id: EntityId) -> Result<SharedRef<Post>> {
        if let Some(existing) = core.identity.borrow().posts.get(&id) {
            return Ok(existing.clone());
        }
        let row = core.store.borrow().post(id)?;
        let post = Rc::new(RefCell::new(Post::from_row(&row, &Rc::downgrade(core))));
        core.identity.borrow_mut().posts.insert(id, post.clone());
        trace!(id = %id, "post materialized");
        Ok(post)
    }
}

impl Materialize for Tag {
    fn load(core: &Rc<SessionCore>, id: EntityId) -> Result<SharedRef<Tag>> {
        if let Some(existing) = core.identity.borrow().tags.get(&id) {
            return Ok(existing.clone());
        }
        let row = core.store.borrow().tag(id)?;
        let tag = Rc::new(RefCell::new(Tag::from_row(&row, &Rc::downgrade(core))));
        core.identity.borrow_mut().tags.insert(id, tag.clone());
        trace!(id = %id, "tag materialized");
        Ok(tag)
    }
}

/// The user referenced by an owning foreign key.
pub(crate) fn user_by_id(core: &Rc<SessionCore>, id: EntityId) -> Result<SharedRef<User>> {
    User::load(core, id)
}

/// The detail owning a foreign key to `user_id`, if any.
pub(crate) fn detail_of_user(
    core: &Rc<SessionCore>,
    user_id: EntityId,
) -> Result<Option<SharedRef<Detail>>> {
    let row = core.store.borrow().detail_for_user(user_id);
    match row {
        Some(row) => Detail::load(core, row.id).map(Some),
        None => Ok(None),
    }
}

/// The posts owning a foreign key to `user_id`.
pub(crate) fn posts_of_user(
    core: &Rc<SessionCore>,
    user_id: EntityId,
) -> Result<Vec<SharedRef<Post>>> {
    let ids: Vec<EntityId> = core
        .store
        .borrow()
        .posts_for_user(user_id)
        .iter()
        .map(|row| row.id)
        .collect();
    ids.into_iter().map(|id| Post::load(core, id)).collect()
}

/// The tags linked to `post_id` through the bridge table.
pub(crate) fn tags_of_post(
    core: &Rc<SessionCore>,
    post_id: EntityId,
) -> Result<Vec<SharedRef<Tag>>> {
    let ids = core.store.borrow().tags_for_post(post_id);
    ids.into_iter().map(|id| Tag::load(core, id)).collect()
}

/// The posts linked to `tag_id`, by reverse bridge lookup.
pub(crate) fn posts_of_tag(
    core: &Rc<SessionCore>,
    tag_id: EntityId,
) -> Result<Vec<SharedRef<Post>>> {
    let ids = core.store.borrow().posts_for_tag(tag_id);
    ids.into_iter().map(|id| Post::load(core, id)).collect()
}
