//! In-memory entity model.
//!
//! Entities are plain structs behind [`SharedRef`] handles. Association
//! fields come in two flavors: owning-direction links hold strong references
//! (Detail→User, Post→User, Post→Tag), mirror-direction links hold weak
//! references (User→Detail, User→Post, Tag→Post). Since every strong edge
//! points away from the mirror side, a fully linked bidirectional graph never
//! forms a strong `Rc` cycle.
//!
//! A link can also be *unloaded*: an instance materialized inside a unit of
//! work starts with all association fields unloaded, each carrying a weak
//! binding back to the scope that produced it. First access resolves the
//! field through that binding and caches the result on the instance; once the
//! scope closes, the binding dies and access fails instead of returning stale
//! data.

mod detail;
mod post;
mod tag;
mod user;

pub use detail::Detail;
pub use post::Post;
pub use tag::Tag;
pub use user::User;

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};

use crate::registry::EntityKind;
use crate::session::Binding;

/// Shared handle to an entity instance.
pub type SharedRef<T> = Rc<RefCell<T>>;

/// Store-assigned integer identifier. Assigned once at first insert, never
/// reassigned or reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Common identity surface over the four entity types.
pub trait Entity {
    const KIND: EntityKind;

    /// Assigned identifier, `None` while the instance is transient.
    fn entity_id(&self) -> Option<EntityId>;

    /// Called by the cascade resolver after a successful insert.
    fn assign_id(&mut self, id: EntityId);
}

/// Owning-direction single reference (the foreign key side).
#[derive(Debug)]
pub struct Link<T>(pub(crate) LinkState<T>);

/// `Unloaded` carries the foreign key value read from the store so the
/// column can be rewritten on update without resolving the referent.
#[derive(Debug)]
pub(crate) enum LinkState<T> {
    Unset,
    Loaded(SharedRef<T>),
    Unloaded { binding: Binding, target: EntityId },
}

impl<T> Link<T> {
    pub(crate) fn unset() -> Self {
        Link(LinkState::Unset)
    }

    pub(crate) fn to(target: &SharedRef<T>) -> Self {
        Link(LinkState::Loaded(target.clone()))
    }

    pub(crate) fn unloaded(binding: Binding, target: EntityId) -> Self {
        Link(LinkState::Unloaded { binding, target })
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.0, LinkState::Loaded(_))
    }
}

/// Mirror-direction single reference. Kept weak and never persisted; the
/// foreign key on the owning side is the source of truth.
#[derive(Debug)]
pub struct MirrorLink<T>(pub(crate) MirrorLinkState<T>);

#[derive(Debug)]
pub(crate) enum MirrorLinkState<T> {
    Unset,
    Loaded(Weak<RefCell<T>>),
    Unloaded(Binding),
}

impl<T> MirrorLink<T> {
    pub(crate) fn unset() -> Self {
        MirrorLink(MirrorLinkState::Unset)
    }

    pub(crate) fn to(target: &SharedRef<T>) -> Self {
        MirrorLink(MirrorLinkState::Loaded(Rc::downgrade(target)))
    }

    pub(crate) fn unloaded(binding: Binding) -> Self {
        MirrorLink(MirrorLinkState::Unloaded(binding))
    }
}

/// Owning-direction collection: the in-memory source of truth for bridge
/// rows.
#[derive(Debug)]
pub struct LinkList<T>(pub(crate) LinkListState<T>);

#[derive(Debug)]
pub(crate) enum LinkListState<T> {
    Loaded(Vec<SharedRef<T>>),
    Unloaded(Binding),
}

impl<T> LinkList<T> {
    pub(crate) fn empty() -> Self {
        LinkList(LinkListState::Loaded(Vec::new()))
    }

    pub(crate) fn of(targets: &[SharedRef<T>]) -> Self {
        LinkList(LinkListState::Loaded(targets.to_vec()))
    }

    pub(crate) fn unloaded(binding: Binding) -> Self {
        LinkList(LinkListState::Unloaded(binding))
    }
}

/// Mirror-direction collection: a derived view recomputed by reverse lookup
/// on load, never persisted.
#[derive(Debug)]
pub struct MirrorList<T>(pub(crate) MirrorListState<T>);

#[derive(Debug)]
pub(crate) enum MirrorListState<T> {
    Loaded(Vec<Weak<RefCell<T>>>),
    Unloaded(Binding),
}

impl<T> MirrorList<T> {
    pub(crate) fn empty() -> Self {
        MirrorList(MirrorListState::Loaded(Vec::new()))
    }

    pub(crate) fn of(targets: &[SharedRef<T>]) -> Self {
        MirrorList(MirrorListState::Loaded(
            targets.iter().map(Rc::downgrade).collect(),
        ))
    }

    pub(crate) fn unloaded(binding: Binding) -> Self {
        MirrorList(MirrorListState::Unloaded(binding))
    }
}
