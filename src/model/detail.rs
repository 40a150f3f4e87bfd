use std::cell::RefCell;
use std::rc::Rc;

use crate::error::Result;
use crate::model::{Entity, EntityId, Link, LinkState, SharedRef, User};
use crate::registry::EntityKind;
use crate::session::{self, Binding};
use crate::store::rows::DetailRow;

/// Per-user detail record: the owning side of the one-to-one relationship.
///
/// Its table carries the `user_id` foreign key column with a uniqueness
/// constraint, so at most one detail row can reference a given user.
#[derive(Debug)]
pub struct Detail {
    pub(crate) id: Option<EntityId>,
    pub(crate) address: String,
    pub(crate) user: Link<User>,
}

impl Detail {
    /// Creates a transient detail with no identifier and no user reference.
    pub fn new(address: impl Into<String>) -> SharedRef<Detail> {
        Rc::new(RefCell::new(Detail {
            id: None,
            address: address.into(),
            user: Link::unset(),
        }))
    }

    pub(crate) fn from_row(row: &DetailRow, binding: &Binding) -> Detail {
        Detail {
            id: Some(row.id),
            address: row.address.clone(),
            user: Link::unloaded(binding.clone(), row.user_id),
        }
    }

    pub fn id(&self) -> Option<EntityId> {
        self.id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn set_address(&mut self, address: impl Into<String>) {
        self.address = address.into();
    }

    /// Sets the owning user reference backing the foreign key column.
    pub fn set_user(&mut self, user: &SharedRef<User>) {
        self.user = Link::to(user);
    }

    pub fn clear_user(&mut self) {
        self.user = Link::unset();
    }

    /// The referenced user, fetched by identifier on first access when this
    /// instance came out of a unit of work.
    pub fn user(&mut self) -> Result<Option<SharedRef<User>>> {
        match &self.user.0 {
            LinkState::Unset => Ok(None),
            LinkState::Loaded(user) => Ok(Some(user.clone())),
            LinkState::Unloaded { binding, target } => {
                let core = session::live(binding, EntityKind::Detail, "user")?;
                let user = session::user_by_id(&core, *target)?;
                self.user = Link::to(&user);
                Ok(Some(user))
            }
        }
    }

    /// The foreign key value without resolving the referent. `None` while the
    /// reference is unset or the referenced user is transient.
    pub fn user_id(&self) -> Option<EntityId> {
        match &self.user.0 {
            LinkState::Unset => None,
            LinkState::Loaded(user) => user.borrow().id(),
            LinkState::Unloaded { target, .. } => Some(*target),
        }
    }

    pub(crate) fn user_link(&self) -> &Link<User> {
        &self.user
    }
}

impl Entity for Detail {
    const KIND: EntityKind = EntityKind::Detail;

    fn entity_id(&self) -> Option<EntityId> {
        self.id
    }

    fn assign_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }
}
