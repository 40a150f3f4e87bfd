//! Database facade: cascading saves, unit-of-work scopes, detached lookups,
//! and snapshot persistence.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use tracing::debug;

use crate::cascade::{self, Cascade, SavePlan};
use crate::error::Result;
use crate::model::{EntityId, SharedRef};
use crate::session::{Materialize, UnitOfWork};
use crate::store::Store;

/// Handle over the backing store.
pub struct Database {
    store: Rc<RefCell<Store>>,
}

impl Database {
    pub fn new() -> Self {
        Database {
            store: Rc::new(RefCell::new(Store::new())),
        }
    }

    /// Saves the root and everything reachable through its cascaded
    /// relationships, returning the root's identifier. Each call is
    /// all-or-nothing: a failure leaves the store and every in-memory
    /// identifier untouched.
    pub fn save<E: Cascade>(&self, root: &SharedRef<E>) -> Result<EntityId> {
        let plan = SavePlan::for_root(root);
        cascade::execute(&plan, &self.store)?;
        let id = root
            .borrow()
            .entity_id()
            .expect("successful cascade assigns the root identifier");
        debug!(kind = %E::KIND, id = %id, "saved");
        Ok(id)
    }

    /// Applies [`Database::save`] to each root independently; there is no
    /// cross-element transaction beyond each call's own atomicity.
    pub fn save_all<E: Cascade>(&self, roots: &[SharedRef<E>]) -> Result<Vec<EntityId>> {
        roots.iter().map(|root| self.save(root)).collect()
    }

    /// Opens a unit of work over this store.
    pub fn begin(&self) -> UnitOfWork {
        UnitOfWork::begin(self.store.clone())
    }

    /// Detached lookup: the instance's scalar fields are populated but its
    /// association fields cannot be resolved; touching them reports detached
    /// access. Use [`Database::begin`] and [`UnitOfWork::find`] for lazy
    /// navigation.
    pub fn get<E: Materialize>(&self, id: EntityId) -> Result<SharedRef<E>> {
        // An ephemeral scope that closes before the instance is handed out.
        let uow = self.begin();
        let found = uow.find(id)?;
        uow.rollback();
        Ok(found)
    }

    /// Writes the store state to a versioned JSON snapshot.
    pub fn snapshot_to(&self, path: &Path) -> Result<()> {
        self.store.borrow().snapshot_to(path)
    }

    /// Opens a database over the store restored from a snapshot.
    pub fn restore_from(path: &Path) -> Result<Database> {
        Ok(Database {
            store: Rc::new(RefCell::new(Store::restore_from(path)?)),
        })
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}
