//! Association-aware object graph persistence over an in-memory relational
//! store.
//!
//! Four entity kinds (`User`, `Detail`, `Post`, `Tag`) are connected by the
//! three canonical relationship shapes: one-to-one (User↔Detail, foreign key
//! on the detail), one-to-many (User↔Post, foreign key on the post), and
//! many-to-many (Post↔Tag, realized through a bridge table). Saving a root
//! entity cascades inserts through its owned relationships in dependency
//! order; reloading a root inside an open [`UnitOfWork`] resolves related
//! entities lazily on first access.
//!
//! ```
//! use objdb::{Database, Detail, User};
//!
//! # fn main() -> objdb::Result<()> {
//! let db = Database::new();
//!
//! let user = User::new("JohnDoe");
//! let detail = Detail::new("123 Baker Street");
//! user.borrow_mut().set_detail(&detail);
//! detail.borrow_mut().set_user(&user);
//!
//! let user_id = db.save(&user)?;
//!
//! let uow = db.begin();
//! let reloaded = uow.find::<User>(user_id)?;
//! let detail = reloaded.borrow_mut().detail()?.unwrap();
//! assert_eq!(detail.borrow().address(), "123 Baker Street");
//! uow.commit();
//! # Ok(())
//! # }
//! ```

pub mod cascade;
pub mod db;
pub mod error;
pub mod model;
pub mod registry;
pub mod session;
pub mod store;

pub use db::Database;
pub use error::{DbError, Result};
pub use model::{Detail, Entity, EntityId, Post, SharedRef, Tag, User};
pub use session::UnitOfWork;
