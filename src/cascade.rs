//! Cascade resolver: expands a save root into a write set and executes it in
//! dependency order.
//!
//! Collection and execution are separate passes. [`SavePlan::for_root`] walks
//! the declared relationships from a root and buckets every reachable
//! instance per entity kind; [`execute`] then writes the buckets in the
//! topological order derived from the ownership edges, reconciles bridge
//! pairs last, and swaps the staged store in only when everything committed.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::rc::Rc;

use tracing::debug;

use crate::error::{DbError, Result};
use crate::model::{
    Detail, Entity, EntityId, Link, LinkState, Post, SharedRef, Tag, User,
};
use crate::registry::{self, EntityKind, RELATIONSHIPS};
use crate::store::rows::{DetailRow, PostRow, TagRow, UserRow};
use crate::store::Store;

/// An entity type that can be the root of a cascading save.
pub trait Cascade: Entity {
    /// Enqueues this instance and everything reachable through its cascaded
    /// relationships.
    fn enqueue(this: &SharedRef<Self>, plan: &mut SavePlan);
}

/// Write set collected from a root, bucketed per entity kind.
#[derive(Default)]
pub struct SavePlan {
    users: Vec<SharedRef<User>>,
    details: Vec<SharedRef<Detail>>,
    posts: Vec<SharedRef<Post>>,
    tags: Vec<SharedRef<Tag>>,
    seen: HashSet<usize>,
}

impl SavePlan {
    /// Collects the full save set reachable from `root`.
    pub fn for_root<E: Cascade>(root: &SharedRef<E>) -> SavePlan {
        let mut plan = SavePlan::default();
        E::enqueue(root, &mut plan);
        plan
    }

    /// Marks an instance as enqueued; false when it was already present.
    fn mark<T>(&mut self, this: &SharedRef<T>) -> bool {
        self.seen.insert(Rc::as_ptr(this) as *const () as usize)
    }

    pub fn len(&self) -> usize {
        self.users.len() + self.details.len() + self.posts.len() + self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Cascade for User {
    fn enqueue(this: &SharedRef<User>, plan: &mut SavePlan) {
        if !plan.mark(this) {
            return;
        }
        plan.users.push(this.clone());

        // Both owned relationships cascade fully.
        let (detail, posts) = {
            let user = this.borrow();
            (user.cascade_detail(), user.cascade_posts())
        };
        if let Some(detail) = detail {
            Detail::enqueue(&detail, plan);
        }
        for post in posts {
            Post::enqueue(&post, plan);
        }
    }
}

impl Cascade for Detail {
    // Detail -> User carries no cascade policy; only the foreign key is
    // written, at execution time.
    fn enqueue(this: &SharedRef<Detail>, plan: &mut SavePlan) {
        if !plan.mark(this) {
            return;
        }
        plan.details.push(this.clone());
    }
}

impl Cascade for Post {
    fn enqueue(this: &SharedRef<Post>, plan: &mut SavePlan) {
        if !plan.mark(this) {
            return;
        }
        plan.posts.push(this.clone());

        // Persist-only: new tags are inserted, persisted tags are referenced
        // without being re-saved.
        let tags = this.borrow().cascade_tags();
        if let Some(tags) = tags {
            for tag in tags {
                if tag.borrow().id().is_none() {
                    Tag::enqueue(&tag, plan);
                }
            }
        }
    }
}

impl Cascade for Tag {
    fn enqueue(this: &SharedRef<Tag>, plan: &mut SavePlan) {
        if !plan.mark(this) {
            return;
        }
        plan.tags.push(this.clone());
    }
}

/// Identifiers assigned during plan execution, keyed by instance address.
/// Entities see them only after the staged store replaces the live one.
type Assigned = HashMap<usize, EntityId>;

fn instance_key<T>(this: &SharedRef<T>) -> usize {
    Rc::as_ptr(this) as *const () as usize
}

/// Executes a plan against the store.
///
/// Writes land on a staged copy that replaces the live store only when every
/// row and bridge pair committed, so a failed cascade leaves no partial
/// multi-row mutation visible and no identifier assigned in memory.
pub fn execute(plan: &SavePlan, store: &RefCell<Store>) -> Result<()> {
    let mut staged = store.borrow().clone();
    let mut assigned: Assigned = HashMap::new();

    debug!(entities = plan.len(), "executing cascade save");

    for kind in registry::dependency_order(RELATIONSHIPS)? {
        match kind {
            EntityKind::User => {
                for user in &plan.users {
                    write_user(user, &mut staged, &mut assigned)?;
                }
            }
            EntityKind::Detail => {
                for detail in &plan.details {
                    write_detail(detail, &mut staged, &mut assigned)?;
                }
            }
            EntityKind::Post => {
                for post in &plan.posts {
                    write_post(post, &mut staged, &mut assigned)?;
                }
            }
            EntityKind::Tag => {
                for tag in &plan.tags {
                    write_tag(tag, &mut staged, &mut assigned)?;
                }
            }
        }
    }

    reconcile_bridges(plan, &mut staged, &assigned)?;

    *store.borrow_mut() = staged;

    for user in &plan.users {
        apply_id(user, &assigned);
    }
    for detail in &plan.details {
        apply_id(detail, &assigned);
    }
    for post in &plan.posts {
        apply_id(post, &assigned);
    }
    for tag in &plan.tags {
        apply_id(tag, &assigned);
    }

    Ok(())
}

fn apply_id<E: Entity>(this: &SharedRef<E>, assigned: &Assigned) {
    if let Some(id) = assigned.get(&instance_key(this)) {
        this.borrow_mut().assign_id(*id);
    }
}

/// Resolves the foreign key for an owning-side user link: a persisted
/// referent's identifier, one assigned earlier in this run, or the stored
/// column value carried by an unloaded link.
fn resolve_user_fk(link: &Link<User>, assigned: &Assigned) -> Option<EntityId> {
    match &link.0 {
        LinkState::Unset => None,
        LinkState::Loaded(user) => user
            .borrow()
            .id()
            .or_else(|| assigned.get(&instance_key(user)).copied()),
        LinkState::Unloaded { target, .. } => Some(*target),
    }
}

fn write_user(this: &SharedRef<User>, staged: &mut Store, assigned: &mut Assigned) -> Result<()> {
    let user = this.borrow();
    match user.id() {
        Some(id) => {
            let mut row = UserRow::new(user.username());
            row.id = id;
            staged.update_user(row)?;
        }
        None => {
            let id = staged.insert_user(UserRow::new(user.username()));
            assigned.insert(instance_key(this), id);
        }
    }
    Ok(())
}

fn write_detail(
    this: &SharedRef<Detail>,
    staged: &mut Store,
    assigned: &mut Assigned,
) -> Result<()> {
    let detail = this.borrow();
    let user_id =
        resolve_user_fk(detail.user_link(), assigned).ok_or(DbError::MissingReference {
            kind: EntityKind::Detail,
            relation: "user",
        })?;
    match detail.id() {
        Some(id) => {
            let mut row = DetailRow::new(detail.address(), user_id);
            row.id = id;
            staged.update_detail(row)?;
        }
        None => {
            let id = staged.insert_detail(DetailRow::new(detail.address(), user_id))?;
            assigned.insert(instance_key(this), id);
        }
    }
    Ok(())
}

fn write_post(this: &SharedRef<Post>, staged: &mut Store, assigned: &mut Assigned) -> Result<()> {
    let post = this.borrow();
    let user_id = resolve_user_fk(post.user_link(), assigned).ok_or(DbError::MissingReference {
        kind: EntityKind::Post,
        relation: "user",
    })?;
    match post.id() {
        Some(id) => {
            let mut row = PostRow::new(post.title(), user_id);
            row.id = id;
            staged.update_post(row)?;
        }
        None => {
            let id = staged.insert_post(PostRow::new(post.title(), user_id));
            assigned.insert(instance_key(this), id);
        }
    }
    Ok(())
}

fn write_tag(this: &SharedRef<Tag>, staged: &mut Store, assigned: &mut Assigned) -> Result<()> {
    let tag = this.borrow();
    match tag.id() {
        Some(id) => {
            let mut row = TagRow::new(tag.name());
            row.id = id;
            staged.update_tag(row)?;
        }
        None => {
            let id = staged.insert_tag(TagRow::new(tag.name()));
            assigned.insert(instance_key(this), id);
        }
    }
    Ok(())
}

/// Diffs each post's in-memory tag collection against the stored bridge pairs
/// and inserts the missing ones. Stale pairs from a shrunken collection are
/// intentionally left in place; removal reconciliation is the documented
/// extension point. Idempotent: re-running with an unchanged collection
/// writes nothing.
fn reconcile_bridges(plan: &SavePlan, staged: &mut Store, assigned: &Assigned) -> Result<()> {
    for post in &plan.posts {
        let (post_id, tags) = {
            let post_ref = post.borrow();
            let id = post_ref
                .id()
                .or_else(|| assigned.get(&instance_key(post)).copied());
            (id, post_ref.cascade_tags())
        };
        let Some(post_id) = post_id else { continue };
        // Unloaded collection: the stored pairs stay as they are.
        let Some(tags) = tags else { continue };

        let mut target: BTreeSet<EntityId> = BTreeSet::new();
        for tag in &tags {
            let tag_id = tag
                .borrow()
                .id()
                .or_else(|| assigned.get(&instance_key(tag)).copied())
                .ok_or(DbError::MissingReference {
                    kind: EntityKind::Post,
                    relation: "tags",
                })?;
            // The set deduplicates, enforcing the unique-pair invariant.
            target.insert(tag_id);
        }

        let current: BTreeSet<EntityId> = staged.tags_for_post(post_id).into_iter().collect();
        let mut inserted = 0;
        for tag_id in target.difference(&current) {
            staged.link_post_tag(post_id, *tag_id);
            inserted += 1;
        }
        if inserted > 0 {
            debug!(post = %post_id, pairs = inserted, "bridge pairs reconciled");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn full_cascade_collects_the_whole_owned_graph() {
        let user = User::new("JohnDoe");
        let detail = Detail::new("123 Baker Street");
        let post = Post::new("On gardening");
        let tag = Tag::new("Java");

        user.borrow_mut().set_detail(&detail);
        detail.borrow_mut().set_user(&user);
        post.borrow_mut().set_user(&user);
        post.borrow_mut().add_tag(&tag);
        user.borrow_mut().add_post(&post);

        let plan = SavePlan::for_root(&user);
        assert_eq!(plan.users.len(), 1);
        assert_eq!(plan.details.len(), 1);
        assert_eq!(plan.posts.len(), 1);
        assert_eq!(plan.tags.len(), 1);
    }

    #[test]
    fn persisted_tags_are_referenced_not_re_enqueued() {
        let store = RefCell::new(Store::new());
        let tag = Tag::new("Java");
        let plan = SavePlan::for_root(&tag);
        execute(&plan, &store).unwrap();
        assert!(tag.borrow().id().is_some());

        let user = User::new("JohnDoe");
        let post = Post::new("On gardening");
        post.borrow_mut().set_user(&user);
        post.borrow_mut().add_tag(&tag);
        user.borrow_mut().add_post(&post);

        let plan = SavePlan::for_root(&user);
        assert_eq!(plan.tags.len(), 0);
        assert_eq!(plan.posts.len(), 1);
    }

    #[test]
    fn shared_instances_are_enqueued_once() {
        let user = User::new("JohnDoe");
        let post = Post::new("On gardening");
        post.borrow_mut().set_user(&user);
        user.borrow_mut().add_post(&post);
        user.borrow_mut().add_post(&post);

        let plan = SavePlan::for_root(&user);
        assert_eq!(plan.posts.len(), 1);
    }

    #[test]
    fn failed_cascade_leaves_store_and_identifiers_untouched() {
        let store = RefCell::new(Store::new());

        let user = User::new("JohnDoe");
        let orphan = Detail::new("nowhere"); // no user reference
        user.borrow_mut().set_detail(&orphan);

        let plan = SavePlan::for_root(&user);
        let err = execute(&plan, &store).unwrap_err();
        assert!(matches!(err, DbError::MissingReference { .. }));
        assert_eq!(store.borrow().user_count(), 0);
        assert!(user.borrow().id().is_none());
    }
}
