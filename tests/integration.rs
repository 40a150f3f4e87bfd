use std::collections::HashSet;
use std::rc::Rc;

use objdb::{Database, DbError, Detail, Post, Tag, User};

#[test]
fn user_and_detail_round_trip() {
    let db = Database::new();

    let user = User::new("JohnDoe");
    let detail = Detail::new("123 Baker Street");
    user.borrow_mut().set_detail(&detail);
    detail.borrow_mut().set_user(&user);

    let user_id = db.save(&user).unwrap();

    let detail_id = detail.borrow().id().expect("detail saved by cascade");
    assert!(detail_id.0 > 0);
    assert_eq!(detail.borrow().user_id(), Some(user_id));

    let uow = db.begin();
    let reloaded = uow.find::<User>(user_id).unwrap();
    let loaded_detail = reloaded.borrow_mut().detail().unwrap().unwrap();
    assert_eq!(loaded_detail.borrow().address(), "123 Baker Street");
    assert_eq!(loaded_detail.borrow().user_id(), Some(user_id));

    // The back-reference resolves to the identity-mapped instance.
    let back = loaded_detail.borrow_mut().user().unwrap().unwrap();
    assert!(Rc::ptr_eq(&back, &reloaded));
    uow.commit();
}

#[test]
fn identifiers_are_assigned_once() {
    let db = Database::new();
    let user = User::new("JohnDoe");
    assert!(user.borrow().id().is_none());

    let first = db.save(&user).unwrap();
    assert_eq!(user.borrow().id(), Some(first));

    user.borrow_mut().set_username("JaneDoe");
    let second = db.save(&user).unwrap();
    assert_eq!(first, second);

    let reloaded = db.get::<User>(first).unwrap();
    assert_eq!(reloaded.borrow().username(), "JaneDoe");
}

#[test]
fn posts_of_a_user_load_as_a_collection() {
    let db = Database::new();

    let user = User::new("JohnDoe");
    db.save(&user).unwrap();

    let post1 = Post::new("On gardening");
    let post2 = Post::new("On carpentry");
    post1.borrow_mut().set_user(&user);
    post2.borrow_mut().set_user(&user);
    user.borrow_mut().set_posts(&[post1.clone(), post2.clone()]);

    db.save_all(&[post1, post2]).unwrap();

    let uow = db.begin();
    let reloaded = uow.find::<User>(user.borrow().id().unwrap()).unwrap();
    let posts = reloaded.borrow_mut().posts().unwrap();
    assert_eq!(posts.len(), 2);

    // Order is unspecified; compare titles as a set.
    let titles: HashSet<String> = posts
        .iter()
        .map(|post| post.borrow().title().to_string())
        .collect();
    assert_eq!(
        titles,
        HashSet::from(["On gardening".to_string(), "On carpentry".to_string()])
    );
    uow.commit();
}

#[test]
fn bridge_pairs_are_shared_and_idempotent() {
    let db = Database::new();

    let user = User::new("JohnDoe");
    db.save(&user).unwrap();

    let tag_java = Tag::new("Java");
    let tag_db = Tag::new("Database");

    let post1 = Post::new("On gardening");
    post1.borrow_mut().set_user(&user);
    post1.borrow_mut().add_tag(&tag_java);
    post1.borrow_mut().add_tag(&tag_db);

    let post2 = Post::new("On carpentry");
    post2.borrow_mut().set_user(&user);
    post2.borrow_mut().add_tag(&tag_java);

    db.save_all(&[post1.clone(), post2]).unwrap();

    // Three pairs total, observed through reverse lookups.
    let uow = db.begin();
    let java = uow.find::<Tag>(tag_java.borrow().id().unwrap()).unwrap();
    let database = uow.find::<Tag>(tag_db.borrow().id().unwrap()).unwrap();
    assert_eq!(java.borrow_mut().posts().unwrap().len(), 2);
    assert_eq!(database.borrow_mut().posts().unwrap().len(), 1);
    uow.commit();

    // Re-saving with an unchanged tag set changes nothing.
    db.save(&post1).unwrap();

    let uow = db.begin();
    let java = uow.find::<Tag>(tag_java.borrow().id().unwrap()).unwrap();
    let database = uow.find::<Tag>(tag_db.borrow().id().unwrap()).unwrap();
    assert_eq!(java.borrow_mut().posts().unwrap().len(), 2);
    assert_eq!(database.borrow_mut().posts().unwrap().len(), 1);
    uow.commit();
}

#[test]
fn persist_only_tags_are_never_re_saved() {
    let db = Database::new();

    let tag = Tag::new("Java");
    db.save(&tag).unwrap();
    let tag_id = tag.borrow().id().unwrap();

    // A rename that is never saved must not leak through a post save.
    tag.borrow_mut().set_name("Jabba");

    let user = User::new("JohnDoe");
    let post = Post::new("On gardening");
    post.borrow_mut().set_user(&user);
    post.borrow_mut().add_tag(&tag);
    user.borrow_mut().add_post(&post);
    db.save(&user).unwrap();

    let stored = db.get::<Tag>(tag_id).unwrap();
    assert_eq!(stored.borrow().name(), "Java");
}

#[test]
fn detail_without_user_reference_is_rejected() {
    let db = Database::new();
    let detail = Detail::new("123 Baker Street");

    let err = db.save(&detail).unwrap_err();
    assert!(matches!(err, DbError::MissingReference { .. }));
    assert!(detail.borrow().id().is_none());
}

#[test]
fn post_without_user_reference_is_rejected() {
    let db = Database::new();
    let post = Post::new("On gardening");

    let err = db.save(&post).unwrap_err();
    assert!(matches!(err, DbError::MissingReference { .. }));
}

#[test]
fn second_detail_for_the_same_user_is_rejected() {
    let db = Database::new();

    let user = User::new("JohnDoe");
    let detail = Detail::new("123 Baker Street");
    user.borrow_mut().set_detail(&detail);
    detail.borrow_mut().set_user(&user);
    db.save(&user).unwrap();

    let rival = Detail::new("Elsewhere");
    rival.borrow_mut().set_user(&user);
    let err = db.save(&rival).unwrap_err();
    assert!(matches!(err, DbError::UniquenessViolation { .. }));
    assert!(rival.borrow().id().is_none());
}

#[test]
fn lazy_access_after_close_reports_detached_access() {
    let db = Database::new();
    let user = User::new("JohnDoe");
    let user_id = db.save(&user).unwrap();

    let uow = db.begin();
    let reloaded = uow.find::<User>(user_id).unwrap();
    uow.commit();

    let err = reloaded.borrow_mut().posts().unwrap_err();
    assert!(matches!(err, DbError::DetachedAccess { .. }));
}

#[test]
fn detached_lookup_exposes_scalars_but_not_associations() {
    let db = Database::new();

    let user = User::new("JohnDoe");
    let detail = Detail::new("123 Baker Street");
    user.borrow_mut().set_detail(&detail);
    detail.borrow_mut().set_user(&user);
    let user_id = db.save(&user).unwrap();

    let detached = db.get::<User>(user_id).unwrap();
    assert_eq!(detached.borrow().username(), "JohnDoe");
    let err = detached.borrow_mut().detail().unwrap_err();
    assert!(matches!(err, DbError::DetachedAccess { .. }));
}

#[test]
fn find_of_unknown_identifier_is_not_found() {
    let db = Database::new();
    let uow = db.begin();
    let err = uow.find::<User>(objdb::EntityId(404)).unwrap_err();
    assert!(matches!(err, DbError::NotFound { .. }));
    uow.rollback();
}

#[test]
fn snapshot_survives_a_full_graph() {
    let db = Database::new();

    let user = User::new("JohnDoe");
    let detail = Detail::new("123 Baker Street");
    user.borrow_mut().set_detail(&detail);
    detail.borrow_mut().set_user(&user);
    let post = Post::new("On gardening");
    post.borrow_mut().set_user(&user);
    post.borrow_mut().add_tag(&Tag::new("Java"));
    user.borrow_mut().add_post(&post);
    let user_id = db.save(&user).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    db.snapshot_to(&path).unwrap();

    let restored = Database::restore_from(&path).unwrap();
    let uow = restored.begin();
    let reloaded = uow.find::<User>(user_id).unwrap();
    let loaded_detail = reloaded.borrow_mut().detail().unwrap().unwrap();
    assert_eq!(loaded_detail.borrow().address(), "123 Baker Street");
    let posts = reloaded.borrow_mut().posts().unwrap();
    assert_eq!(posts.len(), 1);
    let tags = posts[0].borrow_mut().tags().unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].borrow().name(), "Java");
    uow.commit();
}
