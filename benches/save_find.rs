//! Criterion benchmarks for cascade saves and lazy reloads.

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use objdb::{Database, Detail, Post, Tag, User};

/// Builds a fully linked transient graph: one user, one detail, `posts` posts
/// sharing two tags.
fn build_graph(posts: usize) -> (objdb::SharedRef<User>, Vec<objdb::SharedRef<Post>>) {
    let user = User::new("bench");
    let detail = Detail::new("1 Bench Road");
    user.borrow_mut().set_detail(&detail);
    detail.borrow_mut().set_user(&user);

    let tag_a = Tag::new("alpha");
    let tag_b = Tag::new("beta");
    let mut built = Vec::with_capacity(posts);
    for i in 0..posts {
        let post = Post::new(format!("post {i}"));
        post.borrow_mut().set_user(&user);
        post.borrow_mut().add_tag(&tag_a);
        post.borrow_mut().add_tag(&tag_b);
        user.borrow_mut().add_post(&post);
        built.push(post);
    }
    (user, built)
}

fn benchmark_cascade_save(c: &mut Criterion) {
    c.bench_function("cascade_save_16_posts", |b| {
        b.iter(|| {
            let db = Database::new();
            let (user, _posts) = build_graph(16);
            black_box(db.save(&user).unwrap());
        });
    });
}

fn benchmark_idempotent_resave(c: &mut Criterion) {
    let db = Database::new();
    let (user, _posts) = build_graph(16);
    db.save(&user).unwrap();

    c.bench_function("resave_unchanged_graph", |b| {
        b.iter(|| {
            black_box(db.save(&user).unwrap());
        });
    });
}

fn benchmark_lazy_reload(c: &mut Criterion) {
    let db = Database::new();
    let (user, _posts) = build_graph(16);
    let user_id = db.save(&user).unwrap();

    c.bench_function("reload_user_and_posts", |b| {
        b.iter(|| {
            let uow = db.begin();
            let reloaded = uow.find::<User>(user_id).unwrap();
            let posts = reloaded.borrow_mut().posts().unwrap();
            black_box(posts.len());
            uow.commit();
        });
    });
}

criterion_group!(
    benches,
    benchmark_cascade_save,
    benchmark_idempotent_resave,
    benchmark_lazy_reload
);
criterion_main!(benches);
