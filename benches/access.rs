use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use atelier::access::{compose_curated_feed, resolve_post_access, GrantSet};
use atelier::content::{Page, PageKind, Post, PostStatus};
use chrono::{Duration, TimeZone, Utc};

fn gen_posts(n: usize) -> Vec<Post> {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (0..n)
        .map(|i| Post {
            id: format!("post-{}", i),
            slug: format!("post-{}", i),
            title: format!("Post {}", i),
            excerpt: String::new(),
            content: "body".to_string(),
            status: if i % 7 == 0 { PostStatus::Draft } else { PostStatus::Published },
            date: base + Duration::hours(i as i64),
            tags: vec![],
            pinned: false,
            is_listed: i % 11 != 0,
            is_protected: false,
            password: None,
            password_hint_link: None,
        })
        .collect()
}

fn gen_pages(n: usize, posts_per_page: usize) -> Vec<Page> {
    (0..n)
        .map(|i| Page {
            id: format!("page-{}", i),
            slug: format!("page-{}", i),
            title: format!("Page {}", i),
            content: String::new(),
            kind: PageKind::Page,
            external_url: None,
            in_sidebar: false,
            order: i as i64,
            is_system: false,
            post_ids: (0..posts_per_page).map(|j| format!("post-{}", i * posts_per_page + j)).collect(),
            is_protected: i % 3 == 0,
            password: Some("pw".to_string()),
            password_hint_link: None,
            last_updated: None,
        })
        .collect()
}

fn bench_access(c: &mut Criterion) {
    let mut group = c.benchmark_group("access");

    for &n_pages in &[50usize, 500usize] {
        let pages = gen_pages(n_pages, 10);
        let posts = gen_posts(n_pages * 10);
        // A post curated by the last protected page: worst case for the
        // parent search.
        let target = posts[posts.len() - 1].clone();
        let grants = GrantSet::new();

        group.bench_with_input(BenchmarkId::new("resolve_post", n_pages), &n_pages, |b, _| {
            b.iter(|| criterion::black_box(resolve_post_access(&target, &pages, &grants)));
        });
    }

    let posts = gen_posts(2_000);
    let mut page = gen_pages(1, 0).remove(0);
    page.post_ids = (0..200).map(|i| format!("post-{}", i * 7)).collect();
    group.bench_function("compose_curated_feed_200_of_2000", |b| {
        b.iter(|| criterion::black_box(compose_curated_feed(&page, &posts)));
    });

    group.finish();
}

criterion_group!(benches, bench_access);
criterion_main!(benches);
