//! Database query benchmarks for room operations
//!
//! Run with: cargo bench --bench room_queries

use criterion::{black_box, criterion_group, criterion_main, Criterion, BenchmarkId};
use synctv_core::{models::RoomId, repository::RoomRepository};
use std::time::Duration;

/// Benchmark: Get room by ID
fn bench_get_room_by_id(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("get_room_by_id", |b| {
        b.to_async(&rt).iter(|| {
            // TODO: Set up test database and repository
            // let repo = RoomRepository::new(...);
            // let room_id = RoomId("test_room".to_string());
            // async { repo.get_by_id(&room_id).await }
            async { std::future::ready::<(), ()>(()).await }
        })
    });
}

/// Benchmark: List rooms with pagination
fn bench_list_rooms_paginated(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let mut group = c.benchmark_group("list_rooms_paginated");
    group.measurement_time(Duration::from_secs(10));

    for page_size in [10, 50, 100].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(page_size), page_size, |b, &page_size| {
            b.to_async(&rt).iter(|| {
                // TODO: Set up test database and repository
                // let repo = RoomRepository::new(...);
                // async { repo.list(page_size, 0).await }
                async { std::future::ready::<(), ()>(()).await }
            });
        });
    }

    group.finish();
}

/// Benchmark: Search rooms by name
fn bench_search_rooms_by_name(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("search_rooms_by_name", |b| {
        b.to_async(&rt).iter(|| {
            // TODO: Set up test database and repository
            // let repo = RoomRepository::new(...);
            // async { repo.search_by_name("test", 10, 0).await }
            async { std::future::ready::<(), ()>(()).await }
        })
    });
}

/// Benchmark: Get room members
fn bench_get_room_members(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let mut group = c.benchmark_group("get_room_members");
    group.measurement_time(Duration::from_secs(10));

    for member_count in [1, 10, 50, 100].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(member_count), member_count, |b, &_member_count| {
            b.to_async(&rt).iter(|| {
                // TODO: Set up test database and repository
                // let repo = RoomRepository::new(...);
                // let room_id = RoomId("test_room".to_string());
                // async { repo.get_members(&room_id).await }
                async { std::future::ready::<(), ()>(()).await }
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_get_room_by_id,
    bench_list_rooms_paginated,
    bench_search_rooms_by_name,
    bench_get_room_members
);
criterion_main!(benches);
