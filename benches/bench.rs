// Criterion benchmarks for Geopoints

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use geopoints::core::{
    coordinate::{Coordinate, Location},
    distance::{calculate_bounding_box, haversine_km},
    planner::{filter_within_radius, ProximityPlanner},
};
use geopoints::models::{NewPoint, Point};
use geopoints::services::{MemoryStore, PointStore};
use uuid::Uuid;

/// Deterministic spread of points around New York
fn scatter(i: usize) -> (f64, f64) {
    let lat = 40.7128 + ((i * 37) % 200) as f64 * 0.005 - 0.5;
    let lon = -74.0060 + ((i * 91) % 200) as f64 * 0.005 - 0.5;
    (lat, lon)
}

fn create_point(id: usize) -> Point {
    let (lat, lon) = scatter(id);
    Point {
        id: id as i64,
        owner: Uuid::nil(),
        name: format!("Point {}", id),
        description: String::new(),
        location: Some(Location::from_coordinate(Coordinate::new(lat, lon).unwrap())),
        created_at: Utc::now(),
    }
}

fn bench_haversine_distance(c: &mut Criterion) {
    c.bench_function("haversine_km", |b| {
        b.iter(|| {
            haversine_km(
                black_box(40.7128),
                black_box(-74.0060),
                black_box(40.72),
                black_box(-74.01),
            )
        })
    });
}

fn bench_bounding_box(c: &mut Criterion) {
    c.bench_function("calculate_bounding_box", |b| {
        b.iter(|| calculate_bounding_box(black_box(40.7128), black_box(-74.0060), black_box(50.0)))
    });
}

fn bench_fallback_filter(c: &mut Criterion) {
    let center = Coordinate::new(40.7128, -74.0060).unwrap();
    let mut group = c.benchmark_group("fallback_filter");

    for size in [100, 1_000, 10_000] {
        let points: Vec<Point> = (0..size).map(create_point).collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &points, |b, points| {
            b.iter(|| filter_within_radius(black_box(points.clone()), &center, 10.0))
        });
    }

    group.finish();
}

fn bench_indexed_search(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let center = Coordinate::new(40.7128, -74.0060).unwrap();
    let planner = ProximityPlanner::default();
    let mut group = c.benchmark_group("memory_search");

    for (label, store) in [
        ("indexed", MemoryStore::with_spatial_index()),
        ("scan", MemoryStore::without_spatial_index()),
    ] {
        runtime.block_on(async {
            for i in 0..10_000 {
                let (lat, lon) = scatter(i);
                store
                    .create_point(NewPoint {
                        owner: Uuid::nil(),
                        name: format!("Point {}", i),
                        description: String::new(),
                        location: Some(Location::from_coordinate(Coordinate::new(lat, lon).unwrap())),
                    })
                    .await
                    .unwrap();
            }
        });

        group.bench_function(label, |b| {
            b.iter(|| {
                runtime
                    .block_on(planner.search_points(&store, &center, black_box(10.0)))
                    .unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_haversine_distance,
    bench_bounding_box,
    bench_fallback_filter,
    bench_indexed_search
);
criterion_main!(benches);
