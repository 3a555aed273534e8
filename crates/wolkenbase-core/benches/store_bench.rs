use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use wolkenbase_core::geometry::{Cube, Cylinder, Sphere};
use wolkenbase_core::storage::{BlockStore, FixedMemory, StoreOptions};
use wolkenbase_core::{LasPoint, Xy, Xyz};

const SIDE: f64 = 256.0;

fn points(n: usize, seed: u64) -> Vec<LasPoint> {
    let mut rng = StdRng::seed_from_u64(seed);
    let h = SIDE / 2.0 - 1.0;
    (0..n)
        .map(|_| {
            LasPoint::at(Xyz::new(
                rng.random_range(-h..h),
                rng.random_range(-h..h),
                rng.random_range(-4.0..4.0),
            ))
        })
        .collect()
}

fn open(dir: &std::path::Path, capacity: usize) -> BlockStore {
    let mut options = StoreOptions::new(dir, 1);
    options.buffer_capacity = capacity;
    options.low_ram_bytes = Some(1 << 20);
    options.dead_sleep = Duration::from_millis(1);
    BlockStore::open_with_probe(
        Cube::new(Xyz::new(0.0, 0.0, 0.0), SIDE),
        options,
        Arc::new(FixedMemory::new(1 << 34)),
    )
    .unwrap()
}

fn bench_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_put");
    group.sample_size(10);
    for &n in &[10_000usize, 50_000] {
        let pts = points(n, 7);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &pts, |b, pts| {
            b.iter_batched(
                || {
                    let dir = tempfile::tempdir().unwrap();
                    let store = open(dir.path(), 64);
                    (dir, store)
                },
                |(_dir, store)| {
                    for p in pts {
                        store.put(*p, 0).unwrap();
                    }
                    black_box(store.block_count())
                },
                BatchSize::PerIteration,
            );
        });
    }
    group.finish();
}

fn bench_queries(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let store = open(dir.path(), 256);
    for p in points(100_000, 11) {
        store.put(p, 0).unwrap();
    }

    let mut group = c.benchmark_group("store_query");
    for &r in &[2.0f64, 8.0, 32.0] {
        group.bench_with_input(BenchmarkId::new("count_in_cylinder", r), &r, |b, &r| {
            let cyl = Cylinder::new(Xy::new(10.0, -20.0), r);
            b.iter(|| black_box(store.count_in(&cyl, 0).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("points_in_sphere", r), &r, |b, &r| {
            let sphere = Sphere::new(Xyz::new(-30.0, 15.0, 0.0), r);
            b.iter(|| black_box(store.points_in(&sphere, 0).unwrap().len()));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_put, bench_queries);
criterion_main!(benches);
