use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use wolkenbase::scenes::street_scene;
use wolkenbase::{run_with_probe, Config};
use wolkenbase_core::storage::FixedMemory;

fn config(dir: &std::path::Path, workers: usize) -> Config {
    let mut config = Config::default();
    config.store.data_dir = dir.to_path_buf();
    config.store.low_ram_bytes = Some(1 << 20);
    config.scheduler.worker_threads = workers;
    config.traversal.spacing = 3.0;
    config
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("ingest_scan_flush");
    group.sample_size(10);
    let scene = street_scene(40.0, 8.0);
    group.throughput(Throughput::Elements(scene.remaining()));
    for &workers in &[1usize, 2, 4] {
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, &workers| {
            b.iter_batched(
                || tempfile::tempdir().unwrap(),
                |dir| {
                    let report = run_with_probe(
                        config(dir.path(), workers),
                        street_scene(40.0, 8.0),
                        Arc::new(FixedMemory::new(1 << 34)),
                    )
                    .unwrap();
                    black_box(report.tiles)
                },
                BatchSize::PerIteration,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
