use super::*;
use crate::geometry::{Cube, Cylinder, Sphere};
use crate::system::StoreMetrics;
use crate::types::{Error, LasPoint, StoreError, Xy, Xyz};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const MB: u64 = 1 << 20;

fn plenty() -> Arc<FixedMemory> {
    Arc::new(FixedMemory::new(u64::MAX / 2))
}

fn test_pool(dir: &Path, capacity: usize, probe: Arc<FixedMemory>) -> (BufferPool, Arc<StoreMetrics>) {
    let files = BlockFiles::open(dir, 2, 4096).unwrap();
    let metrics = Arc::new(StoreMetrics::new().unwrap());
    let pool = BufferPool::new(files, 16, capacity, MB, probe, Arc::clone(&metrics));
    (pool, metrics)
}

fn test_store(dir: &Path, workers: usize, records: usize, capacity: usize) -> BlockStore {
    let mut options = StoreOptions::new(dir, workers);
    options.records_per_block = records;
    options.buffer_capacity = capacity;
    options.low_ram_bytes = Some(MB);
    options.dead_sleep = Duration::from_millis(1);
    BlockStore::open_with_probe(Cube::new(Xyz::default(), 64.0), options, plenty()).unwrap()
}

fn pt(x: f64, y: f64, z: f64) -> LasPoint {
    LasPoint::at(Xyz::new(x, y, z))
}

fn random_points(n: usize, seed: u64) -> Vec<LasPoint> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let mut p = pt(
                rng.random_range(-31.0..31.0),
                rng.random_range(-31.0..31.0),
                rng.random_range(-31.0..31.0),
            );
            p.intensity = (i % 65536) as u16;
            p.gps_time = i as f64;
            p
        })
        .collect()
}

#[test]
fn block_files_follow_fan_out() {
    let dir = tempfile::tempdir().unwrap();
    let files = BlockFiles::open(dir.path(), 3, 4096).unwrap();
    assert_eq!(files.location(7), (1, 2 * 4096));
    assert_eq!(files.location(2), (2, 0));
    for i in 0..3 {
        assert!(dir.path().join(format!("blocks-{i}.dat")).exists());
    }

    assert_eq!(files.read_block(7).unwrap(), None);
    let image = vec![0xAB; 4096];
    files.write_block(7, &image).unwrap();
    assert!(files.is_written(7));
    assert_eq!(files.read_block(7).unwrap(), Some(image));
    let len = std::fs::metadata(dir.path().join("blocks-1.dat")).unwrap().len();
    assert_eq!(len, 3 * 4096);
}

#[test]
fn block_codec_pads_with_empty_records() {
    let points: Vec<_> = (0..5).map(|i| pt(i as f64, 0.5, -1.0)).collect();
    let bytes = encode_block(&points, 10, 1024).unwrap();
    assert_eq!(bytes.len(), 1024);
    assert!(bytes[870..].iter().all(|b| *b == 0));
    assert_eq!(decode_block(&bytes, 10).unwrap(), points);

    let err = encode_block(&points, 20, 1024).unwrap_err();
    assert!(matches!(err, Error::Store(StoreError::RecordTooLarge { records: 20, .. })));
}

#[test]
fn pressure_levels() {
    assert_eq!(Pressure::classify(2 * MB, MB), Pressure::Plenty);
    assert_eq!(Pressure::classify(MB, MB), Pressure::Moderate);
    assert_eq!(Pressure::classify(MB / 2 + 1, MB), Pressure::Moderate);
    assert_eq!(Pressure::classify(MB / 2, MB), Pressure::Low);
}

#[test]
fn evicted_blocks_come_back_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let (pool, metrics) = test_pool(dir.path(), 2, plenty());
    {
        let g = pool.acquire(0, 0).unwrap();
        g.write().push(pt(1.0, 2.0, 3.0));
    }
    drop(pool.acquire(1, 0).unwrap());
    drop(pool.acquire(2, 0).unwrap());
    assert_eq!(pool.resident(), 2);
    assert!(!pool.is_resident(0));
    assert!(metrics.evictions.get() >= 1);
    assert_eq!(metrics.disk_writes.get(), 1);

    let g = pool.acquire(0, 0).unwrap();
    assert_eq!(g.read().points(), &[pt(1.0, 2.0, 3.0)]);
    assert!(!g.read().is_dirty());
    assert_eq!(metrics.disk_reads.get(), 1);
    assert_eq!(metrics.cache_misses.get(), 4);
    drop(g);
    drop(pool.acquire(0, 1).unwrap());
    assert_eq!(metrics.cache_hits.get(), 1);
}

#[test]
fn owned_buffers_are_never_victims() {
    let dir = tempfile::tempdir().unwrap();
    let (pool, _) = test_pool(dir.path(), 1, plenty());
    let held = pool.acquire(0, 0).unwrap();
    held.write().push(pt(0.0, 0.0, 0.0));
    let other = pool.acquire(1, 1).unwrap();
    assert_eq!(pool.resident(), 2);
    assert_eq!(held.read().block, Some(0));
    assert_eq!(held.read().len(), 1);
    drop(other);

    let buf = buffer::Buffer::default();
    assert!(buf.try_own(3));
    assert!(!buf.try_claim());
    buf.disown(3);
    assert!(buf.try_claim());
    assert!(!buf.try_claim());
    assert!(!buf.try_own(3));
    buf.finish_claim(3);
    assert_eq!(buf.owner_count(), 1);
    assert!(!buf.in_transit());
}

#[test]
fn low_memory_forces_reuse() {
    let dir = tempfile::tempdir().unwrap();
    let probe = Arc::new(FixedMemory::new(0));
    let (pool, metrics) = test_pool(dir.path(), 8, Arc::clone(&probe));
    assert_eq!(pool.pressure(), Pressure::Low);
    drop(pool.acquire(0, 0).unwrap());
    drop(pool.acquire(1, 0).unwrap());
    drop(pool.acquire(2, 0).unwrap());
    assert_eq!(pool.resident(), 1);
    assert_eq!(metrics.evictions.get(), 2);

    probe.set(700 * 1024);
    assert_eq!(pool.pressure(), Pressure::Moderate);
    drop(pool.acquire(3, 0).unwrap());
    assert_eq!(pool.resident(), 2);
}

#[test]
fn resize_retires_only_unowned_buffers() {
    let dir = tempfile::tempdir().unwrap();
    let (pool, _) = test_pool(dir.path(), 8, plenty());
    for b in 0..4u64 {
        let g = pool.acquire(b, 0).unwrap();
        g.write().push(pt(b as f64, 0.0, 0.0));
    }
    let pinned = pool.acquire(3, 1).unwrap();
    assert_eq!(pool.resident(), 4);
    assert_eq!(pool.resize(0).unwrap(), 1);
    assert!(pool.is_resident(3));
    assert_eq!(pinned.read().len(), 1);
    drop(pinned);
    assert_eq!(pool.resize(0).unwrap(), 0);

    pool.resize(8).unwrap();
    for b in 0..4u64 {
        let g = pool.acquire(b, 0).unwrap();
        assert_eq!(g.read().points(), &[pt(b as f64, 0.0, 0.0)]);
    }
}

#[test]
fn flush_writes_only_dirty_buffers() {
    let dir = tempfile::tempdir().unwrap();
    let (pool, metrics) = test_pool(dir.path(), 8, plenty());
    pool.acquire(0, 0).unwrap().write().push(pt(1.0, 1.0, 1.0));
    drop(pool.acquire(1, 0).unwrap());
    assert_eq!(pool.flush().unwrap(), 1);
    assert_eq!(pool.flush().unwrap(), 0);
    assert_eq!(metrics.disk_writes.get(), 1);
    assert!(pool.files().is_written(0));
    assert!(!pool.files().is_written(1));
}

#[test]
fn cube_lock_rules() {
    let locks = CubeLockManager::new(3);
    let a = Cube::new(Xyz::new(0.0, 0.0, 0.0), 2.0);
    let inside = Cube::new(Xyz::new(0.5, 0.5, 0.5), 1.0);
    let beside = Cube::new(Xyz::new(2.0, 0.0, 0.0), 2.0);

    assert!(locks.read_lock(0, a));
    assert!(locks.read_lock(1, inside));
    assert!(!locks.lock(2, inside));
    assert!(locks.lock(2, beside));
    assert!(!locks.read_lock(0, Cube::new(Xyz::new(1.5, 0.0, 0.0), 1.0)));
    assert_eq!(locks.held(0), Some((a, false)));
    locks.unlock(1);
    locks.unlock(0);
    assert!(locks.lock(0, inside));
    assert!(!locks.read_lock(1, a));
    assert!(locks.lock(0, a));
    assert_eq!(locks.held(0), Some((a, true)));
    assert!(!locks.lock(5, a));
    {
        let _g = locks.try_read_lock(1, Cube::new(Xyz::new(10.0, 0.0, 0.0), 1.0)).unwrap();
        assert!(locks.held(1).is_some());
    }
    assert!(locks.held(1).is_none());
}

fn lock_cube() -> impl Strategy<Value = Cube> {
    (-4i32..4, -4i32..4, -4i32..4, 0u32..3).prop_map(|(x, y, z, k)| {
        let side = f64::from(1u32 << k);
        Cube::new(Xyz::new(f64::from(x), f64::from(y), f64::from(z)), side)
    })
}

proptest! {
    #[test]
    fn overlapping_exclusive_holds_never_coexist(
        attempts in prop::collection::vec((0usize..4, lock_cube(), any::<bool>(), any::<bool>()), 1..60)
    ) {
        let locks = CubeLockManager::new(4);
        for (worker, cube, exclusive, release) in attempts {
            if release {
                locks.unlock(worker);
                continue;
            }
            if exclusive { locks.lock(worker, cube); } else { locks.read_lock(worker, cube); }
            let holds: Vec<_> = (0..4).filter_map(|w| locks.held(w)).collect();
            for (i, (c1, x1)) in holds.iter().enumerate() {
                for (c2, x2) in &holds[i + 1..] {
                    prop_assert!(!(c1.overlaps(c2) && (*x1 || *x2)));
                }
            }
        }
    }
}

#[test]
fn put_get_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = test_store(dir.path(), 1, 32, 8);
    let points = random_points(500, 1);
    for p in &points {
        store.put(*p, 0).unwrap();
    }
    for p in points.iter().step_by(7) {
        assert_eq!(store.get(p.location, 0).unwrap(), *p);
    }
    assert!(store.metrics().splits.get() > 0);
    assert_eq!(store.staged(0), 0);
}

#[test]
fn ten_thousand_points_one_block_per_terminal() {
    let dir = tempfile::tempdir().unwrap();
    let store = test_store(dir.path(), 1, 537, 16);
    for p in random_points(10_000, 42) {
        assert_ne!(store.put(p, 0).unwrap(), PutOutcome::OutOfBounds);
    }
    let blocks: Vec<u64> =
        store.with_index(|ix| ix.terminals().into_iter().filter_map(|(_, b)| b).collect());
    let unique: HashSet<u64> = blocks.iter().copied().collect();
    assert_eq!(unique.len(), blocks.len());
    assert_eq!(store.count_in(&store.root(), 0).unwrap(), 10_000);
    assert_eq!(store.anomalies().total(), 0);
}

#[test]
fn split_preserves_block_contents() {
    let dir = tempfile::tempdir().unwrap();
    let store = test_store(dir.path(), 1, 8, 16);
    let points: Vec<_> = (0..9).map(|i| pt(1.0 + i as f64 * 3.0, 2.0 + i as f64 * 0.5, 5.0)).collect();
    let cube = store.with_index(|ix| ix.find_cube(points[0].location));
    for (i, p) in points.iter().enumerate() {
        let outcome = store.put(*p, 0).unwrap();
        assert_eq!(outcome == PutOutcome::Split, i == 8);
    }
    assert_eq!(store.metrics().splits.get(), 1);
    let sel = store.points_in(&cube, 0).unwrap();
    let got: HashSet<_> = sel.iter().map(|p| p.gps_time.to_bits() ^ p.location.x.to_bits()).collect();
    let want: HashSet<_> = points.iter().map(|p| p.gps_time.to_bits() ^ p.location.x.to_bits()).collect();
    assert_eq!(sel.len(), 9);
    assert_eq!(got, want);
}

#[test]
fn failed_split_keeps_the_block() {
    let dir = tempfile::tempdir().unwrap();
    let store = test_store(dir.path(), 1, 4, 16);
    let points: Vec<_> = (0..5).map(|i| pt(2.0 + i as f64 * 4.0, 3.0, 3.0)).collect();
    for p in &points[..4] {
        assert_eq!(store.put(*p, 0).unwrap(), PutOutcome::Stored);
    }

    store.fail_splits(1);
    assert!(matches!(store.put(points[4], 0), Err(Error::Index(_))));
    assert_eq!(store.metrics().splits.get(), 0);
    assert_eq!(store.count_in(&store.root(), 0).unwrap(), 4);
    for p in &points[..4] {
        assert_eq!(store.get(p.location, 0).unwrap(), *p);
    }

    assert_eq!(store.put(points[4], 0).unwrap(), PutOutcome::Split);
    assert_eq!(store.count_in(&store.root(), 0).unwrap(), 5);
}

#[cfg(unix)]
#[test]
fn failed_reinsert_stays_staged() {
    if !Path::new("/dev/full").exists() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    // Every block write fails with ENOSPC
    for i in 0..2 {
        std::os::unix::fs::symlink("/dev/full", dir.path().join(format!("blocks-{i}.dat"))).unwrap();
    }
    let store = test_store(dir.path(), 1, 4, 2);

    // One point per octant of the first terminal, the last one overflowing it
    let points = [
        pt(10.0, 10.0, 10.0),
        pt(22.0, 10.0, 10.0),
        pt(10.0, 22.0, 10.0),
        pt(22.0, 22.0, 10.0),
        pt(10.0, 10.0, 22.0),
    ];
    for p in &points[..4] {
        assert_eq!(store.put(*p, 0).unwrap(), PutOutcome::Stored);
    }
    assert_eq!(store.staged(0), 0);

    // Re-inserting the second displaced point evicts a dirty buffer
    let err = store.put(points[4], 0).unwrap_err();
    assert!(matches!(err, Error::Store(StoreError::BlockIo { .. })));
    assert_eq!(store.staged(0), 1);
    assert_eq!(store.metrics().splits.get(), 1);
}

#[test]
fn duplicates_and_misses_are_counted() {
    let dir = tempfile::tempdir().unwrap();
    let store = test_store(dir.path(), 2, 16, 8);
    let mut p = pt(3.0, 3.0, 3.0);
    assert_eq!(store.put(p, 0).unwrap(), PutOutcome::Stored);
    p.classification = 2;
    assert_eq!(store.put(p, 1).unwrap(), PutOutcome::Replaced);
    assert_eq!(store.get(p.location, 0).unwrap().classification, 2);

    p.classification = 6;
    store.replace(p, 1).unwrap();
    assert_eq!(store.get(p.location, 1).unwrap().classification, 6);

    let err = store.replace(pt(3.0, 3.0, 3.5), 0).unwrap_err();
    assert!(err.is_anomaly());
    assert!(store.get(pt(-20.0, 1.0, 1.0).location, 0).is_err());

    assert_eq!(store.put(pt(100.0, 0.0, 0.0), 0).unwrap(), PutOutcome::OutOfBounds);
    let a = store.anomalies();
    assert_eq!((a.duplicate_points, a.missing_points, a.out_of_bounds_points), (1, 2, 1));
    assert_eq!(store.count_in(&store.root(), 0).unwrap(), 1);

    assert!(matches!(
        store.put(p, 2),
        Err(Error::Store(StoreError::UnknownWorker(2)))
    ));
}

#[test]
fn shape_queries_filter_points() {
    let dir = tempfile::tempdir().unwrap();
    let store = test_store(dir.path(), 1, 16, 8);
    for i in 0..10 {
        for j in 0..10 {
            store.put(pt(i as f64, j as f64, (i + j) as f64 * 0.1), 0).unwrap();
        }
    }
    let column = Cylinder::new(Xy::new(0.0, 0.0), 2.5);
    let inside = store.points_in(&column, 0).unwrap();
    assert_eq!(inside.len(), 8);
    assert!(inside.iter().all(|p| p.location.xy().length() <= 2.5));
    assert_eq!(store.count_in(&column, 0).unwrap(), 8);
    let (lo, hi) = store.hi_lo_in(&column, 0).unwrap().unwrap();
    assert!((lo - 0.0).abs() < 1e-12);
    assert!((hi - 0.3).abs() < 1e-12);
    assert_eq!(store.hi_lo_in(&Sphere::new(Xyz::new(-20.0, -20.0, -20.0), 1.0), 0).unwrap(), None);
}

#[test]
fn selections_pin_their_buffers() {
    let dir = tempfile::tempdir().unwrap();
    let store = test_store(dir.path(), 1, 4, 64);
    for p in random_points(200, 9) {
        store.put(p, 0).unwrap();
    }
    let sel = store.points_in(&store.root(), 0).unwrap();
    let pinned = sel.blocks().count();
    assert!(pinned > 1);
    assert_eq!(store.resize(0).unwrap(), pinned);
    let points = sel.into_points();
    assert_eq!(points.len(), 200);
    assert_eq!(store.resize(0).unwrap(), 0);
    store.resize(64).unwrap();
    assert_eq!(store.count_in(&store.root(), 0).unwrap(), 200);
}

#[test]
fn concurrent_puts_survive_shrinking_pool() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(test_store(dir.path(), 4, 24, 32));
    let batches: Vec<Vec<LasPoint>> = (0..4).map(|w| random_points(1500, 100 + w)).collect();
    let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let resizer = {
        let store = Arc::clone(&store);
        let stop = Arc::clone(&stop);
        std::thread::spawn(move || {
            let mut rng = StdRng::seed_from_u64(5);
            while !stop.load(std::sync::atomic::Ordering::SeqCst) {
                store.resize(rng.random_range(4..40)).unwrap();
                std::thread::sleep(Duration::from_micros(200));
            }
        })
    };
    let workers: Vec<_> = batches
        .iter()
        .cloned()
        .enumerate()
        .map(|(w, batch)| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for (i, p) in batch.iter().enumerate() {
                    store.put(*p, w).unwrap();
                    if i % 50 == 0 {
                        let probe = Sphere::new(batch[i / 2].location, 2.0);
                        store.count_in(&probe, w).unwrap();
                    }
                }
            })
        })
        .collect();
    for h in workers {
        h.join().unwrap();
    }
    stop.store(true, std::sync::atomic::Ordering::SeqCst);
    resizer.join().unwrap();

    store.resize(32).unwrap();
    assert_eq!(store.count_in(&store.root(), 0).unwrap(), 6000);
    for batch in &batches {
        for p in batch.iter().step_by(13) {
            assert_eq!(store.get(p.location, 0).unwrap(), *p);
        }
    }
}
