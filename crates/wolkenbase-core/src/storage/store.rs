//! The block store: index, pool and cube locks behind one API.
//!
//! Every mutation resolves the terminal cube of its point, locks that cube
//! exclusively, re-checks that the cube is still terminal, and only then
//! touches the buffer. A full block is split under the same lock; its points
//! go to the splitting worker's staging channel and are re-inserted after the
//! lock is gone, so a split never re-enters itself.

use super::block_file::BlockFiles;
use super::buffer::BufferGuard;
use super::cube_lock::{CubeLockGuard, CubeLockManager};
use super::memory::{MemoryProbe, SystemMemory};
use super::pool::BufferPool;
use crate::constants::{BLOCK_SIZE, DEFAULT_DEAD_SLEEP_MS, LOW_RAM_DIVISOR, RECORDS_PER_BLOCK};
use crate::geometry::{Cube, Shape};
use crate::structures::Octree;
use crate::system::{Anomalies, StoreMetrics};
use crate::types::{Error, LasPoint, Result, StoreError, WorkerId, Xyz};
use crate::{log_debug, log_info, log_trace, log_warn};
use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Parameters fixed when a store is opened
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Directory of the block files
    pub dir: PathBuf,
    /// Number of block files
    pub files: usize,
    /// Buffer pool capacity
    pub buffer_capacity: usize,
    /// Point records per block
    pub records_per_block: usize,
    /// Bytes per block
    pub block_size: usize,
    /// Low-RAM threshold; `None` measures free memory at open
    pub low_ram_bytes: Option<u64>,
    /// Number of workers that will call the store
    pub workers: usize,
    /// Sleep after a failed cube lock
    pub dead_sleep: Duration,
}

impl StoreOptions {
    /// Defaults for `workers` workers storing under `dir`
    pub fn new(dir: impl Into<PathBuf>, workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            dir: dir.into(),
            files: workers + 1,
            buffer_capacity: 16 * workers,
            records_per_block: RECORDS_PER_BLOCK,
            block_size: BLOCK_SIZE,
            low_ram_bytes: None,
            workers,
            dead_sleep: Duration::from_millis(DEFAULT_DEAD_SLEEP_MS),
        }
    }
}

/// What a single put did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// Added to a block
    Stored,
    /// Replaced the point at the same location
    Replaced,
    /// The block was full and has been split; its points are staged
    Split,
    /// Outside the index, not stored
    OutOfBounds,
}

/// Points returned by a range query, with the buffers they came from
/// pinned until the selection is dropped
#[derive(Debug, Default)]
pub struct Selection {
    points: Vec<LasPoint>,
    claims: Vec<BufferGuard>,
}

impl Selection {
    /// The selected points
    pub fn points(&self) -> &[LasPoint] {
        &self.points
    }

    /// Blocks pinned by this selection
    pub fn blocks(&self) -> impl Iterator<Item = u64> + '_ {
        self.claims.iter().map(|g| g.block())
    }

    /// Release the buffers and keep the points
    pub fn into_points(self) -> Vec<LasPoint> {
        let Selection { points, claims } = self;
        drop(claims);
        points
    }
}

impl Deref for Selection {
    type Target = [LasPoint];

    fn deref(&self) -> &[LasPoint] {
        &self.points
    }
}

type Staging = (Sender<Vec<LasPoint>>, Receiver<Vec<LasPoint>>);

/// Out-of-core point store
pub struct BlockStore {
    root: Cube,
    index: RwLock<Octree>,
    generation: AtomicU64,
    pool: BufferPool,
    locks: CubeLockManager,
    next_block: AtomicU64,
    records: usize,
    staging: Vec<Staging>,
    metrics: Arc<StoreMetrics>,
    dead_sleep: Duration,
    #[cfg(test)]
    split_faults: std::sync::atomic::AtomicUsize,
}

impl BlockStore {
    /// Open a store over `root`, probing system memory
    pub fn open(root: Cube, options: StoreOptions) -> Result<Self> {
        Self::open_with_probe(root, options, Arc::new(SystemMemory::new()))
    }

    /// Open a store over `root` with an explicit memory probe
    pub fn open_with_probe(
        root: Cube,
        options: StoreOptions,
        probe: Arc<dyn MemoryProbe>,
    ) -> Result<Self> {
        if options.records_per_block == 0 {
            return Err(Error::config("records_per_block must be positive"));
        }
        let workers = options.workers.max(1);
        let files = BlockFiles::open(&options.dir, options.files, options.block_size)?;
        super::block_file::encode_block(&[], options.records_per_block, options.block_size)?;
        let metrics = Arc::new(StoreMetrics::new()?);
        let low_ram = options
            .low_ram_bytes
            .unwrap_or_else(|| probe.available_bytes() / LOW_RAM_DIVISOR);
        let pool = BufferPool::new(
            files,
            options.records_per_block,
            options.buffer_capacity,
            low_ram,
            probe,
            Arc::clone(&metrics),
        );
        log_info!(
            "opened block store at {:?}: {} files, {} buffers, {} records per block, low RAM at {} bytes",
            options.dir,
            options.files.max(1),
            options.buffer_capacity,
            options.records_per_block,
            low_ram
        );
        Ok(Self {
            root,
            index: RwLock::new(Octree::new(root)),
            generation: AtomicU64::new(0),
            pool,
            locks: CubeLockManager::new(workers),
            next_block: AtomicU64::new(0),
            records: options.records_per_block,
            staging: (0..workers).map(|_| unbounded()).collect(),
            metrics,
            dead_sleep: options.dead_sleep,
            #[cfg(test)]
            split_faults: std::sync::atomic::AtomicUsize::new(0),
        })
    }

    /// Extent of the store
    pub fn root(&self) -> Cube {
        self.root
    }

    /// Number of workers the store was opened for
    pub fn workers(&self) -> usize {
        self.staging.len()
    }

    /// Records per block
    pub fn records_per_block(&self) -> usize {
        self.records
    }

    /// Counters
    pub fn metrics(&self) -> &StoreMetrics {
        &self.metrics
    }

    /// Anomaly counts so far
    pub fn anomalies(&self) -> Anomalies {
        self.metrics.anomalies()
    }

    /// Count `n` points that lay outside their source's declared bounds
    pub fn record_outside_declared(&self, n: u64) {
        if n > 0 {
            self.metrics.outside_declared_points.inc_by(n);
        }
    }

    /// The buffer pool
    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// The cube lock table
    pub fn locks(&self) -> &CubeLockManager {
        &self.locks
    }

    /// Block numbers handed out so far
    pub fn block_count(&self) -> u64 {
        self.next_block.load(Ordering::SeqCst)
    }

    /// Run `f` with shared access to the index
    pub fn with_index<R>(&self, f: impl FnOnce(&Octree) -> R) -> R {
        f(&self.index.read())
    }

    fn check_worker(&self, worker: WorkerId) -> Result<()> {
        if worker >= self.staging.len() {
            return Err(StoreError::UnknownWorker(worker).into());
        }
        Ok(())
    }

    /// Fixed sleep after a failed cube lock
    fn sleep_dead(&self) {
        self.metrics.lock_retries.inc();
        std::thread::sleep(self.dead_sleep);
    }

    /// Lock the terminal cube of `location` and return it with its block
    fn lock_region(
        &self,
        worker: WorkerId,
        location: Xyz,
        exclusive: bool,
    ) -> (CubeLockGuard<'_>, Cube, Option<u64>) {
        loop {
            let cube = self.index.read().find_cube(location);
            let hold = if exclusive {
                self.locks.try_lock(worker, cube)
            } else {
                self.locks.try_read_lock(worker, cube)
            };
            let Some(hold) = hold else {
                log_trace!("worker {} waits for {:?}", worker, cube);
                self.sleep_dead();
                continue;
            };
            let (now, block) = self.index.read().locate(location);
            if now == cube {
                return (hold, cube, block);
            }
        }
    }

    fn missing(&self, location: Xyz) -> Error {
        self.metrics.missing_points.inc();
        log_warn!("no point at {:?}", location);
        StoreError::PointNotFound(location).into()
    }

    /// Store `point`, then re-insert anything its split displaced
    pub fn put(&self, point: LasPoint, worker: WorkerId) -> Result<PutOutcome> {
        let outcome = self.put_one(point, worker)?;
        self.drain_staging(worker)?;
        Ok(outcome)
    }

    /// Store `point` without draining the staging channel
    pub fn put_one(&self, point: LasPoint, worker: WorkerId) -> Result<PutOutcome> {
        self.check_worker(worker)?;
        let location = point.location;
        if !self.root.contains_point(location) {
            self.metrics.out_of_bounds_points.inc();
            log_warn!("point {:?} lies outside the store", location);
            return Ok(PutOutcome::OutOfBounds);
        }
        let (_hold, cube, block) = self.lock_region(worker, location, true);
        let block = match block {
            Some(b) => b,
            None => {
                let b = self.next_block.fetch_add(1, Ordering::SeqCst);
                self.index.write().set_block(location, b)?;
                log_trace!("block {} created for {:?}", b, cube);
                b
            }
        };

        let guard = self.pool.acquire(block, worker)?;
        let mut state = guard.write();
        if let Some(i) = state.position(location) {
            state.replace(i, point);
            self.metrics.duplicate_points.inc();
            log_warn!("duplicate point at {:?}", location);
            return Ok(PutOutcome::Replaced);
        }
        if state.len() < self.records {
            state.push(point);
            return Ok(PutOutcome::Stored);
        }

        // Refine the index before emptying the buffer, so a failed split
        // leaves the block as it was. The cube lock keeps the new octants
        // out of reach until the points are staged.
        drop(state);
        {
            let _span = tracing::debug_span!("split", worker, block).entered();
            self.split_index(location, &cube)?;
            self.generation.fetch_add(1, Ordering::SeqCst);
        }
        let mut displaced = guard.write().take_all();
        drop(guard);
        self.metrics.splits.inc();
        log_debug!("block {} split, {} points staged", block, displaced.len() + 1);
        displaced.push(point);
        self.staging[worker]
            .0
            .send(displaced)
            .map_err(|_| Error::internal("staging channel closed"))?;
        Ok(PutOutcome::Split)
    }

    /// Re-insert every point staged by `worker`'s splits, returning how many
    pub fn drain_staging(&self, worker: WorkerId) -> Result<usize> {
        self.check_worker(worker)?;
        let mut moved = 0;
        while let Ok(batch) = self.staging[worker].1.try_recv() {
            let mut rest = batch.into_iter();
            while let Some(p) = rest.next() {
                if let Err(e) = self.put_one(p, worker) {
                    let mut left = vec![p];
                    left.extend(rest);
                    log_warn!("re-insert failed, {} points stay staged: {}", left.len(), e);
                    self.staging[worker]
                        .0
                        .send(left)
                        .map_err(|_| Error::internal("staging channel closed"))?;
                    return Err(e);
                }
                moved += 1;
            }
        }
        Ok(moved)
    }

    fn split_index(&self, location: Xyz, cube: &Cube) -> Result<Cube> {
        #[cfg(test)]
        if self.split_faults.load(Ordering::SeqCst) > 0 {
            self.split_faults.fetch_sub(1, Ordering::SeqCst);
            return Err(crate::types::IndexError::Inconsistent(format!("split of {cube:?} refused")).into());
        }
        Ok(self.index.write().split_cube(location, cube)?)
    }

    /// Make the next `n` splits fail
    #[cfg(test)]
    pub(crate) fn fail_splits(&self, n: usize) {
        self.split_faults.store(n, Ordering::SeqCst);
    }

    /// Number of staged batches waiting for `worker`
    pub fn staged(&self, worker: WorkerId) -> usize {
        self.staging.get(worker).map_or(0, |(_, rx)| rx.len())
    }

    /// The point stored at `location`
    pub fn get(&self, location: Xyz, worker: WorkerId) -> Result<LasPoint> {
        self.check_worker(worker)?;
        if !self.root.contains_point(location) {
            return Err(self.missing(location));
        }
        let (_hold, _, block) = self.lock_region(worker, location, false);
        let Some(block) = block else {
            return Err(self.missing(location));
        };
        let guard = self.pool.acquire(block, worker)?;
        let state = guard.read();
        match state.position(location) {
            Some(i) => Ok(state.points()[i]),
            None => Err(self.missing(location)),
        }
    }

    /// Overwrite the stored point at `point.location`.
    ///
    /// Fails with [`StoreError::PointNotFound`] if there is none.
    pub fn replace(&self, point: LasPoint, worker: WorkerId) -> Result<()> {
        self.check_worker(worker)?;
        let location = point.location;
        if !self.root.contains_point(location) {
            return Err(self.missing(location));
        }
        let (_hold, _, block) = self.lock_region(worker, location, true);
        let Some(block) = block else {
            return Err(self.missing(location));
        };
        let guard = self.pool.acquire(block, worker)?;
        let mut state = guard.write();
        match state.position(location) {
            Some(i) => {
                state.replace(i, point);
                Ok(())
            }
            None => Err(self.missing(location)),
        }
    }

    /// Visit every block meeting `shape` under a shared lock.
    ///
    /// Returns `false` if a visited terminal turned out to have been split
    /// after the walk began; the caller starts over.
    fn scan_blocks<F>(&self, shape: &dyn Shape, worker: WorkerId, mut visit: F) -> Result<bool>
    where
        F: FnMut(BufferGuard, bool),
    {
        let generation = self.generation.load(Ordering::SeqCst);
        let terminals = self.index.read().find_terminals(shape);
        for (block, cube) in terminals {
            let _hold = loop {
                if let Some(h) = self.locks.try_read_lock(worker, cube) {
                    break h;
                }
                self.sleep_dead();
            };
            if self.generation.load(Ordering::SeqCst) != generation {
                let (now, b) = self.index.read().locate(cube.center());
                if now != cube || b != Some(block) {
                    log_trace!("index changed under query, restarting");
                    return Ok(false);
                }
            }
            let guard = self.pool.acquire(block, worker)?;
            visit(guard, shape.contains_cube(&cube));
        }
        Ok(true)
    }

    /// Points inside `shape`
    pub fn points_in(&self, shape: &dyn Shape, worker: WorkerId) -> Result<Selection> {
        self.check_worker(worker)?;
        loop {
            let mut sel = Selection::default();
            let done = self.scan_blocks(shape, worker, |guard, whole| {
                {
                    let state = guard.read();
                    if whole {
                        sel.points.extend_from_slice(state.points());
                    } else {
                        sel.points
                            .extend(state.points().iter().filter(|p| shape.contains(p.location)));
                    }
                }
                sel.claims.push(guard);
            })?;
            if done {
                return Ok(sel);
            }
        }
    }

    /// Number of points inside `shape`
    pub fn count_in(&self, shape: &dyn Shape, worker: WorkerId) -> Result<usize> {
        self.check_worker(worker)?;
        loop {
            let mut count = 0;
            let done = self.scan_blocks(shape, worker, |guard, whole| {
                let state = guard.read();
                count += if whole {
                    state.len()
                } else {
                    state.points().iter().filter(|p| shape.contains(p.location)).count()
                };
            })?;
            if done {
                return Ok(count);
            }
        }
    }

    /// Lowest and highest elevation inside `shape`, `None` if it is empty
    pub fn hi_lo_in(&self, shape: &dyn Shape, worker: WorkerId) -> Result<Option<(f64, f64)>> {
        self.check_worker(worker)?;
        loop {
            let mut range: Option<(f64, f64)> = None;
            let done = self.scan_blocks(shape, worker, |guard, whole| {
                let state = guard.read();
                for p in state.points() {
                    if whole || shape.contains(p.location) {
                        let z = p.location.z;
                        range = Some(match range {
                            Some((lo, hi)) => (lo.min(z), hi.max(z)),
                            None => (z, z),
                        });
                    }
                }
            })?;
            if done {
                return Ok(range);
            }
        }
    }

    /// Write every dirty buffer back
    pub fn flush(&self) -> Result<usize> {
        self.pool.flush()
    }

    /// Change the buffer pool capacity
    pub fn resize(&self, capacity: usize) -> Result<usize> {
        self.pool.resize(capacity)
    }
}

impl std::fmt::Debug for BlockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockStore")
            .field("root", &self.root)
            .field("blocks", &self.block_count())
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}
