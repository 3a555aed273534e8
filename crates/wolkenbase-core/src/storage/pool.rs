//! Bounded pool of block buffers.
//!
//! Bookkeeping lives in three maps, each behind its own short-held mutex:
//! block to buffer, the LRU index keyed by a logical clock, and the list of
//! retired slots. Lock order is `block_map` or `lru` before a buffer's owner
//! list; none of them is held across I/O.
//!
//! A buffer is reassigned only after [`Buffer::try_claim`] succeeds, which
//! requires no owners and sets the in-transit flag. Lookups of a block whose
//! buffer is in transit wait until the transit ends.

use super::block_file::{decode_block, encode_block, BlockFiles};
use super::buffer::{Buffer, BufferGuard};
use super::memory::{MemoryProbe, Pressure};
use crate::system::StoreMetrics;
use crate::types::{Result, WorkerId};
use crate::{log_debug, log_trace};
use ahash::AHashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Paged cache of disk blocks
pub struct BufferPool {
    files: BlockFiles,
    records: usize,
    buffers: RwLock<Vec<Arc<Buffer>>>,
    block_map: Mutex<AHashMap<u64, usize>>,
    lru: Mutex<BTreeMap<u64, usize>>,
    retired: Mutex<Vec<usize>>,
    clock: AtomicU64,
    capacity: AtomicUsize,
    resident: AtomicUsize,
    low_ram: u64,
    probe: Arc<dyn MemoryProbe>,
    metrics: Arc<StoreMetrics>,
}

impl BufferPool {
    /// Create an empty pool over `files`
    pub fn new(
        files: BlockFiles,
        records: usize,
        capacity: usize,
        low_ram: u64,
        probe: Arc<dyn MemoryProbe>,
        metrics: Arc<StoreMetrics>,
    ) -> Self {
        Self {
            files,
            records,
            buffers: RwLock::new(Vec::new()),
            block_map: Mutex::new(AHashMap::new()),
            lru: Mutex::new(BTreeMap::new()),
            retired: Mutex::new(Vec::new()),
            clock: AtomicU64::new(0),
            capacity: AtomicUsize::new(capacity),
            resident: AtomicUsize::new(0),
            low_ram,
            probe,
            metrics,
        }
    }

    /// Target number of resident buffers
    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::SeqCst)
    }

    /// Buffers currently allocated
    pub fn resident(&self) -> usize {
        self.resident.load(Ordering::SeqCst)
    }

    /// Low-RAM threshold in bytes
    pub fn low_ram_threshold(&self) -> u64 {
        self.low_ram
    }

    /// Current memory pressure
    pub fn pressure(&self) -> Pressure {
        Pressure::classify(self.probe.available_bytes(), self.low_ram)
    }

    /// Records per block
    pub fn records_per_block(&self) -> usize {
        self.records
    }

    /// Backing files
    pub fn files(&self) -> &BlockFiles {
        &self.files
    }

    /// True if a buffer currently holds `block`
    pub fn is_resident(&self, block: u64) -> bool {
        self.block_map.lock().contains_key(&block)
    }

    fn buffer(&self, idx: usize) -> Arc<Buffer> {
        Arc::clone(&self.buffers.read()[idx])
    }

    /// Own the buffer holding `block`, paging it in if needed.
    ///
    /// Blocks never written come back empty without touching disk.
    pub fn acquire(&self, block: u64, worker: WorkerId) -> Result<BufferGuard> {
        loop {
            {
                let map = self.block_map.lock();
                if let Some(&idx) = map.get(&block) {
                    let buf = self.buffer(idx);
                    if buf.try_own(worker) {
                        drop(map);
                        self.touch(idx, &buf);
                        self.metrics.cache_hits.inc();
                        return Ok(BufferGuard::new(buf, block, worker));
                    }
                    drop(map);
                    std::thread::yield_now();
                    continue;
                }
            }

            let Some(idx) = self.obtain_slot() else {
                std::thread::yield_now();
                continue;
            };
            let buf = self.buffer(idx);
            {
                let mut map = self.block_map.lock();
                if map.contains_key(&block) {
                    drop(map);
                    buf.release_claim();
                    self.touch(idx, &buf);
                    continue;
                }
                map.insert(block, idx);
            }
            self.metrics.cache_misses.inc();

            if let Err(e) = self.load_into(idx, &buf, block, worker) {
                self.block_map.lock().remove(&block);
                buf.release_claim();
                self.touch(idx, &buf);
                return Err(e);
            }
            buf.finish_claim(worker);
            self.touch(idx, &buf);
            return Ok(BufferGuard::new(buf, block, worker));
        }
    }

    /// Write back the claimed buffer's old block and read `block` into it
    fn load_into(&self, idx: usize, buf: &Buffer, block: u64, worker: WorkerId) -> Result<()> {
        let mut state = buf.write();
        if let Some(old) = state.block {
            if state.is_dirty() {
                let _span = tracing::debug_span!("block_write", worker, block = old).entered();
                let bytes = encode_block(state.points(), self.records, self.files.block_size())?;
                self.files.write_block(old, &bytes)?;
                self.metrics.disk_writes.inc();
                state.mark_clean();
            }
            self.unmap(old, idx);
            self.metrics.evictions.inc();
            log_trace!("buffer {} evicts block {} for block {}", idx, old, block);
        }
        let points = {
            let _span = tracing::debug_span!("block_read", worker, block).entered();
            match self.files.read_block(block) {
                Ok(Some(bytes)) => {
                    self.metrics.disk_reads.inc();
                    decode_block(&bytes, self.records)
                }
                Ok(None) => Ok(Vec::with_capacity(self.records)),
                Err(e) => Err(e),
            }
        };
        match points {
            Ok(points) => {
                state.load(block, points);
                Ok(())
            }
            Err(e) => {
                state.reset();
                Err(e)
            }
        }
    }

    fn unmap(&self, block: u64, idx: usize) {
        let mut map = self.block_map.lock();
        if map.get(&block) == Some(&idx) {
            map.remove(&block);
        }
    }

    /// A claimed buffer slot for a miss, or `None` if the caller must retry
    fn obtain_slot(&self) -> Option<usize> {
        let below_capacity = self.resident() < self.capacity();
        match self.pressure() {
            Pressure::Plenty => {
                if below_capacity {
                    Some(self.allocate())
                } else {
                    Some(self.claim_victim().unwrap_or_else(|| self.allocate()))
                }
            }
            Pressure::Moderate => {
                if below_capacity {
                    Some(self.allocate())
                } else {
                    self.claim_victim()
                }
            }
            Pressure::Low => {
                if self.resident() == 0 {
                    return Some(self.allocate());
                }
                self.claim_victim()
            }
        }
    }

    /// A new claimed buffer, reusing a retired slot if there is one
    fn allocate(&self) -> usize {
        let reuse = self.retired.lock().pop();
        let idx = match reuse {
            Some(idx) => {
                let fresh = Arc::new(Buffer::claimed());
                self.buffers.write()[idx] = fresh;
                idx
            }
            None => {
                let mut buffers = self.buffers.write();
                buffers.push(Arc::new(Buffer::claimed()));
                buffers.len() - 1
            }
        };
        let n = self.resident.fetch_add(1, Ordering::SeqCst) + 1;
        self.metrics.resident_buffers.set(n as i64);
        idx
    }

    /// Claim the least recently used unowned buffer that is not in transit
    fn claim_victim(&self) -> Option<usize> {
        let mut lru = self.lru.lock();
        let buffers = self.buffers.read();
        let (stamp, idx) = lru
            .iter()
            .map(|(s, i)| (*s, *i))
            .find(|(_, i)| buffers[*i].try_claim())?;
        lru.remove(&stamp);
        Some(idx)
    }

    fn touch(&self, idx: usize, buf: &Buffer) {
        let mut lru = self.lru.lock();
        let stamp = self.clock.fetch_add(1, Ordering::SeqCst);
        let old = buf.last_used.swap(stamp, Ordering::SeqCst);
        if lru.get(&old) == Some(&idx) {
            lru.remove(&old);
        }
        lru.insert(stamp, idx);
    }

    /// Write every dirty buffer back to disk, returning how many were written
    pub fn flush(&self) -> Result<usize> {
        let buffers: Vec<Arc<Buffer>> = self.buffers.read().clone();
        let mut written = 0;
        for buf in buffers {
            let mut state = buf.write();
            let Some(block) = state.block else { continue };
            if !state.is_dirty() {
                continue;
            }
            let _span = tracing::debug_span!("block_write", block).entered();
            let bytes = encode_block(state.points(), self.records, self.files.block_size())?;
            self.files.write_block(block, &bytes)?;
            self.metrics.disk_writes.inc();
            state.mark_clean();
            written += 1;
        }
        log_debug!("flushed {} buffers", written);
        Ok(written)
    }

    /// Change the capacity, retiring unowned buffers above it.
    ///
    /// Owned or in-transit buffers are never retired, so the pool can stay
    /// above a lowered capacity until their owners let go. Returns the number
    /// of resident buffers afterwards.
    pub fn resize(&self, capacity: usize) -> Result<usize> {
        self.capacity.store(capacity, Ordering::SeqCst);
        while self.resident() > capacity {
            let Some(idx) = self.claim_victim() else { break };
            let buf = self.buffer(idx);
            {
                let mut state = buf.write();
                if let Some(block) = state.block {
                    if state.is_dirty() {
                        let bytes =
                            encode_block(state.points(), self.records, self.files.block_size())?;
                        if let Err(e) = self.files.write_block(block, &bytes) {
                            drop(state);
                            buf.release_claim();
                            self.touch(idx, &buf);
                            return Err(e);
                        }
                        self.metrics.disk_writes.inc();
                    }
                    self.unmap(block, idx);
                }
                state.reset();
            }
            buf.release_claim();
            self.retired.lock().push(idx);
            let n = self.resident.fetch_sub(1, Ordering::SeqCst) - 1;
            self.metrics.resident_buffers.set(n as i64);
        }
        log_debug!("pool resized to {} ({} resident)", capacity, self.resident());
        Ok(self.resident())
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("capacity", &self.capacity())
            .field("resident", &self.resident())
            .field("records", &self.records)
            .field("low_ram", &self.low_ram)
            .finish_non_exhaustive()
    }
}
