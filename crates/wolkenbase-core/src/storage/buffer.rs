//! Buffers and ownership handles

use crate::types::{LasPoint, WorkerId, Xyz};
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Contents of a buffer
#[derive(Debug, Default)]
pub struct BufferState {
    /// Block held, if any
    pub block: Option<u64>,
    points: Vec<LasPoint>,
    dirty: bool,
}

impl BufferState {
    /// Points in the block
    pub fn points(&self) -> &[LasPoint] {
        &self.points
    }

    /// Number of points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True if the block holds no points
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// True if the contents differ from disk
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Slot of the point at `location`
    pub fn position(&self, location: Xyz) -> Option<usize> {
        self.points.iter().position(|p| p.location == location)
    }

    /// Append a point
    pub fn push(&mut self, point: LasPoint) {
        self.points.push(point);
        self.dirty = true;
    }

    /// Overwrite the point in slot `i`
    pub fn replace(&mut self, i: usize, point: LasPoint) {
        self.points[i] = point;
        self.dirty = true;
    }

    /// Remove and return every point
    pub fn take_all(&mut self) -> Vec<LasPoint> {
        self.dirty = true;
        std::mem::take(&mut self.points)
    }

    pub(crate) fn load(&mut self, block: u64, points: Vec<LasPoint>) {
        self.block = Some(block);
        self.points = points;
        self.dirty = false;
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub(crate) fn reset(&mut self) {
        self.block = None;
        self.points = Vec::new();
        self.dirty = false;
    }
}

/// One cache slot of the pool
#[derive(Debug, Default)]
pub struct Buffer {
    state: RwLock<BufferState>,
    owners: Mutex<Vec<WorkerId>>,
    in_transit: AtomicBool,
    pub(crate) last_used: AtomicU64,
}

impl Buffer {
    /// A fresh buffer, claimed by its creator
    pub(crate) fn claimed() -> Self {
        let b = Self::default();
        b.in_transit.store(true, Ordering::SeqCst);
        b
    }

    /// Register `worker` as an owner unless the buffer is in transit
    pub(crate) fn try_own(&self, worker: WorkerId) -> bool {
        let mut owners = self.owners.lock();
        if self.in_transit.load(Ordering::SeqCst) {
            return false;
        }
        owners.push(worker);
        true
    }

    /// Drop one ownership of `worker`
    pub(crate) fn disown(&self, worker: WorkerId) {
        let mut owners = self.owners.lock();
        if let Some(i) = owners.iter().position(|w| *w == worker) {
            owners.swap_remove(i);
        }
    }

    /// Mark the buffer in transit if nobody owns it and nobody else has
    /// claimed it
    pub(crate) fn try_claim(&self) -> bool {
        let owners = self.owners.lock();
        if !owners.is_empty() {
            return false;
        }
        self.in_transit
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Hand a claimed buffer to `worker`, ending the transit
    pub(crate) fn finish_claim(&self, worker: WorkerId) {
        let mut owners = self.owners.lock();
        owners.push(worker);
        self.in_transit.store(false, Ordering::SeqCst);
    }

    /// Give up a claim without taking ownership
    pub(crate) fn release_claim(&self) {
        let _owners = self.owners.lock();
        self.in_transit.store(false, Ordering::SeqCst);
    }

    /// Number of current ownerships
    pub fn owner_count(&self) -> usize {
        self.owners.lock().len()
    }

    /// True while claimed for eviction or loading
    pub fn in_transit(&self) -> bool {
        self.in_transit.load(Ordering::SeqCst)
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, BufferState> {
        self.state.read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, BufferState> {
        self.state.write()
    }
}

/// Ownership of a resident block; dropping it disowns the buffer
#[derive(Debug)]
pub struct BufferGuard {
    buffer: Arc<Buffer>,
    block: u64,
    worker: WorkerId,
}

impl BufferGuard {
    pub(crate) fn new(buffer: Arc<Buffer>, block: u64, worker: WorkerId) -> Self {
        Self { buffer, block, worker }
    }

    /// Block this guard pins
    pub fn block(&self) -> u64 {
        self.block
    }

    /// Owning worker
    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    /// Shared access to the block contents
    pub fn read(&self) -> RwLockReadGuard<'_, BufferState> {
        self.buffer.read()
    }

    /// Exclusive access to the block contents
    pub fn write(&self) -> RwLockWriteGuard<'_, BufferState> {
        self.buffer.write()
    }
}

impl Drop for BufferGuard {
    fn drop(&mut self) {
        self.buffer.disown(self.worker);
    }
}
