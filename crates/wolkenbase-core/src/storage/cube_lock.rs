//! Advisory locks on regions of space.
//!
//! One table for the whole store, one entry per worker. A worker holds at
//! most one cube at a time; locking again replaces its hold. Attempts never
//! block: a conflicting attempt returns `false` and the caller retries.

use crate::geometry::Cube;
use crate::types::WorkerId;
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy)]
struct Hold {
    cube: Cube,
    exclusive: bool,
}

/// Table of cube locks, one slot per worker
#[derive(Debug)]
pub struct CubeLockManager {
    holds: Mutex<Vec<Option<Hold>>>,
}

impl CubeLockManager {
    /// Create a table for `workers` workers
    pub fn new(workers: usize) -> Self {
        Self { holds: Mutex::new(vec![None; workers]) }
    }

    /// Number of worker slots
    pub fn workers(&self) -> usize {
        self.holds.lock().len()
    }

    fn acquire(&self, worker: WorkerId, cube: Cube, exclusive: bool) -> bool {
        let mut holds = self.holds.lock();
        if worker >= holds.len() {
            return false;
        }
        let conflict = holds.iter().enumerate().any(|(w, h)| match h {
            Some(h) if w != worker && h.cube.overlaps(&cube) => exclusive || h.exclusive,
            _ => false,
        });
        if conflict {
            return false;
        }
        holds[worker] = Some(Hold { cube, exclusive });
        true
    }

    /// Take `cube` exclusively.
    ///
    /// Fails if another worker holds an overlapping cube, shared or not.
    pub fn lock(&self, worker: WorkerId, cube: Cube) -> bool {
        self.acquire(worker, cube, true)
    }

    /// Take `cube` shared.
    ///
    /// Fails if another worker holds an overlapping cube exclusively.
    pub fn read_lock(&self, worker: WorkerId, cube: Cube) -> bool {
        self.acquire(worker, cube, false)
    }

    /// Release whatever `worker` holds
    pub fn unlock(&self, worker: WorkerId) {
        if let Some(h) = self.holds.lock().get_mut(worker) {
            *h = None;
        }
    }

    /// The cube `worker` holds and whether the hold is exclusive
    pub fn held(&self, worker: WorkerId) -> Option<(Cube, bool)> {
        self.holds.lock().get(worker).copied().flatten().map(|h| (h.cube, h.exclusive))
    }

    /// [`lock`](Self::lock) returning a guard that unlocks on drop
    pub fn try_lock(&self, worker: WorkerId, cube: Cube) -> Option<CubeLockGuard<'_>> {
        self.lock(worker, cube).then_some(CubeLockGuard { manager: self, worker })
    }

    /// [`read_lock`](Self::read_lock) returning a guard that unlocks on drop
    pub fn try_read_lock(&self, worker: WorkerId, cube: Cube) -> Option<CubeLockGuard<'_>> {
        self.read_lock(worker, cube).then_some(CubeLockGuard { manager: self, worker })
    }
}

/// A held cube lock
#[derive(Debug)]
pub struct CubeLockGuard<'a> {
    manager: &'a CubeLockManager,
    worker: WorkerId,
}

impl Drop for CubeLockGuard<'_> {
    fn drop(&mut self) {
        self.manager.unlock(self.worker);
    }
}
