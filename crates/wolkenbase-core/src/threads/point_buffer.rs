//! Shuffle buffers between the point source and the workers.
//!
//! Input files are usually ordered along scan lines, which would send every
//! worker to the same block. Each push swaps the new point to a slot a
//! relatively prime stride away from the previous one, so pops come out
//! spread across the buffer.

use crate::system::relprime;
use crate::types::{LasPoint, WorkerId};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
struct Shuffle {
    points: Vec<LasPoint>,
    pos: usize,
}

impl Shuffle {
    fn push(&mut self, point: LasPoint) {
        self.points.push(point);
        let n = self.points.len();
        if n > 1 {
            self.pos = (self.pos + relprime(n)) % n;
            self.points.swap(self.pos, n - 1);
        }
    }
}

/// One shuffle buffer per worker
#[derive(Debug)]
pub struct PointBuffers {
    buffers: Vec<Mutex<Shuffle>>,
    next: AtomicUsize,
    len: AtomicUsize,
}

impl PointBuffers {
    /// Empty buffers for `workers` workers
    pub fn new(workers: usize) -> Self {
        Self {
            buffers: (0..workers.max(1)).map(|_| Mutex::new(Shuffle::default())).collect(),
            next: AtomicUsize::new(0),
            len: AtomicUsize::new(0),
        }
    }

    /// Number of buffers
    pub fn workers(&self) -> usize {
        self.buffers.len()
    }

    /// Add a point to the next buffer in round-robin order
    pub fn embuffer(&self, point: LasPoint) {
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.buffers.len();
        let mut buf = self.buffers[i].lock();
        self.len.fetch_add(1, Ordering::SeqCst);
        buf.push(point);
    }

    /// Take a point from `worker`'s buffer, or steal one from another
    pub fn debuffer(&self, worker: WorkerId) -> Option<LasPoint> {
        let n = self.buffers.len();
        let own = worker % n;
        (0..n).find_map(|k| {
            let mut buf = self.buffers[(own + k) % n].lock();
            let point = buf.points.pop()?;
            self.len.fetch_sub(1, Ordering::SeqCst);
            Some(point)
        })
    }

    /// Points waiting in all buffers
    pub fn len(&self) -> usize {
        self.len.load(Ordering::SeqCst)
    }

    /// True if no point is waiting
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Points waiting in `worker`'s own buffer
    pub fn len_of(&self, worker: WorkerId) -> usize {
        self.buffers
            .get(worker)
            .map_or(0, |b| b.lock().points.len())
    }
}
