//! Free-memory probes and the pool's pressure levels

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use sysinfo::System;

/// Source of the free-memory figure the pool decides on
pub trait MemoryProbe: Send + Sync {
    /// Bytes of memory currently available to the process
    fn available_bytes(&self) -> u64;
}

/// Probe backed by the operating system.
///
/// Readings are cached for a short interval; the pool asks on every miss.
pub struct SystemMemory {
    inner: Mutex<(System, Option<Instant>, u64)>,
    refresh: Duration,
}

impl SystemMemory {
    /// Create a probe refreshing at most every 50ms
    pub fn new() -> Self {
        Self { inner: Mutex::new((System::new(), None, 0)), refresh: Duration::from_millis(50) }
    }
}

impl Default for SystemMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SystemMemory {
    fn available_bytes(&self) -> u64 {
        let mut guard = self.inner.lock();
        let (system, last, cached) = &mut *guard;
        if last.map_or(true, |t| t.elapsed() >= self.refresh) {
            system.refresh_memory();
            *cached = system.available_memory();
            *last = Some(Instant::now());
        }
        *cached
    }
}

/// Probe returning a settable value
#[derive(Debug, Default)]
pub struct FixedMemory {
    bytes: AtomicU64,
}

impl FixedMemory {
    /// Create a probe reporting `bytes`
    pub fn new(bytes: u64) -> Self {
        Self { bytes: AtomicU64::new(bytes) }
    }

    /// Change the reported value
    pub fn set(&self, bytes: u64) {
        self.bytes.store(bytes, Ordering::Relaxed);
    }
}

impl MemoryProbe for FixedMemory {
    fn available_bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }
}

/// How urgently the pool must reuse buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pressure {
    /// Free memory above the threshold
    Plenty,
    /// Free memory between half the threshold and the threshold
    Moderate,
    /// Free memory at or below half the threshold
    Low,
}

impl Pressure {
    /// Classify `available` bytes against the low-RAM `threshold`
    pub fn classify(available: u64, threshold: u64) -> Self {
        if available > threshold {
            Pressure::Plenty
        } else if available > threshold / 2 {
            Pressure::Moderate
        } else {
            Pressure::Low
        }
    }
}
