//! Adaptive idle back-off

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Decaying maximum of op durations, shared by all workers
#[derive(Debug, Default)]
pub struct OpTime {
    bits: AtomicU64,
}

impl OpTime {
    /// Start at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Current op time in milliseconds
    pub fn get_ms(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// Decay by ×0.999 and raise to `took` if it is longer
    pub fn record(&self, took: Duration) {
        let ms = took.as_secs_f64() * 1000.0;
        let _ = self
            .bits
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |old| {
                Some((f64::from_bits(old) * 0.999).max(ms).to_bits())
            });
    }
}

/// Sleep length of one worker. It grows while the worker finds nothing to
/// do and shrinks while it finds work.
///
/// The ceiling scales with the shared op time, so a worker waiting for
/// others never oversleeps by much more than a round of their ops.
#[derive(Debug, Clone)]
pub struct Backoff {
    sleep_ms: f64,
    max_backoff_ms: f64,
    workers: usize,
}

impl Backoff {
    /// Back-off for one of `workers` workers
    pub fn new(workers: usize, max_backoff_ms: f64) -> Self {
        Self {
            sleep_ms: 0.0,
            max_backoff_ms,
            workers: workers.max(1),
        }
    }

    /// Current sleep length in milliseconds
    pub fn sleep_ms(&self) -> f64 {
        self.sleep_ms
    }

    /// Upper bound of the sleep length for a given op time
    pub fn ceiling_ms(&self, op_time_ms: f64) -> f64 {
        op_time_ms * self.workers as f64 + self.max_backoff_ms
    }

    /// Lengthen the sleep and return how long to sleep now
    pub fn lengthen(&mut self, op_time_ms: f64) -> Duration {
        self.sleep_ms = (self.sleep_ms + 1.0 + self.sleep_ms / 1000.0).min(self.ceiling_ms(op_time_ms));
        Duration::from_secs_f64(self.sleep_ms.max(0.0) / 1000.0)
    }

    /// Shorten the sleep after finding work
    pub fn shorten(&mut self) {
        self.sleep_ms = (self.sleep_ms - 1.0 - self.sleep_ms / 1000.0).max(0.0);
    }
}
