//! Store metrics
//!
//! Each store registers its counters in a registry of its own, so several
//! stores can live in one process without name clashes.

use crate::types::{Error, Result};
use prometheus::{
    register_int_counter_with_registry, register_int_gauge_with_registry, Encoder, IntCounter,
    IntGauge, Registry, TextEncoder,
};
use serde::{Deserialize, Serialize};

/// Counters of one block store
pub struct StoreMetrics {
    registry: Registry,
    /// Blocks read from disk
    pub disk_reads: IntCounter,
    /// Blocks written to disk
    pub disk_writes: IntCounter,
    /// Block lookups served by a resident buffer
    pub cache_hits: IntCounter,
    /// Block lookups that had to page a block in
    pub cache_misses: IntCounter,
    /// Buffers reassigned to another block
    pub evictions: IntCounter,
    /// Blocks split on overflow
    pub splits: IntCounter,
    /// Failed cube lock attempts
    pub lock_retries: IntCounter,
    /// Points written over a point at the same location
    pub duplicate_points: IntCounter,
    /// Points looked for and not found
    pub missing_points: IntCounter,
    /// Points outside the index, not stored
    pub out_of_bounds_points: IntCounter,
    /// Points outside the bounds their source declared
    pub outside_declared_points: IntCounter,
    /// Buffers currently allocated
    pub resident_buffers: IntGauge,
}

/// Snapshot of the data anomaly counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anomalies {
    /// Duplicate points replaced
    pub duplicate_points: u64,
    /// Points not found where expected
    pub missing_points: u64,
    /// Points outside the index
    pub out_of_bounds_points: u64,
    /// Points outside their source's declared bounds
    pub outside_declared_points: u64,
}

impl Anomalies {
    /// Sum of all anomalies
    pub fn total(&self) -> u64 {
        self.duplicate_points
            + self.missing_points
            + self.out_of_bounds_points
            + self.outside_declared_points
    }
}

impl StoreMetrics {
    /// Create the counters in a fresh registry
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let r = &registry;
        Ok(Self {
            disk_reads: register_int_counter_with_registry!(
                "wb_disk_reads_total",
                "Total number of blocks read from disk",
                r
            )?,
            disk_writes: register_int_counter_with_registry!(
                "wb_disk_writes_total",
                "Total number of blocks written to disk",
                r
            )?,
            cache_hits: register_int_counter_with_registry!(
                "wb_cache_hits_total",
                "Total number of block lookups served from memory",
                r
            )?,
            cache_misses: register_int_counter_with_registry!(
                "wb_cache_misses_total",
                "Total number of block lookups that paged a block in",
                r
            )?,
            evictions: register_int_counter_with_registry!(
                "wb_evictions_total",
                "Total number of buffers reassigned to another block",
                r
            )?,
            splits: register_int_counter_with_registry!(
                "wb_splits_total",
                "Total number of block splits",
                r
            )?,
            lock_retries: register_int_counter_with_registry!(
                "wb_lock_retries_total",
                "Total number of failed cube lock attempts",
                r
            )?,
            duplicate_points: register_int_counter_with_registry!(
                "wb_duplicate_points_total",
                "Total number of points replacing a point at the same location",
                r
            )?,
            missing_points: register_int_counter_with_registry!(
                "wb_missing_points_total",
                "Total number of points not found where expected",
                r
            )?,
            out_of_bounds_points: register_int_counter_with_registry!(
                "wb_out_of_bounds_points_total",
                "Total number of points outside the index",
                r
            )?,
            outside_declared_points: register_int_counter_with_registry!(
                "wb_outside_declared_points_total",
                "Total number of points outside their source's declared bounds",
                r
            )?,
            resident_buffers: register_int_gauge_with_registry!(
                "wb_resident_buffers",
                "Number of buffers currently allocated",
                r
            )?,
            registry,
        })
    }

    /// The registry holding these counters
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Current anomaly counts
    pub fn anomalies(&self) -> Anomalies {
        Anomalies {
            duplicate_points: self.duplicate_points.get(),
            missing_points: self.missing_points.get(),
            out_of_bounds_points: self.out_of_bounds_points.get(),
            outside_declared_points: self.outside_declared_points.get(),
        }
    }

    /// Registry contents in the Prometheus text format
    pub fn gather_text(&self) -> Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| Error::internal(format!("metrics text is not UTF-8: {e}")))
    }
}

impl std::fmt::Debug for StoreMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreMetrics")
            .field("disk_reads", &self.disk_reads.get())
            .field("disk_writes", &self.disk_writes.get())
            .field("splits", &self.splits.get())
            .field("resident_buffers", &self.resident_buffers.get())
            .finish_non_exhaustive()
    }
}
