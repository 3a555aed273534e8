//! # Wolkenbase Core
//!
//! Out-of-core spatial storage for point clouds too large to hold in memory.
//! Points are indexed by an octree whose terminals name fixed-size disk blocks;
//! a bounded buffer pool pages those blocks in and out, cube locks serialise
//! mutation of a region, and a pool of worker threads walks the cloud tile by
//! tile in flowsnake order so that the working set stays small.

#![warn(missing_docs)]

/// System constants
pub mod constants;

/// Configuration, logging and the engine aggregate
pub mod core;

/// Point records and error types
pub mod types;

/// Cubes and query shapes
pub mod geometry;

/// Eisenstein integers, paged hex maps and the flowsnake traversal
pub mod lattice;

/// In-memory index structures
pub mod structures;

/// Block files, buffer pool, cube locks and the block store
pub mod storage;

/// Worker threads, phases and queues
pub mod threads;

/// Per-tile statistics gathered during scan
pub mod scan;

/// Metrics and small numeric utilities
pub mod system;

pub use crate::core::{Config, Engine};
pub use geometry::{Cube, Shape};
pub use lattice::{Eisenstein, Flowsnake};
pub use storage::BlockStore;
pub use threads::{Phase, Scheduler, WorkerId};
pub use types::{Error, LasPoint, Result, Xy, Xyz};
