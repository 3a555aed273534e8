//! In-memory index structures

/// Arena octree mapping space to disk blocks
pub mod octree;

pub use octree::{NodeHandle, Octree, Slot};
