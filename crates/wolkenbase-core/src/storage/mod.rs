//! Storage layer: block files, the buffer pool, cube locks and the store
//! that ties them to the octree index.

/// Flat block files and the record codec
pub mod block_file;
/// Cache slots and ownership guards
pub mod buffer;
/// Region locks
pub mod cube_lock;
/// Free-memory probes
pub mod memory;
/// Buffer pool
pub mod pool;
/// Block store
pub mod store;

pub use block_file::{decode_block, encode_block, BlockFiles};
pub use buffer::{BufferGuard, BufferState};
pub use cube_lock::{CubeLockGuard, CubeLockManager};
pub use memory::{FixedMemory, MemoryProbe, Pressure, SystemMemory};
pub use pool::BufferPool;
pub use store::{BlockStore, PutOutcome, Selection, StoreOptions};

#[cfg(test)]
mod tests;
