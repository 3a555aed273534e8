//! Global constants used throughout the Wolkenbase codebase
//!
//! Sizes of on-disk records and blocks, lattice page geometry and the
//! defaults the configuration falls back on.

/// Serialized size of one point record in bytes.
///
/// Must match `bincode::serialized_size(&LasPoint)`. If the record gains
/// fields, adjust `RECORDS_PER_BLOCK` so that
/// `POINT_RECORD_SIZE * RECORDS_PER_BLOCK` stays at or just under `BLOCK_SIZE`.
pub const POINT_RECORD_SIZE: usize = 87;

/// Default number of point records per disk block
pub const RECORDS_PER_BLOCK: usize = 753;

/// Size of one disk block in bytes (64KB)
pub const BLOCK_SIZE: usize = 65536;

/// Radius of the hexagonal page used by `HexArray`
pub const PAGE_RADIUS: i32 = 6;

/// Number of lattice points in a page: 3r(r+1)+1 for r = 6
pub const PAGE_SIZE: usize = 127;

/// Number of flowsnake scales
pub const FLOWSNAKE_SCALES: usize = 12;

/// Bit set in a worker's status word while it sleeps
pub const ASLEEP: u32 = 256;

/// Default fixed sleep after a failed cube lock, in milliseconds
pub const DEFAULT_DEAD_SLEEP_MS: u64 = 10;

/// Default additive ceiling of the adaptive back-off, in milliseconds
pub const DEFAULT_MAX_BACKOFF_MS: f64 = 1000.0;

/// Buffers needed per worker before the pool can make progress
///
/// A put holds one buffer, a split touches up to eight more.
pub const MIN_BUFFERS_PER_WORKER: usize = 8;

/// Default buffers per worker when the capacity is left on auto
pub const DEFAULT_BUFFERS_PER_WORKER: usize = 16;

/// Fraction of free RAM at open that becomes the low-RAM threshold
pub const LOW_RAM_DIVISOR: u64 = 7;

/// Reciprocal of the golden ratio, used to pick shuffle strides
pub const INV_PHI: f64 = 0.618_033_988_749_894_9;

/// Maximum worker threads allowed
pub const MAX_WORKER_THREADS: usize = 1024;
