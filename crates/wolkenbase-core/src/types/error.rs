//! Error types and handling for Wolkenbase
//!
//! Lattice and index inconsistencies are fatal and propagate to the caller;
//! data anomalies are counted by the store and only surface here when a
//! caller asks for a point that is not there.

use crate::types::point::Xyz;
use thiserror::Error;

/// Main result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Wolkenbase
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Hex-lattice arithmetic errors
    #[error("Lattice error: {0}")]
    Lattice(#[from] LatticeError),

    /// Octree index errors
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    /// Block store errors
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// I/O errors from std
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Prometheus metrics errors
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Internal system errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors of Eisenstein integer arithmetic
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatticeError {
    /// Division by the zero lattice value
    #[error("division by zero")]
    DivideByZero,
}

/// Octree index errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    /// The octant already holds a different block
    #[error("octant already holds block {existing}, refusing block {block}")]
    Occupied {
        /// Block that was to be installed
        block: u64,
        /// Block already in the octant
        existing: u64,
    },

    /// A split or install reached an internal node where a terminal was expected
    #[error("expected a terminal at {0:?}")]
    NotTerminal(Xyz),

    /// The tree is in a state that should be impossible
    #[error("inconsistent index: {0}")]
    Inconsistent(String),
}

/// Block store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// No point is stored at the location
    #[error("no point at {0:?}")]
    PointNotFound(Xyz),

    /// Reading or writing a block failed
    #[error("I/O on block {block} failed: {source}")]
    BlockIo {
        /// Block number
        block: u64,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Record serialization failed
    #[error("Record codec error: {0}")]
    Codec(#[from] bincode::Error),

    /// A block cannot hold the configured number of records
    #[error("{records} records of {record_size} bytes do not fit in {block_size} bytes")]
    RecordTooLarge {
        /// Records per block
        records: usize,
        /// Bytes per record
        record_size: usize,
        /// Bytes per block
        block_size: usize,
    },

    /// A worker id outside the range the store was opened for
    #[error("unknown worker {0}")]
    UnknownWorker(usize),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Violated invariants: the run should not continue.
    ///
    /// An occupied terminal is refused without touching the index, so it is
    /// reported but not fatal.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Index(IndexError::Occupied { .. }) => false,
            Error::Lattice(_) | Error::Index(_) | Error::Internal(_) => true,
            _ => false,
        }
    }

    /// Recoverable data anomaly
    pub fn is_anomaly(&self) -> bool {
        matches!(self, Error::Store(StoreError::PointNotFound(_)))
    }
}
