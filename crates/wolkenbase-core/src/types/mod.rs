/// Type definitions for the Wolkenbase system
///
/// This module contains the point record, coordinates and error types.

/// System-wide error types
pub mod error;
/// Coordinates and point records
pub mod point;

pub use error::{Error, IndexError, LatticeError, Result, StoreError};
pub use point::{LasPoint, Xy, Xyz};

/// Index of a worker thread, `0..workers`
pub type WorkerId = usize;
