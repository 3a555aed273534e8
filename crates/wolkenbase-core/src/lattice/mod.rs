//! Hexagonal lattice: arithmetic, paged storage and traversal order

/// Eisenstein integer arithmetic
pub mod eisenstein;
/// Flowsnake traversal
pub mod flowsnake;
/// Sparse hexagon-paged map
pub mod hex_array;

pub use eisenstein::{Eisenstein, PAGE_MODULUS, UNITS};
pub use flowsnake::{flow_address, Flowsnake, FLOW_BASE};
pub use hex_array::HexArray;

#[cfg(test)]
mod tests;
