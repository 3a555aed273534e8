//! Geometry primitives for range queries

/// Axis-aligned cubes
pub mod cube;
/// Query shapes
pub mod shape;

pub use cube::Cube;
pub use shape::{Column, Cylinder, Hyperboloid, Opening, Paraboloid, Shape, Sphere};

#[cfg(test)]
mod tests;
