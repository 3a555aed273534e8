//! Axis-aligned cubes
//!
//! A cube is both the extent of an octree node and a query shape. Octants are
//! numbered by the sign of `point - center`: bit 0 for x, bit 1 for y, bit 2
//! for z, a coordinate equal to the center counting as positive.

use crate::types::Xyz;
use serde::{Deserialize, Serialize};

/// Axis-aligned cube
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Cube {
    center: Xyz,
    side: f64,
}

impl Cube {
    /// Create a cube from its center and side length
    pub const fn new(center: Xyz, side: f64) -> Self {
        Self { center, side }
    }

    /// Center of the cube
    pub fn center(&self) -> Xyz {
        self.center
    }

    /// Side length
    pub fn side(&self) -> f64 {
        self.side
    }

    /// Corner with the smallest coordinates
    pub fn min(&self) -> Xyz {
        let h = self.side / 2.0;
        Xyz::new(self.center.x - h, self.center.y - h, self.center.z - h)
    }

    /// Corner with the largest coordinates
    pub fn max(&self) -> Xyz {
        let h = self.side / 2.0;
        Xyz::new(self.center.x + h, self.center.y + h, self.center.z + h)
    }

    /// True if `p` lies in the closed cube
    pub fn contains_point(&self, p: Xyz) -> bool {
        let h = self.side / 2.0;
        (p.x - self.center.x).abs() <= h
            && (p.y - self.center.y).abs() <= h
            && (p.z - self.center.z).abs() <= h
    }

    /// True if `p` lies in the open cube
    pub fn strictly_contains(&self, p: Xyz) -> bool {
        let h = self.side / 2.0;
        (p.x - self.center.x).abs() < h
            && (p.y - self.center.y).abs() < h
            && (p.z - self.center.z).abs() < h
    }

    /// Index of the octant `p` falls in
    pub fn octant(&self, p: Xyz) -> usize {
        (p.x >= self.center.x) as usize
            | ((p.y >= self.center.y) as usize) << 1
            | ((p.z >= self.center.z) as usize) << 2
    }

    /// The half-size cube of octant `i`
    pub fn octant_cube(&self, i: usize) -> Cube {
        let q = self.side / 4.0;
        let sign = |bit: usize| if i & bit != 0 { q } else { -q };
        Cube::new(
            Xyz::new(self.center.x + sign(1), self.center.y + sign(2), self.center.z + sign(4)),
            self.side / 2.0,
        )
    }

    /// True if the interiors of the two cubes intersect.
    ///
    /// Cubes that only share a face, edge or corner do not overlap.
    pub fn overlaps(&self, other: &Cube) -> bool {
        let reach = (self.side + other.side) / 2.0;
        (self.center.x - other.center.x).abs() < reach
            && (self.center.y - other.center.y).abs() < reach
            && (self.center.z - other.center.z).abs() < reach
    }

    /// The point of the cube nearest to `p`
    pub fn clamp(&self, p: Xyz) -> Xyz {
        let (lo, hi) = (self.min(), self.max());
        Xyz::new(p.x.clamp(lo.x, hi.x), p.y.clamp(lo.y, hi.y), p.z.clamp(lo.z, hi.z))
    }

    /// The eight corners
    pub fn corners(&self) -> [Xyz; 8] {
        let h = self.side / 2.0;
        std::array::from_fn(|i| {
            let s = |bit: usize| if i & bit != 0 { h } else { -h };
            Xyz::new(self.center.x + s(1), self.center.y + s(2), self.center.z + s(4))
        })
    }
}
