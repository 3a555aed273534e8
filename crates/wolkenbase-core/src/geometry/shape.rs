//! Query shapes
//!
//! Every shape is convex, so a cube lies wholly inside a shape exactly when
//! its eight corners do. Range queries rely on that to take whole blocks
//! without testing each point.

use super::cube::Cube;
use crate::types::{Xy, Xyz};

/// A region of space usable as a range query
pub trait Shape: Send + Sync {
    /// True if `p` lies in the shape
    fn contains(&self, p: Xyz) -> bool;

    /// The point of `cube` nearest to the shape
    fn closest_point_in(&self, cube: &Cube) -> Xyz;

    /// True if the shape and the cube meet
    fn intersects(&self, cube: &Cube) -> bool {
        self.contains(self.closest_point_in(cube))
    }

    /// True if the whole cube lies in the shape
    fn contains_cube(&self, cube: &Cube) -> bool {
        cube.corners().iter().all(|c| self.contains(*c))
    }
}

/// Which way a paraboloid or hyperboloid opens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opening {
    /// Interior above the vertex
    Up,
    /// Interior below the vertex
    Down,
}

fn clamp_xy(cube: &Cube, p: Xy) -> Xy {
    let (lo, hi) = (cube.min(), cube.max());
    Xy::new(p.x.clamp(lo.x, hi.x), p.y.clamp(lo.y, hi.y))
}

impl Shape for Cube {
    fn contains(&self, p: Xyz) -> bool {
        self.contains_point(p)
    }

    fn closest_point_in(&self, cube: &Cube) -> Xyz {
        cube.clamp(self.center())
    }
}

/// Ball around a center
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    center: Xyz,
    radius: f64,
}

impl Sphere {
    /// Create a sphere
    pub fn new(center: Xyz, radius: f64) -> Self {
        Self { center, radius }
    }
}

impl Shape for Sphere {
    fn contains(&self, p: Xyz) -> bool {
        p.dist(self.center) <= self.radius
    }

    fn closest_point_in(&self, cube: &Cube) -> Xyz {
        cube.clamp(self.center)
    }
}

/// Vertical cylinder, unbounded in z
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cylinder {
    center: Xy,
    radius: f64,
}

impl Cylinder {
    /// Create a cylinder around a vertical axis through `center`
    pub fn new(center: Xy, radius: f64) -> Self {
        Self { center, radius }
    }

    /// Axis position
    pub fn center(&self) -> Xy {
        self.center
    }

    /// Radius
    pub fn radius(&self) -> f64 {
        self.radius
    }
}

impl Shape for Cylinder {
    fn contains(&self, p: Xyz) -> bool {
        p.xy().dist(self.center) <= self.radius
    }

    fn closest_point_in(&self, cube: &Cube) -> Xyz {
        Xyz::from((clamp_xy(cube, self.center), cube.center().z))
    }
}

/// Vertical square prism over one grid pixel, unbounded in z.
///
/// The pixel is half-open, `[x0, x0 + side) × [y0, y0 + side)`, so adjacent
/// pixels never share a point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Column {
    corner: Xy,
    side: f64,
}

impl Column {
    /// Create a column over the pixel with lower-left corner `corner`
    pub fn new(corner: Xy, side: f64) -> Self {
        Self { corner, side }
    }

    /// Column over pixel `(col, row)` of a grid anchored at `origin`
    pub fn pixel(origin: Xy, side: f64, col: i64, row: i64) -> Self {
        Self::new(Xy::new(origin.x + col as f64 * side, origin.y + row as f64 * side), side)
    }
}

impl Shape for Column {
    fn contains(&self, p: Xyz) -> bool {
        p.x >= self.corner.x
            && p.x < self.corner.x + self.side
            && p.y >= self.corner.y
            && p.y < self.corner.y + self.side
    }

    fn closest_point_in(&self, cube: &Cube) -> Xyz {
        let mid = Xy::new(self.corner.x + self.side / 2.0, self.corner.y + self.side / 2.0);
        Xyz::from((clamp_xy(cube, mid), cube.center().z))
    }
}

/// Solid of revolution bounded by a paraboloid.
///
/// With vertex `v`, radius of curvature `r` and opening down, a point lies
/// inside when `2 (v.z - p.z) r >= d²`, `d` being its horizontal distance
/// from the axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paraboloid {
    vertex: Xyz,
    radius: f64,
    opening: Opening,
}

impl Paraboloid {
    /// Create a paraboloid; `radius` is the radius of curvature at the vertex
    pub fn new(vertex: Xyz, radius: f64, opening: Opening) -> Self {
        Self { vertex, radius: radius.abs(), opening }
    }

    /// Paraboloid whose interior lies below the vertex
    pub fn downward(vertex: Xyz, radius: f64) -> Self {
        Self::new(vertex, radius, Opening::Down)
    }

    /// Paraboloid whose interior lies above the vertex
    pub fn upward(vertex: Xyz, radius: f64) -> Self {
        Self::new(vertex, radius, Opening::Up)
    }
}

fn rise(vertex: Xyz, p: Xyz, opening: Opening) -> f64 {
    match opening {
        Opening::Down => vertex.z - p.z,
        Opening::Up => p.z - vertex.z,
    }
}

fn nearest_face(cube: &Cube, vertex: Xyz, opening: Opening) -> Xyz {
    let z = match opening {
        Opening::Down => cube.min().z,
        Opening::Up => cube.max().z,
    };
    Xyz::from((clamp_xy(cube, vertex.xy()), z))
}

impl Shape for Paraboloid {
    fn contains(&self, p: Xyz) -> bool {
        let d = p.xy() - self.vertex.xy();
        2.0 * rise(self.vertex, p, self.opening) * self.radius >= d.dot(d)
    }

    fn closest_point_in(&self, cube: &Cube) -> Xyz {
        nearest_face(cube, self.vertex, self.opening)
    }
}

/// Solid of revolution bounded by one sheet of a hyperboloid.
///
/// The surface falls away from the vertex as `m (√((r m)² + d²) - r m)`:
/// radius of curvature `r` at the vertex and asymptotic slope `m`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hyperboloid {
    vertex: Xyz,
    radius: f64,
    slope: f64,
    opening: Opening,
}

impl Hyperboloid {
    /// Create a hyperboloid
    pub fn new(vertex: Xyz, radius: f64, slope: f64, opening: Opening) -> Self {
        Self { vertex, radius: radius.abs(), slope: slope.abs(), opening }
    }

    fn drop_at(&self, d: f64) -> f64 {
        let a = self.radius * self.slope;
        self.slope * ((a * a + d * d).sqrt() - a)
    }
}

impl Shape for Hyperboloid {
    fn contains(&self, p: Xyz) -> bool {
        let d = p.xy().dist(self.vertex.xy());
        rise(self.vertex, p, self.opening) >= self.drop_at(d)
    }

    fn closest_point_in(&self, cube: &Cube) -> Xyz {
        nearest_face(cube, self.vertex, self.opening)
    }
}
