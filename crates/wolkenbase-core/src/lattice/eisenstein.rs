//! Eisenstein integers
//!
//! `Eisenstein { x, y }` is `x + yω` with `ω = e^{2πi/3}`, so the norm is
//! `x² + y² - xy`. The six units are the sixth roots of unity; `1 + ω` is a
//! rotation by 60°. Lattice points are the centers of a hexagonal tiling of
//! the plane, adjacent tiles differing by a unit.

use crate::constants::{PAGE_RADIUS, PAGE_SIZE};
use crate::types::{LatticeError, Xy};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Rem, Sub, SubAssign};

const HALF_SQRT3: f64 = 0.866_025_403_784_438_6;

/// Integer point of the hexagonal lattice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Eisenstein {
    x: i32,
    y: i32,
}

/// The six units, in counterclockwise order starting at 1
pub const UNITS: [Eisenstein; 6] = [
    Eisenstein::new(1, 0),
    Eisenstein::new(1, 1),
    Eisenstein::new(0, 1),
    Eisenstein::new(-1, 0),
    Eisenstein::new(-1, -1),
    Eisenstein::new(0, -1),
];

/// Divisor whose remainders are exactly the radius-6 hexagon
pub const PAGE_MODULUS: Eisenstein = Eisenstein::new(7, 13);

impl Eisenstein {
    /// Zero
    pub const ZERO: Eisenstein = Eisenstein::new(0, 0);
    /// One
    pub const ONE: Eisenstein = Eisenstein::new(1, 0);
    /// ω, a primitive cube root of unity
    pub const OMEGA: Eisenstein = Eisenstein::new(0, 1);
    /// Marker for "no address", both coordinates `i32::MIN`
    pub const SENTINEL: Eisenstein = Eisenstein::new(i32::MIN, i32::MIN);

    /// Create `x + yω`
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Real-axis coordinate
    pub fn x(self) -> i32 {
        self.x
    }

    /// ω coordinate
    pub fn y(self) -> i32 {
        self.y
    }

    /// Field norm, `|self|²`
    pub fn norm(self) -> i64 {
        let (x, y) = (self.x as i64, self.y as i64);
        x * x + y * y - x * y
    }

    /// Complex conjugate
    pub fn conj(self) -> Self {
        Self::new(self.x - self.y, -self.y)
    }

    /// Number of unit steps from the origin
    pub fn hex_distance(self) -> i32 {
        self.x.abs().max(self.y.abs()).max((self.x - self.y).abs())
    }

    /// True if the two points are neighbours on the lattice
    pub fn is_adjacent(self, other: Eisenstein) -> bool {
        (self - other).norm() == 1
    }

    /// Rotate counterclockwise by `steps` × 60°
    pub fn rotate(self, steps: usize) -> Self {
        self * UNITS[steps % 6]
    }

    /// Quotient and remainder with the remainder of least norm.
    ///
    /// `self == q * divisor + r` and `r.norm() < divisor.norm()`. Among equal
    /// norms the first candidate in a fixed scan order wins, so the result is
    /// deterministic.
    pub fn div_rem(self, divisor: Eisenstein) -> Result<(Eisenstein, Eisenstein), LatticeError> {
        if divisor == Self::ZERO {
            return Err(LatticeError::DivideByZero);
        }
        Ok(self.div_rem_nonzero(divisor))
    }

    /// Quotient of [`div_rem`](Self::div_rem)
    pub fn checked_div(self, divisor: Eisenstein) -> Result<Eisenstein, LatticeError> {
        self.div_rem(divisor).map(|(q, _)| q)
    }

    pub(crate) fn div_rem_nonzero(self, divisor: Eisenstein) -> (Eisenstein, Eisenstein) {
        let n = divisor.norm();
        let num = self.mul_wide(divisor.conj());
        let q0 = (round_div(num.0, n), round_div(num.1, n));
        let mut best: Option<(i64, Eisenstein, Eisenstein)> = None;
        for dx in -1..=1 {
            for dy in -1..=1 {
                let q = Eisenstein::new((q0.0 + dx) as i32, (q0.1 + dy) as i32);
                let r = self - q * divisor;
                let rn = r.norm();
                if best.map_or(true, |(bn, _, _)| rn < bn) {
                    best = Some((rn, q, r));
                }
            }
        }
        match best {
            Some((_, q, r)) => (q, r),
            None => (Self::ZERO, self),
        }
    }

    fn mul_wide(self, rhs: Eisenstein) -> (i64, i64) {
        let (ax, ay) = (self.x as i64, self.y as i64);
        let (bx, by) = (rhs.x as i64, rhs.y as i64);
        (ax * bx - ay * by, ax * by + ay * bx - ay * by)
    }

    /// Position in the plane, unit spacing, `1` on the x axis
    pub fn to_xy(self) -> Xy {
        Xy::new(self.x as f64 - self.y as f64 / 2.0, self.y as f64 * HALF_SQRT3)
    }

    /// Lattice point nearest to `p`
    pub fn from_xy(p: Xy) -> Self {
        let yf = p.y / HALF_SQRT3;
        let xf = p.x + yf / 2.0;
        let base = Eisenstein::new(xf.round() as i32, yf.round() as i32);
        let mut best = base;
        let mut best_dist = f64::INFINITY;
        for dx in -1..=1 {
            for dy in -1..=1 {
                let cand = base + Eisenstein::new(dx, dy);
                let d = cand.to_xy().dist(p);
                if d < best_dist {
                    best = cand;
                    best_dist = d;
                }
            }
        }
        best
    }

    /// Dense slot of a point of the radius-6 hexagon, `0..127`.
    ///
    /// Meaningful only for remainders of division by [`PAGE_MODULUS`]. Slots
    /// run row by row in increasing `y`, then increasing `x`.
    pub fn page_index(self) -> usize {
        let (x, y) = (self.x, self.y);
        let size = PAGE_RADIUS;
        let slot = if y < 0 {
            (-y - size) * (-y - 3 * size - 3) / 2 + x - y
        } else {
            x - y + PAGE_SIZE as i32 - (size - y) * (3 * size + 3 - y) / 2 - 1
        };
        slot as usize
    }

    /// Inverse of [`page_index`](Self::page_index)
    pub fn nth_in_hexagon(n: usize) -> Self {
        let size = PAGE_RADIUS;
        let mut rest = n as i32;
        for y in -size..=size {
            let row = 2 * size + 1 - y.abs();
            if rest < row {
                return Eisenstein::new((-size).max(y - size) + rest, y);
            }
            rest -= row;
        }
        Self::SENTINEL
    }

    /// Every point within hex distance `radius`, ring by ring from the origin
    pub fn hexagon(radius: i32) -> impl Iterator<Item = Eisenstein> {
        std::iter::once(Self::ZERO).chain((1..=radius.max(0)).flat_map(Self::ring))
    }

    /// The `6r` points at hex distance exactly `r`
    pub fn ring(r: i32) -> impl Iterator<Item = Eisenstein> {
        (0..6usize).flat_map(move |side| {
            let corner = UNITS[side] * Eisenstein::new(r, 0);
            let step = UNITS[(side + 2) % 6];
            (0..r).map(move |i| corner + step * Eisenstein::new(i, 0))
        })
    }
}

fn round_div(a: i64, n: i64) -> i64 {
    (2 * a + n).div_euclid(2 * n)
}

impl Add for Eisenstein {
    type Output = Eisenstein;
    fn add(self, rhs: Eisenstein) -> Eisenstein {
        Eisenstein::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Eisenstein {
    fn add_assign(&mut self, rhs: Eisenstein) {
        *self = *self + rhs;
    }
}

impl Sub for Eisenstein {
    type Output = Eisenstein;
    fn sub(self, rhs: Eisenstein) -> Eisenstein {
        Eisenstein::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for Eisenstein {
    fn sub_assign(&mut self, rhs: Eisenstein) {
        *self = *self - rhs;
    }
}

impl Neg for Eisenstein {
    type Output = Eisenstein;
    fn neg(self) -> Eisenstein {
        Eisenstein::new(-self.x, -self.y)
    }
}

impl Mul for Eisenstein {
    type Output = Eisenstein;
    fn mul(self, rhs: Eisenstein) -> Eisenstein {
        Eisenstein::new(
            self.x * rhs.x - self.y * rhs.y,
            self.x * rhs.y + self.y * rhs.x - self.y * rhs.y,
        )
    }
}

impl MulAssign for Eisenstein {
    fn mul_assign(&mut self, rhs: Eisenstein) {
        *self = *self * rhs;
    }
}

/// Remainder of least norm; by zero the dividend is returned unchanged.
impl Rem for Eisenstein {
    type Output = Eisenstein;
    fn rem(self, rhs: Eisenstein) -> Eisenstein {
        if rhs == Eisenstein::ZERO {
            self
        } else {
            self.div_rem_nonzero(rhs).1
        }
    }
}

/// Orders by `y`, then `x`. Good for map keys, meaningless as arithmetic.
impl Ord for Eisenstein {
    fn cmp(&self, other: &Self) -> Ordering {
        self.y.cmp(&other.y).then(self.x.cmp(&other.x))
    }
}

impl PartialOrd for Eisenstein {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<(i32, i32)> for Eisenstein {
    fn from((x, y): (i32, i32)) -> Self {
        Eisenstein::new(x, y)
    }
}
