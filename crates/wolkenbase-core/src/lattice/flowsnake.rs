//! Flowsnake traversal of hexagonal tiles
//!
//! A counter is written in balanced base 7 and each digit is replaced by a
//! cell of the 7-hexagon rep-tile, rotated and possibly mirrored according to
//! a 6-state machine driven by the digits above it. The cells are summed in
//! base `2 - ω`. Successive counters land on adjacent tiles at every scale,
//! so workers pulling consecutive addresses touch overlapping sets of blocks.

use super::eisenstein::{Eisenstein, UNITS};
use crate::constants::FLOWSNAKE_SCALES;
use crate::geometry::{Cube, Cylinder};
use crate::types::Xy;
use std::sync::atomic::{AtomicI64, Ordering};

/// Radix of the traversal, norm 7
pub const FLOW_BASE: Eisenstein = Eisenstein::new(2, -1);

/// Cell digit taken by each input digit `-3..=3`
const CELL_OF_DIGIT: [i8; 7] = [-3, -1, 0, -2, 1, 3, 2];

/// Rotation (60° steps) and mirror flag the sub-curve of each digit inherits
const CHILD_STATE: [(usize, bool); 7] = [
    (0, false),
    (2, true),
    (0, true),
    (4, false),
    (0, false),
    (0, false),
    (4, true),
];

/// Per scale: radius of the largest lattice hexagon the curve fills, and the
/// half-width of the symmetric counter range that covers that hexagon.
const SCALES: [(i32, i64); FLOWSNAKE_SCALES] = [
    (0, 0),
    (1, 3),
    (3, 22),
    (8, 157),
    (24, 1168),
    (62, 8181),
    (150, 53982),
    (447, 400681),
    (1167, 2813868),
    (2672, 18509423),
    (6121, 128915228),
    (14023, 894407309),
];

/// Cell of the 7-hexagon named by a balanced base-7 digit
fn digit_cell(d: i8) -> Eisenstein {
    let y = (d as i32 + 4).div_euclid(3) - 1;
    Eisenstein::new(d as i32 - 2 * y, y)
}

/// Lattice address of counter `n` on the curve of `digits` digits
pub fn flow_address(n: i64, digits: u32) -> Eisenstein {
    let mut ds = [0i8; FLOWSNAKE_SCALES];
    let mut m = n;
    for d in ds.iter_mut().take(digits as usize) {
        let mut r = m.rem_euclid(7);
        if r > 3 {
            r -= 7;
        }
        *d = r as i8;
        m = (m - r) / 7;
    }
    let (mut rot, mut mirrored) = (0usize, false);
    let mut acc = Eisenstein::ZERO;
    for &raw in ds[..digits as usize].iter().rev() {
        let d = if mirrored { -raw } else { raw };
        let idx = (d + 3) as usize;
        acc = acc * FLOW_BASE + UNITS[rot] * digit_cell(CELL_OF_DIGIT[idx]);
        let (turn, flip) = CHILD_STATE[idx];
        rot = (rot + turn) % 6;
        mirrored ^= flip;
    }
    acc
}

/// Tile spacing that makes scale `k` cover a square of side `side`
fn derived_spacing(side: f64, radius: i32) -> f64 {
    side * 6f64.sqrt() / (3 * radius + 1) as f64
}

/// Shared generator of tile addresses in flowsnake order
#[derive(Debug)]
pub struct Flowsnake {
    center: Xy,
    spacing: f64,
    digits: u32,
    start: i64,
    stop: i64,
    counter: AtomicI64,
}

impl Flowsnake {
    /// Traversal covering the horizontal extent of `cube` with tiles as near
    /// to `desired_spacing` as the twelve scales allow
    pub fn new(cube: &Cube, desired_spacing: f64) -> Self {
        let side = cube.side();
        let scale = (0..FLOWSNAKE_SCALES)
            .min_by(|&a, &b| {
                let err = |k: usize| (derived_spacing(side, SCALES[k].0) / desired_spacing).ln().abs();
                err(a).total_cmp(&err(b))
            })
            .unwrap_or(0);
        let (radius, half) = SCALES[scale];
        Self {
            center: cube.center().xy(),
            spacing: derived_spacing(side, radius),
            digits: scale as u32,
            start: -half,
            stop: half,
            counter: AtomicI64::new(-half),
        }
    }

    /// Traversal of counters `start..=stop` on the curve of `digits` digits,
    /// unit spacing around the origin
    pub fn with_range(digits: u32, start: i64, stop: i64) -> Self {
        Self {
            center: Xy::default(),
            spacing: 1.0,
            digits: digits.min(FLOWSNAKE_SCALES as u32 - 1),
            start,
            stop,
            counter: AtomicI64::new(start),
        }
    }

    /// Next address, or `None` once the range is used up.
    ///
    /// Concurrent callers receive distinct addresses; together they receive
    /// every address of the range.
    pub fn next(&self) -> Option<Eisenstein> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        (n <= self.stop).then(|| flow_address(n, self.digits))
    }

    /// [`next`](Self::next) with [`Eisenstein::SENTINEL`] for exhaustion
    pub fn next_or_sentinel(&self) -> Eisenstein {
        self.next().unwrap_or(Eisenstein::SENTINEL)
    }

    /// Rewind to the first address
    pub fn restart(&self) {
        self.counter.store(self.start, Ordering::SeqCst);
    }

    /// Fraction of the range handed out, in `[0, 1]`
    pub fn progress(&self) -> f64 {
        let taken = self.counter.load(Ordering::SeqCst) - self.start;
        (taken as f64 / self.len() as f64).clamp(0.0, 1.0)
    }

    /// True once every address has been handed out
    pub fn is_exhausted(&self) -> bool {
        self.counter.load(Ordering::SeqCst) > self.stop
    }

    /// Number of addresses in the range
    pub fn len(&self) -> u64 {
        (self.stop - self.start + 1).max(0) as u64
    }

    /// True if the range is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First counter
    pub fn start(&self) -> i64 {
        self.start
    }

    /// Last counter
    pub fn stop(&self) -> i64 {
        self.stop
    }

    /// Number of base-7 digits, which is also the scale index
    pub fn scale(&self) -> u32 {
        self.digits
    }

    /// Distance between neighbouring tile centers
    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    /// Radius of the lattice hexagon a scale covers
    pub fn scale_radius(scale: u32) -> i32 {
        SCALES[(scale as usize).min(FLOWSNAKE_SCALES - 1)].0
    }

    /// Plane position of a tile center
    pub fn to_xy(&self, address: Eisenstein) -> Xy {
        self.center + address.to_xy() * self.spacing
    }

    /// Tile containing a plane position
    pub fn nearest(&self, p: Xy) -> Eisenstein {
        Eisenstein::from_xy((p - self.center) / self.spacing)
    }

    /// Vertical cylinder circumscribing the hexagonal tile at `address`
    pub fn cylinder(&self, address: Eisenstein) -> Cylinder {
        Cylinder::new(self.to_xy(address), self.spacing / 3f64.sqrt())
    }
}
