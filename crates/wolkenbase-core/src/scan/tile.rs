//! Per-tile statistics and the scan of one hexagonal column

use crate::core::Engine;
use crate::lattice::{Eisenstein, HexArray};
use crate::types::{Error, Result, WorkerId, Xy, Xyz};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Aggregates of one hexagonal column
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    /// Points in the circumscribing cylinder
    pub n_points: u32,
    /// Points classified as ground
    pub n_ground: u32,
    /// Roof detection flags
    pub roof_flags: u32,
    /// Tree detection flags
    pub tree_flags: u32,
    /// Points per square metre of the bottom layer
    pub density: f64,
    /// Radius of the paraboloids used to classify the tile
    pub paraboloid_size: f64,
    /// Elevation range after untilting
    pub height: f64,
}

impl Tile {
    fn fold(self, other: Tile, pick: fn(f64, f64) -> f64, pick_n: fn(u32, u32) -> u32) -> Tile {
        Tile {
            n_points: pick_n(self.n_points, other.n_points),
            n_ground: pick_n(self.n_ground, other.n_ground),
            roof_flags: pick_n(self.roof_flags, other.roof_flags),
            tree_flags: pick_n(self.tree_flags, other.tree_flags),
            density: pick(self.density, other.density),
            paraboloid_size: pick(self.paraboloid_size, other.paraboloid_size),
            height: pick(self.height, other.height),
        }
    }

    /// Fieldwise minimum
    pub fn min(self, other: Tile) -> Tile {
        self.fold(other, f64::min, u32::min)
    }

    /// Fieldwise maximum
    pub fn max(self, other: Tile) -> Tile {
        self.fold(other, f64::max, u32::max)
    }
}

#[derive(Debug, Default)]
struct TileTable {
    tiles: HexArray<Option<Tile>>,
    recorded: usize,
    min: Option<Tile>,
    max: Option<Tile>,
}

/// Tiles by lattice address with running extremes
#[derive(Debug, Default)]
pub struct TileMap {
    inner: Mutex<TileTable>,
}

impl TileMap {
    /// Empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `tile` at `address` and widen the running extremes
    pub fn record(&self, address: Eisenstein, tile: Tile) {
        let mut table = self.inner.lock();
        let slot = table.tiles.get_mut(address);
        if slot.is_none() {
            table.recorded += 1;
        }
        *table.tiles.get_mut(address) = Some(tile);
        table.min = Some(table.min.map_or(tile, |m| m.min(tile)));
        table.max = Some(table.max.map_or(tile, |m| m.max(tile)));
    }

    /// Tile at `address`, if one was recorded
    pub fn get(&self, address: Eisenstein) -> Option<Tile> {
        self.inner.lock().tiles.get(address).copied().flatten()
    }

    /// Number of recorded tiles
    pub fn len(&self) -> usize {
        self.inner.lock().recorded
    }

    /// True if no tile was recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fieldwise minimum over recorded tiles
    pub fn min(&self) -> Option<Tile> {
        self.inner.lock().min
    }

    /// Fieldwise maximum over recorded tiles
    pub fn max(&self) -> Option<Tile> {
        self.inner.lock().max
    }

    /// Every recorded tile with its address
    pub fn snapshot(&self) -> Vec<(Eisenstein, Tile)> {
        let table = self.inner.lock();
        table
            .tiles
            .iter()
            .filter_map(|(a, t)| t.map(|t| (a, t)))
            .collect()
    }

    /// Forget every tile
    pub fn clear(&self) {
        *self.inner.lock() = TileTable::default();
    }
}

/// Slope of the least-squares plane `z = sx·x + sy·y + c`, `None` when the
/// points do not span a plane
pub fn fit_plane(points: &[Xyz]) -> Option<Xy> {
    let mut m = [[0.0f64; 3]; 3];
    let mut v = [0.0f64; 3];
    for p in points {
        let row = [p.x, p.y, 1.0];
        for i in 0..3 {
            for j in 0..3 {
                m[i][j] += row[i] * row[j];
            }
            v[i] += row[i] * p.z;
        }
    }
    let det = |m: &[[f64; 3]; 3]| {
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    };
    let d = det(&m);
    let scale = m[0][0].abs().max(m[1][1].abs()).max(m[2][2].abs()).max(1.0);
    if d.abs() <= 1e-12 * scale.powi(3) {
        return None;
    }
    // Cramer's rule for the two slope terms
    let solve = |col: usize| {
        let mut mc = m;
        for (row, value) in mc.iter_mut().zip(v) {
            row[col] = value;
        }
        det(&mc) / d
    };
    let slope = Xy::new(solve(0), solve(1));
    (!slope.is_nan()).then_some(slope)
}

/// Bucket of a horizontal offset: 0 for the central disc, 1..=6 for the
/// 60° sectors of the surrounding ring
fn sector(offset: Xy, radius: f64) -> usize {
    if offset.length() < radius / 7f64.sqrt() {
        return 0;
    }
    let s = (offset.y.atan2(offset.x) * 3.0 / PI).round() as i64;
    (s.rem_euclid(6) + 1) as usize
}

/// Statistics of the points in a cylinder of `radius` centred on `center`
pub fn tile_stats(points: &[Xyz], center: Xy, radius: f64) -> Option<Tile> {
    if points.is_empty() {
        return None;
    }
    let local: Vec<Xyz> = points.iter().map(|p| *p - Xyz::from((center, 0.0))).collect();
    let mut slope = fit_plane(&local).unwrap_or_default();
    if slope.length() > 1.0 {
        slope = slope / slope.length();
    }
    let untilted: Vec<Xyz> = local
        .iter()
        .map(|p| Xyz::new(p.x, p.y, p.z - slope.dot(p.xy())))
        .collect();

    let (lo, hi) = untilted
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| (lo.min(p.z), hi.max(p.z)));

    let mut histo = [0u32; 7];
    for p in untilted.iter().filter(|p| p.z < lo + 2.0 * radius) {
        histo[sector(p.xy(), radius)] += 1;
    }
    let spread: f64 = histo.iter().map(|&h| (h as f64).powi(2)).sum();
    let density = spread.sqrt() * 7f64.sqrt() / (PI * radius * radius);

    Some(Tile {
        n_points: points.len() as u32,
        density,
        paraboloid_size: if density > 0.0 { 1.0 / density.sqrt() } else { 0.0 },
        height: hi - lo,
        ..Tile::default()
    })
}

/// Scan the tile at `address` of the engine's traversal and record it.
///
/// Returns `None` for a tile with no points.
pub fn scan_tile(engine: &Engine, address: Eisenstein, worker: WorkerId) -> Result<Option<Tile>> {
    let traversal = engine
        .traversal()
        .ok_or_else(|| Error::internal("scan without a traversal"))?;
    let cylinder = traversal.cylinder(address);
    let points: Vec<Xyz> = engine
        .store()
        .points_in(&cylinder, worker)?
        .into_points()
        .into_iter()
        .map(|p| p.location)
        .collect();
    let tile = tile_stats(&points, cylinder.center(), cylinder.radius());
    if let Some(tile) = tile {
        engine.tiles().record(address, tile);
    }
    Ok(tile)
}
