//! Tile scanning: the default work of the scan phase

/// Tiles, the tile map and the per-tile statistics
pub mod tile;

pub use tile::{fit_plane, scan_tile, tile_stats, Tile, TileMap};

use crate::core::Engine;
use crate::lattice::Eisenstein;
use crate::threads::TileTask;
use crate::types::{Result, WorkerId};

/// Gathers [`Tile`] statistics for every address it is given
#[derive(Debug, Default, Clone, Copy)]
pub struct ScanTask;

impl TileTask for ScanTask {
    fn name(&self) -> &str {
        "scan"
    }

    fn run(&self, engine: &Engine, address: Eisenstein, worker: WorkerId) -> Result<()> {
        scan_tile(engine, address, worker).map(|_| ())
    }
}
