//! The engine aggregate: everything a worker needs, built once at startup
//! and shared by `Arc`.

use super::config::Config;
use crate::geometry::Cube;
use crate::lattice::Flowsnake;
use crate::log_info;
use crate::scan::TileMap;
use crate::storage::{BlockStore, MemoryProbe};
use crate::types::Result;
use arc_swap::ArcSwapOption;
use std::sync::Arc;

/// Store, traversal and tile map of one run
#[derive(Debug)]
pub struct Engine {
    config: Config,
    store: BlockStore,
    traversal: ArcSwapOption<Flowsnake>,
    tiles: TileMap,
}

impl Engine {
    /// Validate `config` and open a store covering `root`
    pub fn open(config: Config, root: Cube) -> Result<Self> {
        config.validate()?;
        let store = BlockStore::open(root, config.store_options())?;
        Ok(Self::assemble(config, store))
    }

    /// Like [`open`](Self::open) with an explicit memory probe
    pub fn open_with_probe(config: Config, root: Cube, probe: Arc<dyn MemoryProbe>) -> Result<Self> {
        config.validate()?;
        let store = BlockStore::open_with_probe(root, config.store_options(), probe)?;
        Ok(Self::assemble(config, store))
    }

    fn assemble(config: Config, store: BlockStore) -> Self {
        Self {
            config,
            store,
            traversal: ArcSwapOption::empty(),
            tiles: TileMap::new(),
        }
    }

    /// Configuration the engine was opened with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The block store
    pub fn store(&self) -> &BlockStore {
        &self.store
    }

    /// Number of workers the store accepts
    pub fn workers(&self) -> usize {
        self.store.workers()
    }

    /// Scanned tiles
    pub fn tiles(&self) -> &TileMap {
        &self.tiles
    }

    /// Current traversal, if one is installed
    pub fn traversal(&self) -> Option<Arc<Flowsnake>> {
        self.traversal.load_full()
    }

    /// Install a traversal of the store's extent at `spacing`
    pub fn install_traversal(&self, spacing: f64) -> Arc<Flowsnake> {
        let snake = Arc::new(Flowsnake::new(&self.store.root(), spacing));
        log_info!(
            "traversal at scale {}: {} tiles, spacing {:.3}",
            snake.scale(),
            snake.len(),
            snake.spacing()
        );
        self.traversal.store(Some(Arc::clone(&snake)));
        snake
    }

    /// Replace or remove the traversal
    pub fn set_traversal(&self, traversal: Option<Arc<Flowsnake>>) {
        self.traversal.store(traversal);
    }
}
