//! The coordinator: drives the workers through ingest, scan and flush for
//! one point source.

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use wolkenbase_core::scan::Tile;
use wolkenbase_core::storage::{MemoryProbe, Pressure};
use wolkenbase_core::structures::Octree;
use wolkenbase_core::system::Anomalies;
use wolkenbase_core::threads::{Action, ActionResult, Backoff, PointSource};
use wolkenbase_core::{log_info, log_warn};
use wolkenbase_core::{Config, Engine, Phase, Result, Scheduler};

/// Worker slot the coordinator uses for its own queries while the pool is
/// paused
const COORDINATOR: usize = 0;

/// Summary of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Source name
    pub source: String,
    /// Points read from the source
    pub points_ingested: u64,
    /// Points outside the source's declared bounds
    pub outside_declared_bounds: u64,
    /// Anomalies counted by the store
    pub anomalies: Anomalies,
    /// Tiles with points
    pub tiles: usize,
    /// Fieldwise minimum tile
    pub min_tile: Option<Tile>,
    /// Fieldwise maximum tile
    pub max_tile: Option<Tile>,
    /// Points in the store after the run
    pub stored_points: usize,
    /// Blocks created
    pub blocks: u64,
    /// Buffers written by the final flush
    pub flushed: usize,
    /// Wall time in milliseconds
    pub elapsed_ms: u64,
}

/// Ingest `source`, scan it tile by tile and flush, probing system memory
pub fn run<S: PointSource + 'static>(config: Config, source: S) -> Result<RunReport> {
    let root = Octree::size_fit(&source.bounds().corners());
    let engine = Engine::open(config, root)?;
    drive(Arc::new(engine), source)
}

/// [`run`] with an explicit memory probe
pub fn run_with_probe<S: PointSource + 'static>(
    config: Config,
    source: S,
    probe: Arc<dyn MemoryProbe>,
) -> Result<RunReport> {
    let root = Octree::size_fit(&source.bounds().corners());
    let engine = Engine::open_with_probe(config, root, probe)?;
    drive(Arc::new(engine), source)
}

fn drive<S: PointSource>(engine: Arc<Engine>, source: S) -> Result<RunReport> {
    let started = Instant::now();
    let name = source.name().to_string();
    let declared = source.bounds();
    let scheduler = Scheduler::start(Arc::clone(&engine))?;
    scheduler.wait_for_phase(Phase::Wait)?;

    scheduler.wait_for_phase(Phase::Ingest)?;
    let mut backoff = Backoff::new(scheduler.workers(), engine.config().scheduler.max_backoff_ms);
    let (mut ingested, mut outside) = (0u64, 0u64);
    for point in source {
        while engine.store().pool().pressure() == Pressure::Low && scheduler.buffered() > 0 {
            std::thread::sleep(backoff.lengthen(0.0));
        }
        backoff.shorten();
        if !declared.contains_point(point.location) {
            outside += 1;
        }
        scheduler.embuffer(point);
        ingested += 1;
    }
    if outside > 0 {
        log_warn!("{}: {} points outside the declared bounds", name, outside);
        engine.store().record_outside_declared(outside);
    }
    scheduler.wait_for_idle()?;
    log_info!("{}: {} points ingested into {} blocks", name, ingested, engine.store().block_count());

    let snake = engine.install_traversal(engine.config().traversal.spacing);
    scheduler.wait_for_phase(Phase::Scan)?;
    scheduler.wait_for_idle()?;
    log_info!("scan done: {} of {} tiles hold points", engine.tiles().len(), snake.len());

    scheduler.wait_for_phase(Phase::Pause)?;
    scheduler.push_action(Action::Flush);
    scheduler.wait_for_idle()?;
    let mut flushed = 0;
    while let Some(result) = scheduler.pop_result() {
        match result {
            ActionResult::Flushed(n) => flushed += n,
            ActionResult::Failed { action, error } => log_warn!("{} failed: {}", action, error),
            other => log_info!("action result: {:?}", other),
        }
    }
    let stored_points = engine.store().count_in(&engine.store().root(), COORDINATOR)?;

    scheduler.join()?;

    let anomalies = engine.store().anomalies();
    if anomalies.total() > 0 {
        log_warn!(
            "{} duplicate, {} missing, {} out-of-bounds, {} outside declared bounds",
            anomalies.duplicate_points,
            anomalies.missing_points,
            anomalies.out_of_bounds_points,
            anomalies.outside_declared_points
        );
    }
    Ok(RunReport {
        source: name,
        points_ingested: ingested,
        outside_declared_bounds: outside,
        anomalies,
        tiles: engine.tiles().len(),
        min_tile: engine.tiles().min(),
        max_tile: engine.tiles().max(),
        stored_points,
        blocks: engine.store().block_count(),
        flushed,
        elapsed_ms: started.elapsed().as_millis() as u64,
    })
}
