//! The worker loop

use super::actions::{Action, ActionResult};
use super::backoff::Backoff;
use super::phase::Phase;
use super::scheduler::Shared;
use crate::types::{Result, WorkerId};
use crate::{log_debug, log_warn};
use std::sync::Arc;
use std::time::Instant;

pub(crate) fn run_worker(shared: Arc<Shared>, worker: WorkerId) {
    let mut backoff = Backoff::new(shared.worker_count(), shared.max_backoff_ms);
    loop {
        let phase = shared.phase();
        shared.set_status(worker, phase, false);
        if phase == Phase::Stop {
            break;
        }
        let started = Instant::now();
        let worked = match step(&shared, worker, phase) {
            Ok(worked) => worked,
            Err(e) => {
                shared.report(worker, e);
                true
            }
        };
        if worked {
            shared.op_time.record(started.elapsed());
            backoff.shorten();
        } else {
            let pause = backoff.lengthen(shared.op_time.get_ms());
            shared.set_status(worker, phase, true);
            std::thread::sleep(pause);
        }
    }
    log_debug!("worker {} stopped", worker);
}

/// One unit of the phase's work; false if there was none
fn step(shared: &Shared, worker: WorkerId, phase: Phase) -> Result<bool> {
    match phase {
        Phase::Ingest => match shared.buffers.debuffer(worker) {
            Some(point) => {
                shared.engine.store().put(point, worker)?;
                Ok(true)
            }
            None => Ok(false),
        },
        Phase::Scan | Phase::PostScan | Phase::Classify => {
            let (Some(task), Some(snake)) = (shared.task(phase), shared.engine.traversal()) else {
                return Ok(false);
            };
            match snake.next() {
                Some(address) => {
                    task.run(&shared.engine, address, worker)?;
                    Ok(true)
                }
                None => Ok(false),
            }
        }
        Phase::Wait | Phase::Pause => {
            if phase == Phase::Wait && worker != 0 {
                return Ok(false);
            }
            match shared.actions.pop() {
                Some(action) => {
                    let result = perform(shared, action, phase);
                    shared.results.push(result);
                    Ok(true)
                }
                None => Ok(false),
            }
        }
        Phase::Stop => Ok(false),
    }
}

fn perform(shared: &Shared, action: Action, phase: Phase) -> ActionResult {
    let kind = action.kind();
    let failed = |error: String| ActionResult::Failed { action: kind, error };
    let store = shared.engine.store();
    match action {
        Action::Load(_) if phase == Phase::Pause => failed("cannot load while paused".into()),
        Action::Load(source) => {
            let name = source.name().to_string();
            let bounds = source.bounds();
            let (mut points, mut out_of_bounds) = (0u64, 0u64);
            for point in source {
                if !bounds.contains_point(point.location) {
                    out_of_bounds += 1;
                }
                shared.buffers.embuffer(point);
                points += 1;
            }
            if out_of_bounds > 0 {
                log_warn!("{}: {} points outside the declared bounds", name, out_of_bounds);
                store.record_outside_declared(out_of_bounds);
            }
            log_debug!("{}: {} points buffered", name, points);
            ActionResult::Loaded { name, points, out_of_bounds }
        }
        Action::Flush => match store.flush() {
            Ok(n) => ActionResult::Flushed(n),
            Err(e) => failed(e.to_string()),
        },
        Action::Resize(capacity) => match store.resize(capacity) {
            Ok(n) => ActionResult::Resized(n),
            Err(e) => failed(e.to_string()),
        },
        Action::RestartTraversal => match shared.engine.traversal() {
            Some(snake) => {
                snake.restart();
                ActionResult::Restarted
            }
            None => failed("no traversal installed".into()),
        },
    }
}
