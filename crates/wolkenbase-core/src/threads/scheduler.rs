//! The scheduler: a fixed pool of workers steered by one shared phase.
//!
//! The coordinator sets the phase and waits for every worker to report it.
//! Workers poll the phase on every loop iteration and do one unit of the
//! phase's work per iteration: a buffered point in `Ingest`, a tile in the
//! traversal phases, a queued action in `Wait` and `Pause`.

use super::actions::{Action, ActionResult, TileTask};
use super::backoff::OpTime;
use super::phase::{decode_status, status_word, Phase};
use super::point_buffer::PointBuffers;
use super::worker::run_worker;
use crate::constants::ASLEEP;
use crate::core::Engine;
use crate::scan::ScanTask;
use crate::types::{Error, LasPoint, Result, WorkerId};
use crate::{log_debug, log_error, log_info};
use ahash::AHashMap;
use crossbeam::queue::SegQueue;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// State shared by the coordinator and every worker
pub(crate) struct Shared {
    pub(crate) engine: Arc<Engine>,
    command: AtomicU32,
    status: Vec<AtomicU32>,
    pub(crate) actions: SegQueue<Action>,
    pub(crate) results: SegQueue<ActionResult>,
    pub(crate) buffers: PointBuffers,
    tasks: RwLock<AHashMap<Phase, Arc<dyn TileTask>>>,
    pub(crate) op_time: OpTime,
    pub(crate) max_backoff_ms: f64,
    errors: AtomicU64,
    fatal: Mutex<Option<String>>,
}

impl Shared {
    pub(crate) fn phase(&self) -> Phase {
        Phase::from_code(self.command.load(Ordering::SeqCst)).unwrap_or(Phase::Stop)
    }

    pub(crate) fn set_status(&self, worker: WorkerId, phase: Phase, asleep: bool) {
        self.status[worker].store(status_word(phase, asleep), Ordering::SeqCst);
    }

    pub(crate) fn task(&self, phase: Phase) -> Option<Arc<dyn TileTask>> {
        self.tasks.read().get(&phase).cloned()
    }

    pub(crate) fn worker_count(&self) -> usize {
        self.status.len()
    }

    /// Count a failed unit of work; fatal errors stop every worker
    pub(crate) fn report(&self, worker: WorkerId, error: Error) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        if error.is_fatal() {
            log_error!("worker {} hit a fatal error, stopping: {}", worker, error);
            self.fatal.lock().get_or_insert_with(|| error.to_string());
            self.command.store(Phase::Stop.code(), Ordering::SeqCst);
        } else {
            log_error!("worker {}: {}", worker, error);
        }
    }

    fn check_fatal(&self) -> Result<()> {
        match self.fatal.lock().as_ref() {
            Some(msg) => Err(Error::internal(format!("workers stopped: {}", msg))),
            None => Ok(()),
        }
    }
}

/// Snapshot of the worker status words
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadStatus {
    /// Phase the coordinator asked for
    pub commanded: Phase,
    /// True if every worker reports the same phase
    pub unanimous: bool,
    /// The phase all workers report, if they agree
    pub state: Option<Phase>,
    /// Workers currently asleep
    pub asleep: usize,
}

impl ThreadStatus {
    /// True once every worker has entered the commanded phase
    pub fn settled(&self) -> bool {
        self.unanimous && self.state == Some(self.commanded)
    }
}

/// Fixed pool of worker threads
pub struct Scheduler {
    shared: Arc<Shared>,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    /// Start one worker per store worker slot, all in `Wait`.
    ///
    /// The scan phase runs [`ScanTask`] until another task is registered.
    pub fn start(engine: Arc<Engine>) -> Result<Self> {
        let workers = engine.workers();
        let mut tasks: AHashMap<Phase, Arc<dyn TileTask>> = AHashMap::new();
        tasks.insert(Phase::Scan, Arc::new(ScanTask));
        let shared = Arc::new(Shared {
            max_backoff_ms: engine.config().scheduler.max_backoff_ms,
            engine,
            command: AtomicU32::new(Phase::Wait.code()),
            status: (0..workers).map(|_| AtomicU32::new(0)).collect(),
            actions: SegQueue::new(),
            results: SegQueue::new(),
            buffers: PointBuffers::new(workers),
            tasks: RwLock::new(tasks),
            op_time: OpTime::new(),
            errors: AtomicU64::new(0),
            fatal: Mutex::new(None),
        });

        let mut scheduler = Self {
            shared,
            handles: Vec::with_capacity(workers),
        };
        for worker in 0..workers {
            let shared = Arc::clone(&scheduler.shared);
            let handle = std::thread::Builder::new()
                .name(format!("wolken-worker-{}", worker))
                .spawn(move || run_worker(shared, worker))?;
            scheduler.handles.push(handle);
        }
        log_info!("started {} workers", workers);
        Ok(scheduler)
    }

    /// The engine the workers share
    pub fn engine(&self) -> &Arc<Engine> {
        &self.shared.engine
    }

    /// Number of workers
    pub fn workers(&self) -> usize {
        self.shared.worker_count()
    }

    /// Run `task` on every tile in `phase`
    pub fn register_task(&self, phase: Phase, task: Arc<dyn TileTask>) -> Result<()> {
        if !phase.uses_traversal() {
            return Err(Error::config(format!("phase {} does not run tile tasks", phase)));
        }
        log_debug!("task {} registered for {}", task.name(), phase);
        self.shared.tasks.write().insert(phase, task);
        Ok(())
    }

    /// Commanded phase
    pub fn phase(&self) -> Phase {
        self.shared.phase()
    }

    /// Command a phase without waiting for the workers
    pub fn set_phase(&self, phase: Phase) {
        log_debug!("phase -> {}", phase);
        self.shared.command.store(phase.code(), Ordering::SeqCst);
    }

    /// Command `phase` and wait until every worker reports it
    pub fn wait_for_phase(&self, phase: Phase) -> Result<()> {
        self.set_phase(phase);
        loop {
            self.shared.check_fatal()?;
            let lagging = self
                .shared
                .status
                .iter()
                .filter(|s| decode_status(s.load(Ordering::SeqCst)).0 != Some(phase))
                .count();
            if lagging == 0 {
                return Ok(());
            }
            std::thread::sleep(Duration::from_millis(lagging as u64));
        }
    }

    /// Snapshot of the status words
    pub fn status(&self) -> ThreadStatus {
        let words: Vec<u32> = self
            .shared
            .status
            .iter()
            .map(|s| s.load(Ordering::SeqCst))
            .collect();
        let phases: Vec<u32> = words.iter().map(|w| w & !ASLEEP).collect();
        let unanimous = phases.windows(2).all(|w| w[0] == w[1]);
        ThreadStatus {
            commanded: self.phase(),
            unanimous,
            state: if unanimous {
                phases.first().and_then(|&c| Phase::from_code(c))
            } else {
                None
            },
            asleep: words.iter().filter(|&&w| w & ASLEEP != 0).count(),
        }
    }

    /// Fraction of workers awake
    pub fn busy_fraction(&self) -> f64 {
        let n = self.workers();
        (n - self.status().asleep) as f64 / n as f64
    }

    /// Queue an action for the next worker that takes actions
    pub fn push_action(&self, action: Action) {
        log_debug!("queued {}", action.kind());
        self.shared.actions.push(action);
    }

    /// Oldest unread action result
    pub fn pop_result(&self) -> Option<ActionResult> {
        self.shared.results.pop()
    }

    /// Actions not yet taken
    pub fn pending_actions(&self) -> usize {
        self.shared.actions.len()
    }

    /// Hand a point to the ingest workers
    pub fn embuffer(&self, point: LasPoint) {
        self.shared.buffers.embuffer(point);
    }

    /// Points buffered but not yet stored
    pub fn buffered(&self) -> usize {
        self.shared.buffers.len()
    }

    /// Units of work that failed
    pub fn errors(&self) -> u64 {
        self.shared.errors.load(Ordering::SeqCst)
    }

    fn outstanding(&self) -> usize {
        let phase = self.phase();
        let mut n = self.shared.actions.len();
        if phase == Phase::Ingest {
            n += self.shared.buffers.len();
        }
        if phase.uses_traversal() && self.shared.task(phase).is_some() {
            if let Some(snake) = self.shared.engine.traversal() {
                n += usize::from(!snake.is_exhausted());
            }
        }
        n + self
            .shared
            .status
            .iter()
            .map(|s| decode_status(s.load(Ordering::SeqCst)))
            .filter(|&(p, asleep)| p != Some(phase) || !asleep)
            .count()
    }

    /// Wait until the commanded phase has no work left and every worker
    /// sleeps in it
    pub fn wait_for_idle(&self) -> Result<()> {
        loop {
            self.shared.check_fatal()?;
            let n = self.outstanding();
            if n == 0 {
                return Ok(());
            }
            std::thread::sleep(Duration::from_millis(n.min(50) as u64));
        }
    }

    fn stop_workers(&mut self) -> Result<()> {
        self.shared.command.store(Phase::Stop.code(), Ordering::SeqCst);
        let mut panicked = 0;
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                panicked += 1;
            }
        }
        if panicked > 0 {
            return Err(Error::internal(format!("{} workers panicked", panicked)));
        }
        Ok(())
    }

    /// Stop every worker and wait for them to exit
    pub fn join(mut self) -> Result<()> {
        self.stop_workers()?;
        log_info!("workers joined");
        self.shared.check_fatal()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            let _ = self.stop_workers();
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("workers", &self.workers())
            .field("phase", &self.phase())
            .field("buffered", &self.buffered())
            .finish()
    }
}
