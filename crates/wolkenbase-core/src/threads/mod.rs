//! Worker threads: phases, back-off, point buffers, actions and the
//! scheduler that drives them

/// Queued actions and the traits workers run
pub mod actions;
/// Idle back-off
pub mod backoff;
/// Global phase
pub mod phase;
/// Shuffle buffers for ingest
pub mod point_buffer;
/// The worker pool
pub mod scheduler;
mod worker;

pub use crate::types::WorkerId;
pub use actions::{Action, ActionResult, PointSource, TileTask};
pub use backoff::{Backoff, OpTime};
pub use phase::Phase;
pub use point_buffer::PointBuffers;
pub use scheduler::{Scheduler, ThreadStatus};
