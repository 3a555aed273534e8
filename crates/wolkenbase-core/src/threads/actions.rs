//! Queued actions, their results, and the traits workers run

use crate::core::Engine;
use crate::geometry::Cube;
use crate::lattice::Eisenstein;
use crate::types::{LasPoint, Result, WorkerId};
use std::fmt;

/// A stream of points with a declared bounding cube
pub trait PointSource: Iterator<Item = LasPoint> + Send {
    /// Name shown in logs and results
    fn name(&self) -> &str;

    /// Cube every point is declared to lie in
    fn bounds(&self) -> Cube;
}

/// Work done on one tile in a traversal phase
pub trait TileTask: Send + Sync {
    /// Name shown in logs
    fn name(&self) -> &str;

    /// Process the tile at `address`
    fn run(&self, engine: &Engine, address: Eisenstein, worker: WorkerId) -> Result<()>;
}

/// Work item taken by a single worker in `Wait` or `Pause`
pub enum Action {
    /// Embuffer every point of a source
    Load(Box<dyn PointSource>),
    /// Write every dirty buffer back
    Flush,
    /// Change the buffer pool capacity
    Resize(usize),
    /// Rewind the traversal
    RestartTraversal,
}

impl Action {
    /// Short name of the action
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Load(_) => "load",
            Action::Flush => "flush",
            Action::Resize(_) => "resize",
            Action::RestartTraversal => "restart",
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Load(source) => f.debug_tuple("Load").field(&source.name()).finish(),
            Action::Flush => f.write_str("Flush"),
            Action::Resize(n) => f.debug_tuple("Resize").field(n).finish(),
            Action::RestartTraversal => f.write_str("RestartTraversal"),
        }
    }
}

/// Outcome of an [`Action`]
#[derive(Debug, Clone, PartialEq)]
pub enum ActionResult {
    /// A source was embuffered
    Loaded {
        /// Source name
        name: String,
        /// Points embuffered
        points: u64,
        /// Points outside the source's declared bounds
        out_of_bounds: u64,
    },
    /// Dirty buffers written
    Flushed(usize),
    /// Buffers retired by a resize
    Resized(usize),
    /// Traversal rewound
    Restarted,
    /// The action failed
    Failed {
        /// Action kind
        action: &'static str,
        /// Error message
        error: String,
    },
}
