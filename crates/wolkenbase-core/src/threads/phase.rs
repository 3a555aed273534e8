//! The global phase and its status-word encoding

use crate::constants::ASLEEP;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What every worker should be doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum Phase {
    /// Not started, or waiting for the coordinator; worker 0 runs actions
    Wait = 1,
    /// Insert buffered points into the store
    Ingest = 2,
    /// Run the scan task over the traversal
    Scan = 3,
    /// Run the post-scan task over the traversal
    PostScan = 4,
    /// Run the split/classify task over the traversal
    Classify = 5,
    /// Idle; any worker runs actions
    Pause = 6,
    /// Leave the worker loop
    Stop = 7,
}

impl Phase {
    /// Every phase, in code order
    pub const ALL: [Phase; 7] = [
        Phase::Wait,
        Phase::Ingest,
        Phase::Scan,
        Phase::PostScan,
        Phase::Classify,
        Phase::Pause,
        Phase::Stop,
    ];

    /// Numeric code stored in status words
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Phase with code `code`, ignoring the asleep bit
    pub fn from_code(code: u32) -> Option<Phase> {
        let code = code & !ASLEEP;
        Phase::ALL.into_iter().find(|p| p.code() == code)
    }

    /// True for the phases that pull tiles from the traversal
    pub fn uses_traversal(self) -> bool {
        matches!(self, Phase::Scan | Phase::PostScan | Phase::Classify)
    }

    /// True for the phases in which workers run queued actions
    pub fn runs_actions(self) -> bool {
        matches!(self, Phase::Wait | Phase::Pause)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Wait => "wait",
            Phase::Ingest => "ingest",
            Phase::Scan => "scan",
            Phase::PostScan => "post-scan",
            Phase::Classify => "classify",
            Phase::Pause => "pause",
            Phase::Stop => "stop",
        };
        f.write_str(name)
    }
}

/// Status word of a worker: its phase code, plus [`ASLEEP`] while it sleeps
pub fn status_word(phase: Phase, asleep: bool) -> u32 {
    phase.code() | if asleep { ASLEEP } else { 0 }
}

/// Split a status word into phase and asleep flag
pub fn decode_status(word: u32) -> (Option<Phase>, bool) {
    (Phase::from_code(word), word & ASLEEP != 0)
}
