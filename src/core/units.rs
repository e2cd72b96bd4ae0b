//! Unit-tagged trial timestamps and the fixation window.
//!
//! Event timestamps in the raw files and the stored tables are in
//! seconds relative to trial start. Display layers work in
//! milliseconds. The two units are distinct types so a rescale is an
//! explicit conversion, never an untyped multiplication.

use serde::{Deserialize, Serialize};

/// A trial-relative timestamp in seconds (the storage unit).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Seconds(pub f64);

/// A trial-relative timestamp in milliseconds (the display unit).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Millis(pub f64);

impl Seconds {
    pub fn to_millis(self) -> Millis {
        Millis(self.0 * 1000.0)
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Whether this event fired at all. Zero means the rig never wrote
    /// the event, not an event at time zero.
    pub fn is_set(self) -> bool {
        self.0 != 0.0
    }
}

impl Millis {
    pub fn value(self) -> f64 {
        self.0
    }
}

impl std::fmt::Display for Seconds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3}s", self.0)
    }
}

impl std::fmt::Display for Millis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.0}ms", self.0)
    }
}

/// The fixation interval of one trial.
///
/// Fixation either completes (`timefpoff` set) or is aborted
/// (`timefpabort` set); a trial row where both or neither event fired
/// violates the recording invariant and yields no window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FixationWindow {
    Completed { on: Seconds, off: Seconds },
    Aborted { on: Seconds, at: Seconds },
}

impl FixationWindow {
    /// Derive the fixation window from a trial's event timestamps.
    pub fn from_trial(on: Seconds, off: Seconds, abort: Seconds) -> Option<Self> {
        match (off.is_set(), abort.is_set()) {
            (true, false) => Some(FixationWindow::Completed { on, off }),
            (false, true) => Some(FixationWindow::Aborted { on, at: abort }),
            _ => None,
        }
    }

    /// Start of the fixation interval.
    pub fn start(&self) -> Seconds {
        match self {
            FixationWindow::Completed { on, .. } | FixationWindow::Aborted { on, .. } => *on,
        }
    }

    /// End of the fixation interval (completion or abort time).
    pub fn end(&self) -> Seconds {
        match self {
            FixationWindow::Completed { off, .. } => *off,
            FixationWindow::Aborted { at, .. } => *at,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, FixationWindow::Completed { .. })
    }
}
