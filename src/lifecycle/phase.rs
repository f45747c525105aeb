//! # Lifecycle phases.

use std::fmt;

/// One phase of the tier lifecycle.
///
/// Phases advance monotonically:
/// ```text
/// created -> opened -> loaded -> started -> (running)
/// running -> stopped -> unloaded -> closed -> (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    /// Constructed, no transition has run.
    Created,
    /// The node is visible in the tree.
    Opened,
    /// Durable state is attached.
    Loaded,
    /// The node is running.
    Started,
    /// The node stopped running.
    Stopped,
    /// Durable state is released.
    Unloaded,
    /// Terminal; the node can never be reused.
    Closed,
}

impl Phase {
    /// Claimable phases in transition order (`Created` is implicit).
    pub const TRANSITIONS: [Phase; 6] = [
        Phase::Opened,
        Phase::Loaded,
        Phase::Started,
        Phase::Stopped,
        Phase::Unloaded,
        Phase::Closed,
    ];

    /// Bit used by the atomic phase mask. `Created` has no bit.
    pub(crate) fn bit(self) -> u8 {
        match self {
            Phase::Created => 0,
            Phase::Opened => 1 << 0,
            Phase::Loaded => 1 << 1,
            Phase::Started => 1 << 2,
            Phase::Stopped => 1 << 3,
            Phase::Unloaded => 1 << 4,
            Phase::Closed => 1 << 5,
        }
    }

    /// Short stable label (snake_case) for logs/metrics.
    pub fn as_label(self) -> &'static str {
        match self {
            Phase::Created => "created",
            Phase::Opened => "opened",
            Phase::Loaded => "loaded",
            Phase::Started => "started",
            Phase::Stopped => "stopped",
            Phase::Unloaded => "unloaded",
            Phase::Closed => "closed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}
