//! # Runtime events emitted by the tier tree, link router, and flow control.
//!
//! The [`EventKind`] enum classifies events across four categories:
//! - **Tier events**: lifecycle transitions and failures
//! - **Table events**: child installation and race-loss discards
//! - **Link events**: uplink lifecycle, refusals, faults, idle reaping
//! - **Push events**: terminal outcomes of push requests
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore the exact order when events are
//! delivered out of order.
//!
//! ## Example
//! ```rust
//! use meshvisor::{Address, EventKind, RuntimeEvent};
//!
//! let ev = RuntimeEvent::now(EventKind::PushDeclined)
//!     .with_address(&Address::part("p1"))
//!     .with_reason("route_not_found");
//!
//! assert_eq!(ev.kind, EventKind::PushDeclined);
//! assert_eq!(ev.address.as_deref(), Some("/part/p1"));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::SystemTime;

use crate::addr::Address;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Tier lifecycle events ===
    /// A tier node completed its `opened` transition.
    TierOpened,
    /// A tier node completed its `loaded` transition.
    TierLoaded,
    /// A tier node completed its `started` transition.
    TierStarted,
    /// A tier node completed its `stopped` transition.
    TierStopped,
    /// A tier node completed its `unloaded` transition.
    TierUnloaded,
    /// A tier node reached its terminal `closed` phase.
    TierClosed,
    /// A lifecycle hook failed; the failure is propagating toward the root.
    ///
    /// Sets `address` (the failing node) and `reason` (the hook error).
    TierFailed,

    // === Child table events ===
    /// A child tier was installed into its parent's table.
    ChildInstalled,
    /// A speculative child lost the installation race and was discarded.
    ///
    /// Not an error; the loser closes without ever opening.
    ChildDiscarded,

    // === Link events ===
    /// An uplink was opened onto a node.
    ///
    /// Sets `address` and `link` (the link key).
    UplinkOpened,
    /// An uplink closed (gracefully or through teardown).
    UplinkClosed,
    /// An uplink attempt was refused with a terminal envelope
    /// (target missing or unauthorized). Sets `reason`.
    UplinkRefused,
    /// A flow-control counter bound was violated; the link is torn down.
    ///
    /// Sets `link` and `reason` (the fault label).
    LinkFault,
    /// An idle uplink was reaped after the configured idle timeout.
    IdleTimeout,

    // === Push events ===
    /// A push request reached its target and settled as delivered.
    PushDelivered,
    /// A push request settled as declined. Sets `reason`.
    PushDeclined,

    // === Observer events ===
    /// An observer dropped an event (queue full or worker closed).
    ObserverOverflow,
    /// An observer panicked while processing an event.
    ObserverPanicked,

    // === Shutdown events ===
    /// Runtime shutdown was requested.
    ShutdownRequested,
    /// The close cascade finished within the configured grace.
    AllStoppedWithin,
    /// The close cascade exceeded the configured grace.
    GraceExceeded,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Debug, Clone)]
pub struct RuntimeEvent {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Display form of the subject address, if applicable.
    pub address: Option<Arc<str>>,
    /// Link key, if applicable.
    pub link: Option<Arc<str>>,
    /// Human-readable reason (error labels, fault labels, etc.).
    pub reason: Option<Arc<str>>,
}

impl RuntimeEvent {
    /// Creates a new event of the given kind with the current timestamp and
    /// next sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            address: None,
            link: None,
            reason: None,
        }
    }

    /// Attaches the subject address (stored in display form).
    #[inline]
    pub fn with_address(mut self, address: &Address) -> Self {
        self.address = Some(address.to_string().into());
        self
    }

    /// Attaches a link key.
    #[inline]
    pub fn with_link(mut self, link: impl Into<Arc<str>>) -> Self {
        self.link = Some(link.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// True for events emitted by the observer fan-out itself.
    ///
    /// Used to suppress feedback loops: overflow of an overflow report is
    /// dropped silently.
    #[inline]
    pub fn is_observer_report(&self) -> bool {
        matches!(
            self.kind,
            EventKind::ObserverOverflow | EventKind::ObserverPanicked
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_is_monotonic() {
        let a = RuntimeEvent::now(EventKind::TierOpened);
        let b = RuntimeEvent::now(EventKind::TierClosed);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_builder_attachment() {
        let ev = RuntimeEvent::now(EventKind::LinkFault)
            .with_address(&Address::part("p1").and_host("h1"))
            .with_link("peer-7")
            .with_reason("flow_demand_overrun");
        assert_eq!(ev.address.as_deref(), Some("/part/p1/host/h1"));
        assert_eq!(ev.link.as_deref(), Some("peer-7"));
        assert_eq!(ev.reason.as_deref(), Some("flow_demand_overrun"));
    }

    #[test]
    fn test_observer_report_classification() {
        assert!(RuntimeEvent::now(EventKind::ObserverOverflow).is_observer_report());
        assert!(!RuntimeEvent::now(EventKind::PushDelivered).is_observer_report());
    }
}
