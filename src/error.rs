//! Error types used by the meshvisor runtime.
//!
//! This module defines the failure taxonomy of the core:
//!
//! - [`RoutingError`] — a push or link request could not reach its target.
//! - [`FlowFault`] — a flow-control counter violated its configured bound;
//!   fatal for the owning link only.
//! - [`HookError`] — a lifecycle hook failed; caught at the node boundary and
//!   reported upward, never thrown across tiers.
//! - [`RuntimeError`] — failures of the runtime itself (shutdown grace).
//!
//! All types provide `as_label()` / `as_message()` helpers for logs/metrics.

use std::time::Duration;
use thiserror::Error;

use crate::lifecycle::Phase;

/// # Errors surfaced when a request cannot be routed to its target tier.
///
/// Routing errors are non-fatal: they are reported to the requester as a
/// terminal decline (or a structured envelope for uplinks) and never affect
/// sibling tiers.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    /// No tier exists at the address and creation was not requested (or failed).
    #[error("no tier at {address}")]
    NotFound {
        /// Display form of the unresolved address.
        address: String,
    },

    /// The access policy denied the operation; no tier was created.
    #[error("access denied for {address}")]
    Unauthorized {
        /// Display form of the denied address.
        address: String,
    },

    /// The target tier cannot contain the requested child kind.
    #[error("{address} cannot route to the requested child")]
    NotRoutable {
        /// Display form of the non-container address.
        address: String,
    },

    /// The target tier reached its terminal phase; a fresh tier must be created.
    #[error("tier at {address} is closed")]
    Closed {
        /// Display form of the closed address.
        address: String,
    },
}

impl RoutingError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RoutingError::NotFound { .. } => "route_not_found",
            RoutingError::Unauthorized { .. } => "route_unauthorized",
            RoutingError::NotRoutable { .. } => "route_not_routable",
            RoutingError::Closed { .. } => "route_closed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        self.to_string()
    }
}

/// # Protocol faults raised by the credit-based flow controller.
///
/// Exceeding any configured counter maximum is unrecoverable for that link:
/// the link is torn down, its flow state discarded, and every pending item is
/// declined. Other links are unaffected.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowFault {
    /// `supply` would exceed its configured maximum (application backlog full).
    #[error("supply counter would exceed {limit}")]
    SupplyOverrun {
        /// The configured `supply_max`.
        limit: u32,
    },

    /// `demand` would exceed its configured maximum (protocol window full).
    #[error("demand counter would exceed {limit}")]
    DemandOverrun {
        /// The configured `demand_max`.
        limit: u32,
    },

    /// `buffer` would exceed its configured maximum (transport buffer full).
    #[error("buffer counter would exceed {limit}")]
    BufferOverrun {
        /// The configured `buffer_max`.
        limit: u32,
    },

    /// A counter would go negative: the transport reported progress the
    /// controller never admitted.
    #[error("flow counter underrun")]
    Underrun,

    /// The link is closing or already torn down; no new work is accepted.
    #[error("link closed")]
    Closed,
}

impl FlowFault {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            FlowFault::SupplyOverrun { .. } => "flow_supply_overrun",
            FlowFault::DemandOverrun { .. } => "flow_demand_overrun",
            FlowFault::BufferOverrun { .. } => "flow_buffer_overrun",
            FlowFault::Underrun => "flow_underrun",
            FlowFault::Closed => "flow_closed",
        }
    }

    /// Returns a human-readable message with details about the fault.
    pub fn as_message(&self) -> String {
        self.to_string()
    }

    /// True when the fault tears the link down (any bound violation).
    ///
    /// `Closed` is not fatal: it only signals that the link stopped accepting
    /// new work.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, FlowFault::Closed)
    }
}

/// # A lifecycle hook failure, caught at the node boundary.
///
/// Hook errors never propagate as exceptions across tiers; they travel as
/// discrete `did_fail` notifications toward the root. A failing `will` hook
/// aborts its transition; a failing action or `did` hook is reported and the
/// phase stands.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{phase} hook failed: {message}")]
pub struct HookError {
    /// The phase whose hook failed.
    pub phase: Phase,
    /// Failure description (error message or panic payload).
    pub message: String,
}

impl HookError {
    /// Creates a new hook error for the given phase.
    pub fn new(phase: Phase, message: impl Into<String>) -> Self {
        Self {
            phase,
            message: message.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        "hook_failed"
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        self.to_string()
    }
}

/// # Errors produced by the runtime itself.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; part of the tree remained open.
    #[error("shutdown grace {grace:?} exceeded; root subtree still closing")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_labels_are_stable() {
        let err = RoutingError::NotFound {
            address: "/part/p1".into(),
        };
        assert_eq!(err.as_label(), "route_not_found");
        assert!(err.as_message().contains("/part/p1"));
    }

    #[test]
    fn test_flow_fault_fatality() {
        assert!(FlowFault::SupplyOverrun { limit: 8 }.is_fatal());
        assert!(FlowFault::Underrun.is_fatal());
        assert!(!FlowFault::Closed.is_fatal());
    }

    #[test]
    fn test_hook_error_carries_phase() {
        let err = HookError::new(Phase::Opened, "boom");
        assert_eq!(err.phase, Phase::Opened);
        assert!(err.as_message().contains("boom"));
    }
}
