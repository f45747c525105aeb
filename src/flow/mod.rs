//! # Credit-based flow control for uplinks.
//!
//! Each uplink carries a [`FlowController`] that meters push traffic with
//! three counters packed into a single atomic word:
//!
//! ```text
//!   supply ──feed──► demand ──push──► buffer ──ack──► (settled)
//!      ▲                 │
//!      └──── skip ───────┘  (drop one pending item, keep the credit)
//! ```
//!
//! - **supply**: items offered but not yet admitted downstream
//! - **demand**: credits granted to the consumer, not yet pushed
//! - **buffer**: pushed items awaiting acknowledgment
//!
//! ## Invariants
//! - Every counter stays within `[0, max]` for its configured bound.
//! - All three counters move under single CAS transitions; no partial states
//!   are observable.
//! - A bound violation is a protocol fault: the controller latches, declines
//!   all pending work, and reports through [`FlowSink::on_fault`].

mod controller;
mod state;

pub use controller::{FlowController, FlowSink};
pub use state::{Admission, FlowCounters, FlowState};

use std::time::Duration;

/// Bounds and pacing knobs for one flow controller.
///
/// All counter bounds are clamped to the packed-field width (`2^20 - 1`).
#[derive(Debug, Clone, Copy)]
pub struct FlowConfig {
    /// Upper bound on the supply counter.
    pub supply_max: u32,
    /// Upper bound on outstanding demand credits.
    pub demand_max: u32,
    /// Upper bound on unacknowledged pushes.
    pub buffer_max: u32,
    /// Demand level `generate_demand` refills toward (clamped to
    /// `demand_max`).
    pub target_demand: u32,
    /// How long an idle uplink lives before being reaped.
    ///
    /// `Duration::ZERO` disables idle reaping.
    pub idle_timeout: Duration,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            supply_max: 4096,
            demand_max: 32,
            buffer_max: 32,
            target_demand: 16,
            idle_timeout: Duration::ZERO,
        }
    }
}

impl FlowConfig {
    /// Idle timeout with the zero sentinel mapped to `None`.
    pub fn idle_timeout_opt(&self) -> Option<Duration> {
        if self.idle_timeout.is_zero() {
            None
        } else {
            Some(self.idle_timeout)
        }
    }
}
