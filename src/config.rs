//! # Global runtime configuration.
//!
//! Provides [`RuntimeConfig`], the centralized settings for the mesh runtime.
//!
//! ## Sentinel values
//! - `idle_timeout = 0s` → idle uplinks are never reaped
//! - `grace = 0s` → shutdown does not wait for the close cascade

use std::time::Duration;

use crate::flow::FlowConfig;

/// Global configuration for the mesh runtime.
///
/// ## Field semantics
/// - `grace`: maximum wait for the root close cascade during shutdown
///   (`0s` = do not wait)
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped)
/// - `idle_timeout`: uplinks idle longer than this are closed (`0s` = never)
/// - `flow`: per-link flow-control counters and target demand
///
/// ## Notes
/// All fields are public for flexibility. Prefer the helper accessors to
/// avoid sprinkling sentinel checks across the codebase.
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Maximum time to wait for the close cascade before reporting
    /// `RuntimeError::GraceExceeded`.
    pub grace: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow observers that lag behind more than `bus_capacity` events will
    /// skip older items. Minimum value is 1 (enforced by the accessor).
    pub bus_capacity: usize,

    /// Idle window after which an uplink with no traffic is closed.
    ///
    /// `Duration::ZERO` disables idle reaping. The sentinel is resolved per
    /// uplink via [`FlowConfig::idle_timeout_opt`] once the runtime merges
    /// this level with the per-flow setting.
    pub idle_timeout: Duration,

    /// Default flow-control configuration applied to each new uplink.
    pub flow: FlowConfig,
}

impl RuntimeConfig {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for RuntimeConfig {
    /// Default configuration:
    ///
    /// - `grace = 30s` (reasonable shutdown window)
    /// - `bus_capacity = 1024` (good baseline)
    /// - `idle_timeout = 0s` (idle reaping disabled)
    /// - `flow = FlowConfig::default()`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(30),
            bus_capacity: 1024,
            idle_timeout: Duration::ZERO,
            flow: FlowConfig::default(),
        }
    }
}
