//! # Event observer trait.
//!
//! Provides [`Observe`], the extension point for plugging custom event
//! handlers into the runtime (metrics, tracing, audit).
//!
//! Each observer gets:
//! - **a dedicated worker task** (runs independently)
//! - **a per-observer bounded queue** (capacity via [`Observe::queue_capacity`])
//! - **panic isolation** (panics are caught and reported as
//!   `EventKind::ObserverPanicked`)
//!
//! ## Rules
//! - A slow observer only affects its own queue.
//! - Queue overflow drops the event **for this observer only** and publishes
//!   `EventKind::ObserverOverflow`; other observers are unaffected.
//! - Events are processed sequentially (FIFO) per observer.

use async_trait::async_trait;

use crate::events::RuntimeEvent;

/// Asynchronous event handler attached to the runtime bus.
#[async_trait]
pub trait Observe: Send + Sync + 'static {
    /// Processes one event.
    async fn on_event(&self, event: &RuntimeEvent);

    /// Short, stable observer name (used in overflow/panic reports).
    fn name(&self) -> &'static str;

    /// Capacity of this observer's queue (clamped to ≥ 1).
    fn queue_capacity(&self) -> usize {
        1024
    }
}
