//! # Scheduler seam.
//!
//! The core has no scheduler of its own; deferred work (idle watchers,
//! off-thread hook dispatch, transport admission) runs on an external
//! [`Stage`]. The default [`TokioStage`] spawns onto the ambient tokio
//! runtime.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// A unit of deferred work.
pub type BoxTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Narrow scheduling capability consumed by the core.
pub trait Stage: Send + Sync + 'static {
    /// Runs the task as soon as the executor allows.
    fn execute(&self, task: BoxTask);

    /// Runs the task after `delay`.
    fn set_timer(&self, delay: Duration, task: BoxTask);
}

/// Default stage backed by the ambient tokio runtime.
///
/// Requires a running tokio runtime; every spawn is detached.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioStage;

impl Stage for TokioStage {
    fn execute(&self, task: BoxTask) {
        tokio::spawn(task);
    }

    fn set_timer(&self, delay: Duration, task: BoxTask) {
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
    }
}
