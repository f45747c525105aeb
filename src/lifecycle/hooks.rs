//! # Lifecycle hook trait.
//!
//! Application tiers observe their own lifecycle by implementing
//! [`Lifecycle`]. Every transition invokes, in order: the `will` hook, the
//! phase action (cascading into children), then the `did` hook.
//!
//! ## Failure semantics
//! - Hook errors and panics are caught at the node boundary and reported
//!   toward the root as `did_fail` notifications; they never stall sibling
//!   subtrees.
//! - A failing `will` hook aborts the transition (the phase claim is
//!   released and the action does not run).
//! - A failing `did` hook is reported; the phase stands.

use std::sync::Arc;

use async_trait::async_trait;

use crate::addr::Address;
use crate::error::HookError;

/// Lifecycle hooks for one tier node. All methods default to no-ops.
#[async_trait]
pub trait Lifecycle: Send + Sync + 'static {
    /// Runs before the node becomes visible in the tree.
    async fn will_open(&self) -> Result<(), HookError> {
        Ok(())
    }

    /// Runs after the node (and its known children) opened.
    async fn did_open(&self) -> Result<(), HookError> {
        Ok(())
    }

    /// Runs before durable state is attached.
    async fn will_load(&self) -> Result<(), HookError> {
        Ok(())
    }

    /// Runs after durable state is attached.
    async fn did_load(&self) -> Result<(), HookError> {
        Ok(())
    }

    /// Runs before the node starts running.
    async fn will_start(&self) -> Result<(), HookError> {
        Ok(())
    }

    /// Runs after the node started.
    async fn did_start(&self) -> Result<(), HookError> {
        Ok(())
    }

    /// Runs before the node stops running.
    async fn will_stop(&self) -> Result<(), HookError> {
        Ok(())
    }

    /// Runs after the node stopped.
    async fn did_stop(&self) -> Result<(), HookError> {
        Ok(())
    }

    /// Runs before durable state is released.
    async fn will_unload(&self) -> Result<(), HookError> {
        Ok(())
    }

    /// Runs after durable state is released.
    async fn did_unload(&self) -> Result<(), HookError> {
        Ok(())
    }

    /// Runs before the node closes.
    async fn will_close(&self) -> Result<(), HookError> {
        Ok(())
    }

    /// Runs after the node closed. The node is terminal at this point.
    async fn did_close(&self) -> Result<(), HookError> {
        Ok(())
    }

    /// Observes a failure reported by this node or one of its descendants.
    ///
    /// Called on every ancestor as the notification propagates toward the
    /// root. Must not panic; keep it cheap.
    fn did_fail(&self, _error: &HookError) {}
}

/// Produces the lifecycle hooks for newly created tier nodes.
///
/// Attached through the runtime builder; consulted once per node at
/// construction time, keyed by the node's address.
pub trait LifecycleFactory: Send + Sync + 'static {
    /// Returns the hooks for the node at `address`.
    fn hooks_for(&self, address: &Address) -> Arc<dyn Lifecycle>;
}

/// Default hooks: every method is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

#[async_trait]
impl Lifecycle for NoHooks {}

impl LifecycleFactory for NoHooks {
    fn hooks_for(&self, _address: &Address) -> Arc<dyn Lifecycle> {
        Arc::new(NoHooks)
    }
}
