//! # The tier context trait.
//!
//! A [`TierContext`] is the node's view of its surroundings: the scheduler,
//! policy, persistence, the event bus, and the path upward through its
//! parent. Bindings never hold their parent directly; everything above a
//! node reaches it through its context, which keeps the tree composable and
//! lets tests stub the environment.

use std::sync::Arc;

use async_trait::async_trait;

use crate::addr::Address;
use crate::envelope::Envelope;
use crate::error::HookError;
use crate::events::Bus;
use crate::policy::AccessPolicy;
use crate::stage::Stage;
use crate::store::StoreHandle;

use super::binding::TierBinding;

/// Environment handed to one tier node.
#[async_trait]
pub trait TierContext: Send + Sync + 'static {
    /// The address of the node this context belongs to.
    fn address(&self) -> &Address;

    /// The scheduler for deferred work.
    fn stage(&self) -> Arc<dyn Stage>;

    /// The access policy consulted at creation and link time.
    fn policy(&self) -> Arc<dyn AccessPolicy>;

    /// Opens the durable store for `address`.
    fn open_store(&self, address: &Address) -> StoreHandle;

    /// The runtime event bus.
    fn bus(&self) -> Bus;

    /// Forwards an envelope toward the gateway above the root.
    async fn push_up(&self, envelope: Envelope);

    /// Propagates a failure notification one level up.
    fn report_failure(&self, error: &HookError);

    /// Observes a freshly constructed child before it is installed.
    ///
    /// The returned binding is what gets installed; returning a wrapper
    /// composes application behavior onto the child. The default is a
    /// passthrough.
    fn inject_child(&self, child: Arc<dyn TierBinding>) -> Arc<dyn TierBinding> {
        child
    }
}
