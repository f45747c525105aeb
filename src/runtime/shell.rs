//! # Shared runtime environment.
//!
//! One [`Shell`] is built per runtime and threaded through every tier node,
//! uplink, and the router. It bundles the collaborator seams (stage, policy,
//! persistence, gateway, hook factory), the event bus, the decorator chain,
//! and the shutdown token.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::RuntimeConfig;
use crate::envelope::{Envelope, EnvelopeSink};
use crate::events::{Bus, EventKind, RuntimeEvent};
use crate::flow::FlowConfig;
use crate::lifecycle::LifecycleFactory;
use crate::policy::AccessPolicy;
use crate::stage::Stage;
use crate::store::Persistence;
use crate::tier::{TierBinding, TierDecorator};

/// Everything a tier node needs from the runtime that built it.
pub(crate) struct Shell {
    pub(crate) config: RuntimeConfig,
    pub(crate) stage: Arc<dyn Stage>,
    pub(crate) policy: Arc<dyn AccessPolicy>,
    pub(crate) persistence: Arc<dyn Persistence>,
    pub(crate) gateway: Option<Arc<dyn EnvelopeSink>>,
    pub(crate) hooks: Arc<dyn LifecycleFactory>,
    pub(crate) bus: Bus,
    pub(crate) decorators: Vec<Arc<dyn TierDecorator>>,
    pub(crate) token: CancellationToken,
}

impl Shell {
    /// Applies the decorator chain to a freshly created binding, innermost
    /// decorator first.
    pub(crate) fn decorate(&self, node: Arc<dyn TierBinding>) -> Arc<dyn TierBinding> {
        self.decorators
            .iter()
            .fold(node, |inner, decorator| decorator.decorate(inner))
    }

    /// Forwards an envelope to the gateway above the root.
    ///
    /// Without a gateway the envelope is dropped with a `PushDeclined`
    /// report.
    pub(crate) async fn push_up(&self, envelope: Envelope) {
        match &self.gateway {
            Some(gateway) => gateway.send(envelope).await,
            None => self.bus.publish(
                RuntimeEvent::now(EventKind::PushDeclined)
                    .with_address(&envelope.to)
                    .with_reason("no_gateway"),
            ),
        }
    }

    /// Flow configuration for a new uplink; the runtime-level idle timeout
    /// applies when the flow config does not set its own.
    pub(crate) fn uplink_flow(&self) -> FlowConfig {
        let mut flow = self.config.flow;
        if flow.idle_timeout.is_zero() {
            flow.idle_timeout = self.config.idle_timeout;
        }
        flow
    }
}
