//! # The link router: address resolution and push routing.
//!
//! [`LinkRouter`] walks the tier tree from the root along an address's
//! coordinates. Downward pushes create missing tiers on demand; uplink
//! opens never create, and a miss is answered with a structured terminal
//! envelope through an error responder instead of an error return.
//!
//! ## Rules
//! - `push_down` settles its request exactly once: declined on any routing
//!   or policy failure, delivered otherwise.
//! - A refused uplink leaves no entry anywhere; retrying after the target
//!   appears succeeds normally.
//! - `push_up` is the mirror path toward the gateway; the router never
//!   inspects envelope bodies.

use std::sync::Arc;

use crate::addr::Address;
use crate::envelope::{Envelope, EnvelopeKind, EnvelopeSink};
use crate::error::RoutingError;
use crate::events::{EventKind, RuntimeEvent};
use crate::policy::{Decision, Operation};
use crate::runtime::Shell;
use crate::tier::TierBinding;

use super::push::PushRequest;
use super::uplink::{ErrorResponder, LinkKey, Uplink};

/// Routes pushes and link attempts through the tier tree.
pub struct LinkRouter {
    root: Arc<dyn TierBinding>,
    shell: Arc<Shell>,
}

impl LinkRouter {
    pub(crate) fn new(root: Arc<dyn TierBinding>, shell: Arc<Shell>) -> Self {
        Self { root, shell }
    }

    async fn descend(
        &self,
        address: &Address,
        create: bool,
    ) -> Result<Arc<dyn TierBinding>, RoutingError> {
        let mut current = Arc::clone(&self.root);
        for (kind, name) in address.coordinates() {
            current = if create {
                current.open_or_create_child(kind, &name).await?
            } else {
                current
                    .get_child(kind, &name)
                    .ok_or_else(|| RoutingError::NotFound {
                        address: address.to_string(),
                    })?
            };
        }
        Ok(current)
    }

    /// Resolves the binding at `address` without creating anything.
    pub async fn resolve(&self, address: &Address) -> Result<Arc<dyn TierBinding>, RoutingError> {
        self.descend(address, false).await
    }

    /// Resolves the binding at `address`, creating missing tiers on the way.
    pub async fn open_or_create(
        &self,
        address: &Address,
    ) -> Result<Arc<dyn TierBinding>, RoutingError> {
        self.descend(address, true).await
    }

    /// Routes a push downward to its target tier, creating missing tiers.
    ///
    /// Any failure (policy, routing) declines the request and publishes
    /// `PushDeclined`; otherwise the target settles it.
    pub async fn push_down(&self, request: PushRequest) {
        let address = request.envelope().to.clone();
        if self.shell.policy.authorize(&address, Operation::Push) == Decision::Deny {
            self.decline(request, &address, "route_unauthorized");
            return;
        }
        match self.descend(&address, true).await {
            Ok(target) => target.push(request).await,
            Err(error) => self.decline(request, &address, error.as_label()),
        }
    }

    /// Forwards an envelope upward toward the gateway.
    pub async fn push_up(&self, envelope: Envelope) {
        self.shell.push_up(envelope).await;
    }

    /// Opens an uplink onto the node at `address`.
    ///
    /// Refusals (denied, no such tier) come back as an already-closed
    /// responder uplink whose terminal envelope has been sent to `peer`.
    pub async fn open_uplink(
        &self,
        address: &Address,
        key: LinkKey,
        peer: Arc<dyn EnvelopeSink>,
    ) -> Arc<dyn Uplink> {
        if self.shell.policy.authorize(address, Operation::Link) == Decision::Deny {
            return ErrorResponder::refuse(
                key,
                address.clone(),
                EnvelopeKind::Deny,
                &peer,
                &self.shell.bus,
            )
            .await;
        }
        match self.descend(address, false).await {
            Ok(node) => node.open_uplink(key, peer).await,
            Err(_) => {
                ErrorResponder::refuse(
                    key,
                    address.clone(),
                    EnvelopeKind::NotFound,
                    &peer,
                    &self.shell.bus,
                )
                .await
            }
        }
    }

    /// Closes the uplink under `key` at `address`. Returns `false` when the
    /// address or key does not resolve.
    pub async fn close_uplink(&self, address: &Address, key: &LinkKey) -> bool {
        match self.descend(address, false).await {
            Ok(node) => node.close_uplink(key).await,
            Err(_) => false,
        }
    }

    fn decline(&self, request: PushRequest, address: &Address, reason: &'static str) {
        self.shell.bus.publish(
            RuntimeEvent::now(EventKind::PushDeclined)
                .with_address(address)
                .with_reason(reason),
        );
        request.settle_declined();
    }
}
