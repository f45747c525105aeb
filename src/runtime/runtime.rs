//! # The runtime facade.
//!
//! [`MeshRuntime`] owns the root tier, the link router, and the shared
//! shell. It is the only entry point applications need: tier management,
//! push routing, uplinks, and graceful shutdown all hang off it.

use std::sync::Arc;

use crate::addr::Address;
use crate::envelope::{Envelope, EnvelopeSink};
use crate::error::{RoutingError, RuntimeError};
use crate::events::{Bus, EventKind, RuntimeEvent};
use crate::link::{LinkKey, LinkRouter, PushRequest, Uplink};
use crate::tier::TierBinding;

use super::shell::Shell;

/// A running mesh: the root tier tree plus its router.
pub struct MeshRuntime {
    shell: Arc<Shell>,
    root: Arc<dyn TierBinding>,
    router: LinkRouter,
}

impl MeshRuntime {
    pub(crate) fn new(shell: Arc<Shell>, root: Arc<dyn TierBinding>, router: LinkRouter) -> Self {
        Self {
            shell,
            root,
            router,
        }
    }

    /// The root binding.
    pub fn root(&self) -> &Arc<dyn TierBinding> {
        &self.root
    }

    /// The event bus; subscribe for runtime events.
    pub fn bus(&self) -> Bus {
        self.shell.bus.clone()
    }

    /// Resolves the tier at `address`, creating missing tiers on the way.
    ///
    /// New tiers are brought up to their parent's phase before they are
    /// returned.
    pub async fn open_or_create(
        &self,
        address: &Address,
    ) -> Result<Arc<dyn TierBinding>, RoutingError> {
        self.router.open_or_create(address).await
    }

    /// Resolves the tier at `address` without creating anything.
    pub async fn resolve(&self, address: &Address) -> Result<Arc<dyn TierBinding>, RoutingError> {
        self.router.resolve(address).await
    }

    /// Closes the tier at `address` (the whole tree for the root address).
    ///
    /// Returns `false` when the address does not resolve.
    pub async fn close(&self, address: &Address) -> bool {
        if address.is_root() {
            self.root.close().await;
            return true;
        }
        let name = match address.local_key() {
            Some(name) => name.to_string(),
            None => return false,
        };
        match self.router.resolve(&address.parent()).await {
            Ok(parent) => parent.close_child(address.kind(), &name).await,
            Err(_) => false,
        }
    }

    /// Routes a push to its target tier, creating missing tiers on the way.
    pub async fn push_down(&self, request: PushRequest) {
        self.router.push_down(request).await;
    }

    /// Forwards an envelope toward the gateway.
    pub async fn push_up(&self, envelope: Envelope) {
        self.router.push_up(envelope).await;
    }

    /// Opens an uplink onto the node at `address`.
    ///
    /// Refusals come back as an already-closed responder uplink.
    pub async fn open_uplink(
        &self,
        address: &Address,
        key: LinkKey,
        peer: Arc<dyn EnvelopeSink>,
    ) -> Arc<dyn Uplink> {
        self.router.open_uplink(address, key, peer).await
    }

    /// Closes the uplink under `key` at `address`.
    pub async fn close_uplink(&self, address: &Address, key: &LinkKey) -> bool {
        self.router.close_uplink(address, key).await
    }

    /// Shuts the runtime down: cancels workers and closes the whole tree.
    ///
    /// Waits up to the configured grace for the close cascade; with a zero
    /// grace the cascade runs in the background and this returns at once.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.shell
            .bus
            .publish(RuntimeEvent::now(EventKind::ShutdownRequested));
        self.shell.token.cancel();

        let grace = self.shell.config.grace;
        if grace.is_zero() {
            let root = Arc::clone(&self.root);
            self.shell.stage.execute(Box::pin(async move {
                root.close().await;
            }));
            return Ok(());
        }

        match tokio::time::timeout(grace, self.root.close()).await {
            Ok(()) => {
                self.shell
                    .bus
                    .publish(RuntimeEvent::now(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_) => {
                self.shell.bus.publish(
                    RuntimeEvent::now(EventKind::GraceExceeded)
                        .with_reason(format!("grace {grace:?} exceeded")),
                );
                Err(RuntimeError::GraceExceeded { grace })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::TierKind;
    use crate::envelope::EnvelopeKind;
    use crate::lifecycle::Phase;
    use crate::policy::{AccessPolicy, Credentials, Decision, Directive, Operation};
    use crate::runtime::MeshRuntimeBuilder;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingPeer {
        sent: Mutex<Vec<Envelope>>,
    }

    #[async_trait]
    impl EnvelopeSink for RecordingPeer {
        async fn send(&self, envelope: Envelope) {
            self.sent.lock().push(envelope);
        }
    }

    #[tokio::test]
    async fn test_open_or_create_builds_started_path() {
        let runtime = MeshRuntimeBuilder::new().build().await;
        let addr = Address::parse("/part/p1/host/h1/node/n1").unwrap();
        let node = runtime.open_or_create(&addr).await.unwrap();

        assert_eq!(node.kind(), TierKind::Node);
        assert_eq!(node.phase(), Phase::Started);
        assert!(runtime.resolve(&Address::part("p1")).await.is_ok());
        assert!(runtime
            .resolve(&Address::part("p1").and_host("h1"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_resolve_does_not_create() {
        let runtime = MeshRuntimeBuilder::new().build().await;
        let addr = Address::part("p1");
        let err = runtime.resolve(&addr).await.unwrap_err();
        assert!(matches!(err, RoutingError::NotFound { .. }));
        // Still absent afterwards.
        assert!(runtime.resolve(&addr).await.is_err());
    }

    #[tokio::test]
    async fn test_push_reaches_uplinked_peer() {
        let runtime = MeshRuntimeBuilder::new().build().await;
        let addr = Address::part("p1").and_node("n1");
        runtime.open_or_create(&addr).await.unwrap();

        let peer = Arc::new(RecordingPeer::default());
        let uplink = runtime
            .open_uplink(&addr, LinkKey::new("peer"), peer.clone() as Arc<dyn EnvelopeSink>)
            .await;
        assert!(!uplink.is_closed());

        let delivered = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&delivered);
        runtime
            .push_down(
                PushRequest::new(Envelope::event(addr.clone(), "payload")).on_deliver(move || {
                    flag.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .await;
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(delivered.load(Ordering::SeqCst), 1);
        let kinds: Vec<EnvelopeKind> = peer.sent.lock().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EnvelopeKind::Linked, EnvelopeKind::Event]);
    }

    #[tokio::test]
    async fn test_uplink_on_missing_target_refuses_without_phantom() {
        let runtime = MeshRuntimeBuilder::new().build().await;
        let addr = Address::part("p1").and_node("n1");

        let peer = Arc::new(RecordingPeer::default());
        let responder = runtime
            .open_uplink(&addr, LinkKey::new("peer"), peer.clone() as Arc<dyn EnvelopeSink>)
            .await;
        assert!(responder.is_closed());
        assert_eq!(peer.sent.lock()[0].kind, EnvelopeKind::NotFound);
        // The refusal created nothing.
        assert!(runtime.resolve(&addr).await.is_err());

        // After the target exists, the same attempt succeeds.
        runtime.open_or_create(&addr).await.unwrap();
        let uplink = runtime
            .open_uplink(&addr, LinkKey::new("peer"), peer.clone() as Arc<dyn EnvelopeSink>)
            .await;
        assert!(!uplink.is_closed());
    }

    struct DenyLinks;

    impl AccessPolicy for DenyLinks {
        fn authenticate(&self, _credentials: &Credentials) -> Directive {
            Directive::Accept
        }

        fn authorize(&self, _address: &Address, operation: Operation) -> Decision {
            match operation {
                Operation::Link => Decision::Deny,
                _ => Decision::Allow,
            }
        }
    }

    #[tokio::test]
    async fn test_denied_link_yields_deny_envelope() {
        let runtime = MeshRuntimeBuilder::new()
            .with_policy(Arc::new(DenyLinks))
            .build()
            .await;
        let addr = Address::part("p1").and_node("n1");
        runtime.open_or_create(&addr).await.unwrap();

        let peer = Arc::new(RecordingPeer::default());
        let responder = runtime
            .open_uplink(&addr, LinkKey::new("peer"), peer.clone() as Arc<dyn EnvelopeSink>)
            .await;
        assert!(responder.is_closed());
        assert_eq!(peer.sent.lock()[0].kind, EnvelopeKind::Deny);
    }

    struct DenyPush;

    impl AccessPolicy for DenyPush {
        fn authenticate(&self, _credentials: &Credentials) -> Directive {
            Directive::Accept
        }

        fn authorize(&self, _address: &Address, operation: Operation) -> Decision {
            match operation {
                Operation::Push => Decision::Deny,
                _ => Decision::Allow,
            }
        }
    }

    #[tokio::test]
    async fn test_denied_push_settles_declined() {
        let runtime = MeshRuntimeBuilder::new()
            .with_policy(Arc::new(DenyPush))
            .build()
            .await;
        let addr = Address::part("p1").and_node("n1");

        let declined = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&declined);
        runtime
            .push_down(
                PushRequest::new(Envelope::event(addr.clone(), "x")).on_decline(move || {
                    flag.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .await;

        assert_eq!(declined.load(Ordering::SeqCst), 1);
        // Denied pushes create nothing.
        assert!(runtime.resolve(&Address::part("p1")).await.is_err());
    }

    #[tokio::test]
    async fn test_close_address_and_shutdown() {
        let runtime = MeshRuntimeBuilder::new().build().await;
        let addr = Address::part("p1").and_node("n1");
        let node = runtime.open_or_create(&addr).await.unwrap();

        assert!(runtime.close(&addr).await);
        assert_eq!(node.phase(), Phase::Closed);
        assert!(runtime.resolve(&addr).await.is_err());
        assert!(!runtime.close(&addr).await);

        runtime.shutdown().await.unwrap();
        assert_eq!(runtime.root().phase(), Phase::Closed);
    }

    #[tokio::test]
    async fn test_push_up_without_gateway_is_reported() {
        let runtime = MeshRuntimeBuilder::new().build().await;
        let mut rx = runtime.bus().subscribe();
        runtime
            .push_up(Envelope::event(Address::part("p1"), "up"))
            .await;

        let mut declined = false;
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::PushDeclined && ev.reason.as_deref() == Some("no_gateway") {
                declined = true;
            }
        }
        assert!(declined);
    }

    #[tokio::test]
    async fn test_push_up_reaches_gateway() {
        let gateway = Arc::new(RecordingPeer::default());
        let runtime = MeshRuntimeBuilder::new()
            .with_gateway(gateway.clone() as Arc<dyn EnvelopeSink>)
            .build()
            .await;
        runtime
            .push_up(Envelope::event(Address::part("p1"), "up"))
            .await;
        assert_eq!(gateway.sent.lock().len(), 1);
    }
}
