//! # Proxies: transparent composition over tier bindings.
//!
//! A [`TierProxy`] forwards every [`TierBinding`] method to an inner
//! binding. Applications subclass the pattern by wrapping a proxy (or
//! implementing [`TierBinding`] directly around one) and overriding the few
//! methods they care about; a [`TierDecorator`] applies such wrappers to
//! every child the runtime creates.
//!
//! Since callers only ever see `Arc<dyn TierBinding>`, decoration is
//! invisible to routing, lifecycle cascades, and tests.

use std::sync::Arc;

use async_trait::async_trait;

use crate::addr::{Address, TierKind};
use crate::envelope::EnvelopeSink;
use crate::error::{HookError, RoutingError};
use crate::lifecycle::Phase;
use crate::link::{LinkKey, PushRequest, Uplink};

use super::binding::TierBinding;

/// Wraps freshly created tier bindings before they are installed.
pub trait TierDecorator: Send + Sync + 'static {
    /// Returns the binding to install in place of `inner`.
    fn decorate(&self, inner: Arc<dyn TierBinding>) -> Arc<dyn TierBinding>;
}

/// Pure pass-through binding wrapper.
pub struct TierProxy {
    inner: Arc<dyn TierBinding>,
}

impl TierProxy {
    /// Wraps `inner`.
    pub fn new(inner: Arc<dyn TierBinding>) -> Self {
        Self { inner }
    }

    /// The wrapped binding.
    pub fn inner(&self) -> &Arc<dyn TierBinding> {
        &self.inner
    }
}

#[async_trait]
impl TierBinding for TierProxy {
    fn kind(&self) -> TierKind {
        self.inner.kind()
    }

    fn address(&self) -> &Address {
        self.inner.address()
    }

    fn phase(&self) -> Phase {
        self.inner.phase()
    }

    fn has_reached(&self, phase: Phase) -> bool {
        self.inner.has_reached(phase)
    }

    async fn open(&self) {
        self.inner.open().await;
    }

    async fn load(&self) {
        self.inner.load().await;
    }

    async fn start(&self) {
        self.inner.start().await;
    }

    async fn stop(&self) {
        self.inner.stop().await;
    }

    async fn unload(&self) {
        self.inner.unload().await;
    }

    async fn close(&self) {
        self.inner.close().await;
    }

    fn get_child(&self, kind: TierKind, name: &str) -> Option<Arc<dyn TierBinding>> {
        self.inner.get_child(kind, name)
    }

    async fn open_or_create_child(
        &self,
        kind: TierKind,
        name: &str,
    ) -> Result<Arc<dyn TierBinding>, RoutingError> {
        self.inner.open_or_create_child(kind, name).await
    }

    async fn close_child(&self, kind: TierKind, name: &str) -> bool {
        self.inner.close_child(kind, name).await
    }

    async fn push(&self, request: PushRequest) {
        self.inner.push(request).await;
    }

    async fn open_uplink(&self, key: LinkKey, peer: Arc<dyn EnvelopeSink>) -> Arc<dyn Uplink> {
        self.inner.open_uplink(key, peer).await
    }

    async fn close_uplink(&self, key: &LinkKey) -> bool {
        self.inner.close_uplink(key).await
    }

    fn did_fail(&self, error: &HookError) {
        self.inner.did_fail(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{Envelope, EnvelopeKind};
    use crate::runtime::MeshRuntimeBuilder;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Wraps every new binding in `layers` pass-through proxies.
    struct Layering {
        layers: usize,
    }

    impl TierDecorator for Layering {
        fn decorate(&self, inner: Arc<dyn TierBinding>) -> Arc<dyn TierBinding> {
            (0..self.layers).fold(inner, |binding, _| Arc::new(TierProxy::new(binding)))
        }
    }

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
    async fn test_proxy_layers_are_observationally_inert() {
        let runtime = MeshRuntimeBuilder::new()
            .with_decorator(Arc::new(Layering { layers: 3 }))
            .build()
            .await;
        let addr = Address::part("p1").and_node("n1");
        let node = runtime.open_or_create(&addr).await.unwrap();
        assert_eq!(node.kind(), TierKind::Node);
        assert_eq!(node.address(), &addr);
        assert_eq!(node.phase(), Phase::Started);

        // Links and pushes behave exactly as without proxies.
        let peer = Arc::new(RecordingPeer::default());
        let uplink = node
            .open_uplink(LinkKey::new("k"), peer.clone() as Arc<dyn EnvelopeSink>)
            .await;
        assert!(!uplink.is_closed());

        let delivered = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&delivered);
        node.push(
            PushRequest::new(Envelope::event(addr.clone(), "payload")).on_deliver(move || {
                flag.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
        let kinds: Vec<EnvelopeKind> = peer.sent.lock().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EnvelopeKind::Linked, EnvelopeKind::Event]);

        // The close cascade passes through the layers.
        assert!(runtime.close(&addr).await);
        assert_eq!(node.phase(), Phase::Closed);
    }

    /// Proxy that records its tag when `start` passes through it.
    struct TagProxy {
        tag: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        inner: Arc<dyn TierBinding>,
    }

    #[async_trait]
    impl TierBinding for TagProxy {
        fn kind(&self) -> TierKind {
            self.inner.kind()
        }

        fn address(&self) -> &Address {
            self.inner.address()
        }

        fn phase(&self) -> Phase {
            self.inner.phase()
        }

        fn has_reached(&self, phase: Phase) -> bool {
            self.inner.has_reached(phase)
        }

        async fn open(&self) {
            self.inner.open().await;
        }

        async fn load(&self) {
            self.inner.load().await;
        }

        async fn start(&self) {
            self.log.lock().push(self.tag);
            self.inner.start().await;
        }

        async fn stop(&self) {
            self.inner.stop().await;
        }

        async fn unload(&self) {
            self.inner.unload().await;
        }

        async fn close(&self) {
            self.inner.close().await;
        }

        fn get_child(&self, kind: TierKind, name: &str) -> Option<Arc<dyn TierBinding>> {
            self.inner.get_child(kind, name)
        }

        async fn open_or_create_child(
            &self,
            kind: TierKind,
            name: &str,
        ) -> Result<Arc<dyn TierBinding>, RoutingError> {
            self.inner.open_or_create_child(kind, name).await
        }

        async fn close_child(&self, kind: TierKind, name: &str) -> bool {
            self.inner.close_child(kind, name).await
        }

        async fn push(&self, request: PushRequest) {
            self.inner.push(request).await;
        }

        async fn open_uplink(&self, key: LinkKey, peer: Arc<dyn EnvelopeSink>) -> Arc<dyn Uplink> {
            self.inner.open_uplink(key, peer).await
        }

        async fn close_uplink(&self, key: &LinkKey) -> bool {
            self.inner.close_uplink(key).await
        }

        fn did_fail(&self, error: &HookError) {
            self.inner.did_fail(error);
        }
    }

    struct Tagging {
        tag: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl TierDecorator for Tagging {
        fn decorate(&self, inner: Arc<dyn TierBinding>) -> Arc<dyn TierBinding> {
            Arc::new(TagProxy {
                tag: self.tag,
                log: Arc::clone(&self.log),
                inner,
            })
        }
    }

    #[tokio::test]
    async fn test_last_registered_decorator_is_outermost() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let runtime = MeshRuntimeBuilder::new()
            .with_decorator(Arc::new(Tagging {
                tag: "inner",
                log: Arc::clone(&log),
            }))
            .with_decorator(Arc::new(Tagging {
                tag: "outer",
                log: Arc::clone(&log),
            }))
            .build()
            .await;

        runtime.open_or_create(&Address::part("p1")).await.unwrap();
        assert_eq!(log.lock().as_slice(), ["outer", "inner"]);
    }
}
