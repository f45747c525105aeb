//! # Uplinks: flow-controlled delivery paths out of a node.
//!
//! An uplink binds a peer ([`EnvelopeSink`]) to a node address, metering
//! deliveries through a [`FlowController`]. The concrete [`UplinkBinding`]
//! handles the link handshake (`Linked` on open, `Unlinked` on close) and
//! optional idle reaping; [`ErrorResponder`] is the degenerate uplink handed
//! back when a link attempt is refused.
//!
//! ## Rules
//! - Opening sends `Linked` to the peer before any event flows.
//! - Closing is idempotent; the first close drains the flow controller and
//!   sends `Unlinked`.
//! - Any delivery or feed refreshes the idle clock.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::addr::Address;
use crate::envelope::{Envelope, EnvelopeKind, EnvelopeSink};
use crate::error::FlowFault;
use crate::events::{Bus, EventKind, RuntimeEvent};
use crate::flow::{FlowConfig, FlowController, FlowSink};
use crate::stage::{BoxTask, Stage};

use super::push::PushRequest;

/// Identifier of one uplink within a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkKey(Arc<str>);

impl LinkKey {
    /// Creates a key from any string-like value.
    pub fn new(key: impl Into<Arc<str>>) -> Self {
        Self(key.into())
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LinkKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LinkKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// One delivery path from a node toward a peer.
#[async_trait]
pub trait Uplink: Send + Sync + 'static {
    /// The link key within the owning node.
    fn key(&self) -> &LinkKey;

    /// Address of the node this uplink hangs off.
    fn address(&self) -> &Address;

    /// Offers one request to the uplink's flow controller.
    fn feed(&self, request: PushRequest) -> Result<(), FlowFault>;

    /// Closes the uplink, declining pending work.
    async fn close(&self);

    /// True once the uplink no longer accepts work.
    fn is_closed(&self) -> bool;
}

/// Bridges admitted requests from the flow controller to the peer.
///
/// Holds the controller weakly; the controller owns the adapter through its
/// sink slot.
struct SinkAdapter {
    peer: Arc<dyn EnvelopeSink>,
    stage: Arc<dyn Stage>,
    flow: Weak<FlowController>,
    uplink: Weak<UplinkBinding>,
}

impl FlowSink for SinkAdapter {
    fn admit(&self, request: PushRequest) {
        let Some(flow) = self.flow.upgrade() else {
            request.settle_declined();
            return;
        };
        // Consume the demand credit synchronously so concurrent admissions
        // cannot overshoot the buffer bound.
        if flow.push().is_err() {
            request.settle_declined();
            return;
        }
        let peer = Arc::clone(&self.peer);
        let uplink = self.uplink.clone();
        self.stage.execute(Box::pin(async move {
            peer.send(request.envelope().clone()).await;
            request.settle_delivered();
            if let Some(binding) = uplink.upgrade() {
                binding.touch();
            }
            let _ = flow.ack();
        }));
    }

    fn on_fault(&self, fault: &FlowFault) {
        if !fault.is_fatal() {
            return;
        }
        if let Some(binding) = self.uplink.upgrade() {
            binding.report_fault(fault);
        }
    }
}

/// Live uplink bound to a peer sink.
pub struct UplinkBinding {
    key: LinkKey,
    address: Address,
    flow: Arc<FlowController>,
    peer: Arc<dyn EnvelopeSink>,
    stage: Arc<dyn Stage>,
    bus: Bus,
    closed: AtomicBool,
    token: CancellationToken,
    epoch: Instant,
    last_active_ms: AtomicU64,
}

impl UplinkBinding {
    /// Opens an uplink: wires the flow controller, sends `Linked`, publishes
    /// `UplinkOpened`, and arms the idle watcher when configured.
    pub fn open(
        key: LinkKey,
        address: Address,
        peer: Arc<dyn EnvelopeSink>,
        stage: Arc<dyn Stage>,
        config: FlowConfig,
        bus: Bus,
    ) -> Arc<Self> {
        let binding = Arc::new_cyclic(|weak_binding: &Weak<UplinkBinding>| {
            let flow = Arc::new_cyclic(|weak_flow: &Weak<FlowController>| {
                FlowController::new(
                    config,
                    Arc::new(SinkAdapter {
                        peer: Arc::clone(&peer),
                        stage: Arc::clone(&stage),
                        flow: weak_flow.clone(),
                        uplink: weak_binding.clone(),
                    }),
                )
            });
            Self {
                key,
                address,
                flow,
                peer,
                stage,
                bus,
                closed: AtomicBool::new(false),
                token: CancellationToken::new(),
                epoch: Instant::now(),
                last_active_ms: AtomicU64::new(0),
            }
        });

        let peer = Arc::clone(&binding.peer);
        let linked = Envelope::linked(binding.address.clone());
        binding.stage.execute(Box::pin(async move {
            peer.send(linked).await;
        }));
        binding.bus.publish(
            RuntimeEvent::now(EventKind::UplinkOpened)
                .with_address(&binding.address)
                .with_link(binding.key.as_str()),
        );
        if let Some(idle) = config.idle_timeout_opt() {
            Self::arm_idle_watcher(&binding, idle);
        }
        binding
    }

    /// Refreshes the idle clock.
    pub fn touch(&self) {
        let elapsed = self.epoch.elapsed().as_millis() as u64;
        self.last_active_ms.store(elapsed, Ordering::Release);
    }

    fn idle_for(&self) -> std::time::Duration {
        let now = self.epoch.elapsed().as_millis() as u64;
        let last = self.last_active_ms.load(Ordering::Acquire);
        std::time::Duration::from_millis(now.saturating_sub(last))
    }

    fn arm_idle_watcher(binding: &Arc<Self>, idle: std::time::Duration) {
        binding
            .stage
            .set_timer(idle, Self::idle_tick(Arc::downgrade(binding), idle));
    }

    /// One idle check; re-arms itself through the stage while the link is
    /// alive and active.
    fn idle_tick(weak: Weak<Self>, idle: std::time::Duration) -> BoxTask {
        Box::pin(async move {
            let Some(binding) = weak.upgrade() else { return };
            if binding.token.is_cancelled() || binding.is_closed() {
                return;
            }
            if binding.idle_for() >= idle {
                binding.bus.publish(
                    RuntimeEvent::now(EventKind::IdleTimeout)
                        .with_address(&binding.address)
                        .with_link(binding.key.as_str()),
                );
                binding.close_inner().await;
                return;
            }
            let stage = Arc::clone(&binding.stage);
            let weak = Arc::downgrade(&binding);
            drop(binding);
            stage.set_timer(idle, Self::idle_tick(weak, idle));
        })
    }

    /// Latches a fatal flow fault: publishes `LinkFault` and tears down.
    fn report_fault(self: &Arc<Self>, fault: &FlowFault) {
        self.bus.publish(
            RuntimeEvent::now(EventKind::LinkFault)
                .with_address(&self.address)
                .with_link(self.key.as_str())
                .with_reason(fault.as_label()),
        );
        let binding = Arc::clone(self);
        self.stage.execute(Box::pin(async move {
            binding.close_inner().await;
        }));
    }

    async fn close_inner(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.flow.close();
        self.token.cancel();
        self.peer.send(Envelope::unlinked(self.address.clone())).await;
        self.bus.publish(
            RuntimeEvent::now(EventKind::UplinkClosed)
                .with_address(&self.address)
                .with_link(self.key.as_str()),
        );
    }
}

#[async_trait]
impl Uplink for UplinkBinding {
    fn key(&self) -> &LinkKey {
        &self.key
    }

    fn address(&self) -> &Address {
        &self.address
    }

    fn feed(&self, request: PushRequest) -> Result<(), FlowFault> {
        if self.closed.load(Ordering::Acquire) {
            request.settle_declined();
            return Err(FlowFault::Closed);
        }
        self.touch();
        self.flow.feed(request)
    }

    async fn close(&self) {
        self.close_inner().await;
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Degenerate uplink returned when a link attempt is refused.
///
/// It is born closed: the peer receives one terminal envelope (`NotFound` or
/// `Deny`) and every feed declines. No entry is ever installed in the node's
/// uplink table for a responder.
pub struct ErrorResponder {
    key: LinkKey,
    address: Address,
}

impl ErrorResponder {
    /// Sends the terminal envelope to the peer and publishes
    /// `UplinkRefused`, returning the stub uplink.
    pub async fn refuse(
        key: LinkKey,
        address: Address,
        kind: EnvelopeKind,
        peer: &Arc<dyn EnvelopeSink>,
        bus: &Bus,
    ) -> Arc<Self> {
        let reason = match kind {
            EnvelopeKind::Deny => "unauthorized",
            _ => "not_found",
        };
        let envelope = match kind {
            EnvelopeKind::Deny => Envelope::deny(address.clone()),
            _ => Envelope::not_found(address.clone()),
        };
        peer.send(envelope).await;
        bus.publish(
            RuntimeEvent::now(EventKind::UplinkRefused)
                .with_address(&address)
                .with_link(key.as_str())
                .with_reason(reason),
        );
        Arc::new(Self { key, address })
    }
}

#[async_trait]
impl Uplink for ErrorResponder {
    fn key(&self) -> &LinkKey {
        &self.key
    }

    fn address(&self) -> &Address {
        &self.address
    }

    fn feed(&self, request: PushRequest) -> Result<(), FlowFault> {
        request.settle_declined();
        Err(FlowFault::Closed)
    }

    async fn close(&self) {}

    fn is_closed(&self) -> bool {
        true
    }
}

/// Per-node registry of live uplinks.
///
/// Reads take a snapshot; the write lock covers only map mutation, never
/// uplink or peer code.
#[derive(Default)]
pub struct UplinkTable {
    map: parking_lot::RwLock<Arc<std::collections::HashMap<LinkKey, Arc<dyn Uplink>>>>,
}

impl UplinkTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The uplink registered under `key`, if any.
    pub fn get(&self, key: &LinkKey) -> Option<Arc<dyn Uplink>> {
        self.map.read().get(key).cloned()
    }

    /// A point-in-time snapshot of all uplinks.
    pub fn snapshot(&self) -> Arc<std::collections::HashMap<LinkKey, Arc<dyn Uplink>>> {
        Arc::clone(&self.map.read())
    }

    /// Installs `uplink` under `key` unless one is already registered.
    ///
    /// Returns the previously registered uplink on conflict.
    pub fn install(
        &self,
        key: LinkKey,
        uplink: Arc<dyn Uplink>,
    ) -> Result<(), Arc<dyn Uplink>> {
        let mut guard = self.map.write();
        if let Some(existing) = guard.get(&key) {
            return Err(Arc::clone(existing));
        }
        let mut next = (**guard).clone();
        next.insert(key, uplink);
        *guard = Arc::new(next);
        Ok(())
    }

    /// Removes and returns the uplink under `key`.
    pub fn remove(&self, key: &LinkKey) -> Option<Arc<dyn Uplink>> {
        let mut guard = self.map.write();
        if !guard.contains_key(key) {
            return None;
        }
        let mut next = (**guard).clone();
        let removed = next.remove(key);
        *guard = Arc::new(next);
        removed
    }

    /// Empties the table, returning every uplink it held.
    pub fn clear(&self) -> Vec<Arc<dyn Uplink>> {
        let mut guard = self.map.write();
        let drained = guard.values().cloned().collect();
        *guard = Arc::new(std::collections::HashMap::new());
        drained
    }

    /// Number of registered uplinks.
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    /// True when no uplinks are registered.
    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::TokioStage;
    use parking_lot::Mutex;
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

    fn addr() -> Address {
        Address::part("p1").and_node("n1")
    }

    #[tokio::test]
    async fn test_open_sends_linked_then_events_then_unlinked() {
        let peer = Arc::new(RecordingPeer::default());
        let bus = Bus::new(16);
        let uplink = UplinkBinding::open(
            LinkKey::new("peer-1"),
            addr(),
            peer.clone() as Arc<dyn EnvelopeSink>,
            Arc::new(TokioStage),
            FlowConfig::default(),
            bus,
        );

        uplink
            .feed(PushRequest::new(Envelope::event(addr(), "hello")))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        uplink.close().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let kinds: Vec<EnvelopeKind> = peer.sent.lock().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![EnvelopeKind::Linked, EnvelopeKind::Event, EnvelopeKind::Unlinked]
        );
        assert!(uplink.is_closed());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let peer = Arc::new(RecordingPeer::default());
        let bus = Bus::new(16);
        let uplink = UplinkBinding::open(
            LinkKey::new("peer-1"),
            addr(),
            peer.clone() as Arc<dyn EnvelopeSink>,
            Arc::new(TokioStage),
            FlowConfig::default(),
            bus,
        );
        uplink.close().await;
        uplink.close().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let unlinked = peer
            .sent
            .lock()
            .iter()
            .filter(|e| e.kind == EnvelopeKind::Unlinked)
            .count();
        assert_eq!(unlinked, 1);
    }

    #[tokio::test]
    async fn test_feed_after_close_declines() {
        let peer = Arc::new(RecordingPeer::default());
        let bus = Bus::new(16);
        let uplink = UplinkBinding::open(
            LinkKey::new("peer-1"),
            addr(),
            peer.clone() as Arc<dyn EnvelopeSink>,
            Arc::new(TokioStage),
            FlowConfig::default(),
            bus,
        );
        uplink.close().await;

        let declined = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&declined);
        let result = uplink.feed(
            PushRequest::new(Envelope::event(addr(), "late"))
                .on_decline(move || flag.store(true, Ordering::SeqCst)),
        );
        assert!(matches!(result, Err(FlowFault::Closed)));
        assert!(declined.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_idle_watcher_reaps_and_reports() {
        let peer = Arc::new(RecordingPeer::default());
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let uplink = UplinkBinding::open(
            LinkKey::new("peer-1"),
            addr(),
            peer.clone() as Arc<dyn EnvelopeSink>,
            Arc::new(TokioStage),
            FlowConfig {
                idle_timeout: Duration::from_millis(40),
                ..FlowConfig::default()
            },
            bus,
        );

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(uplink.is_closed());

        let mut saw_idle = false;
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::IdleTimeout {
                saw_idle = true;
            }
        }
        assert!(saw_idle);
    }

    #[tokio::test]
    async fn test_idle_watcher_runs_on_stage_timers() {
        use std::sync::atomic::AtomicUsize;

        struct CountingStage {
            timers: Arc<AtomicUsize>,
        }

        impl Stage for CountingStage {
            fn execute(&self, task: BoxTask) {
                tokio::spawn(task);
            }

            fn set_timer(&self, delay: Duration, task: BoxTask) {
                self.timers.fetch_add(1, Ordering::SeqCst);
                TokioStage.set_timer(delay, task);
            }
        }

        let timers = Arc::new(AtomicUsize::new(0));
        let peer = Arc::new(RecordingPeer::default());
        let uplink = UplinkBinding::open(
            LinkKey::new("peer-1"),
            addr(),
            peer as Arc<dyn EnvelopeSink>,
            Arc::new(CountingStage {
                timers: Arc::clone(&timers),
            }),
            FlowConfig {
                idle_timeout: Duration::from_millis(30),
                ..FlowConfig::default()
            },
            Bus::new(16),
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(uplink.is_closed());
        assert!(timers.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_error_responder_declines_everything() {
        let peer = Arc::new(RecordingPeer::default());
        let bus = Bus::new(16);
        let responder = ErrorResponder::refuse(
            LinkKey::new("peer-1"),
            addr(),
            EnvelopeKind::NotFound,
            &(peer.clone() as Arc<dyn EnvelopeSink>),
            &bus,
        )
        .await;

        assert!(responder.is_closed());
        assert!(matches!(
            responder.feed(PushRequest::new(Envelope::event(addr(), "x"))),
            Err(FlowFault::Closed)
        ));
        assert_eq!(peer.sent.lock().len(), 1);
        assert_eq!(peer.sent.lock()[0].kind, EnvelopeKind::NotFound);
    }
}
