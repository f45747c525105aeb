//! # The concrete tier node.
//!
//! [`TierNode`] implements [`TierBinding`] for every level of the tree. One
//! struct covers root, mesh, part, host, node, and lane tiers; behavior
//! differences (containment, linkability) come from [`TierKind`].
//!
//! ## Transition shape
//! Every lifecycle transition runs the same sequence:
//! ```text
//! ensure predecessor -> claim phase bit -> will hook -> phase action -> did hook -> event
//! ```
//! - Losing the claim means another caller already ran the transition; the
//!   loser returns immediately.
//! - A failing (or panicking) `will` hook releases the claim and reports;
//!   the action never runs.
//! - A failing `did` hook is reported; the phase stands.
//! - `close` is the exception: once claimed it always completes, so a
//!   subtree can never get stuck half-closed behind a failing hook.
//!
//! ## Creation race
//! `open_or_create_child` builds a speculative child outside any lock and
//! installs it with a single compare under the table's write lock. Exactly
//! one creator wins; losers close their speculative child (which never
//! reached `opened`) and return the winner.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::Mutex;

use crate::addr::{Address, TierKind};
use crate::envelope::{Envelope, EnvelopeKind, EnvelopeSink};
use crate::error::{HookError, RoutingError};
use crate::events::{Bus, EventKind, RuntimeEvent};
use crate::lifecycle::{Lifecycle, LifecycleState, Phase};
use crate::link::{ErrorResponder, LinkKey, PushRequest, Uplink, UplinkBinding, UplinkTable};
use crate::policy::{AccessPolicy, Decision, Operation};
use crate::runtime::Shell;
use crate::stage::Stage;
use crate::store::StoreHandle;

use super::binding::TierBinding;
use super::context::TierContext;
use super::table::{ChildKey, ChildTable};

/// Concrete tier node; one per address in the live tree.
pub(crate) struct TierNode {
    kind: TierKind,
    address: Address,
    state: LifecycleState,
    hooks: Arc<dyn Lifecycle>,
    context: Arc<dyn TierContext>,
    shell: Arc<Shell>,
    self_ref: Weak<TierNode>,
    children: ChildTable,
    uplinks: UplinkTable,
    store: Mutex<Option<StoreHandle>>,
}

impl TierNode {
    /// Builds the root node for a runtime.
    pub(crate) fn root(shell: Arc<Shell>) -> Arc<Self> {
        let address = Address::root();
        let hooks = shell.hooks.hooks_for(&address);
        let context = Arc::new(RootContext {
            address: address.clone(),
            shell: Arc::clone(&shell),
        });
        Self::new(TierKind::Root, address, hooks, context, shell)
    }

    fn new(
        kind: TierKind,
        address: Address,
        hooks: Arc<dyn Lifecycle>,
        context: Arc<dyn TierContext>,
        shell: Arc<Shell>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            kind,
            address,
            state: LifecycleState::new(),
            hooks,
            context,
            shell,
            self_ref: self_ref.clone(),
            children: ChildTable::new(),
            uplinks: UplinkTable::new(),
            store: Mutex::new(None),
        })
    }

    fn bus(&self) -> &Bus {
        &self.shell.bus
    }

    fn publish(&self, kind: EventKind) {
        self.bus()
            .publish(RuntimeEvent::now(kind).with_address(&self.address));
    }

    /// Runs one hook with panic isolation.
    async fn run_hook(&self, phase: Phase, will: bool) -> Result<(), HookError> {
        let hooks = Arc::clone(&self.hooks);
        let fut = async move {
            match (phase, will) {
                (Phase::Opened, true) => hooks.will_open().await,
                (Phase::Opened, false) => hooks.did_open().await,
                (Phase::Loaded, true) => hooks.will_load().await,
                (Phase::Loaded, false) => hooks.did_load().await,
                (Phase::Started, true) => hooks.will_start().await,
                (Phase::Started, false) => hooks.did_start().await,
                (Phase::Stopped, true) => hooks.will_stop().await,
                (Phase::Stopped, false) => hooks.did_stop().await,
                (Phase::Unloaded, true) => hooks.will_unload().await,
                (Phase::Unloaded, false) => hooks.did_unload().await,
                (Phase::Closed, true) => hooks.will_close().await,
                (Phase::Closed, false) => hooks.did_close().await,
                _ => Ok(()),
            }
        };
        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(HookError::new(phase, panic_message(&panic))),
        }
    }

    /// Publishes the failure and walks `did_fail` toward the root.
    fn report(&self, error: HookError) {
        self.bus().publish(
            RuntimeEvent::now(EventKind::TierFailed)
                .with_address(&self.address)
                .with_reason(error.as_message()),
        );
        self.hooks.did_fail(&error);
        self.context.report_failure(&error);
    }

    pub(crate) fn notify_failure(&self, error: &HookError) {
        self.hooks.did_fail(error);
        self.context.report_failure(error);
    }

    /// Brings a freshly installed child up to this node's current phase.
    async fn bring_up(&self, child: &Arc<dyn TierBinding>) {
        if self.state.has_reached(Phase::Started) {
            child.start().await;
        } else if self.state.has_reached(Phase::Loaded) {
            child.load().await;
        } else if self.state.has_reached(Phase::Opened) {
            child.open().await;
        }
    }
}

#[async_trait]
impl TierBinding for TierNode {
    fn kind(&self) -> TierKind {
        self.kind
    }

    fn address(&self) -> &Address {
        &self.address
    }

    fn phase(&self) -> Phase {
        self.state.current()
    }

    fn has_reached(&self, phase: Phase) -> bool {
        self.state.has_reached(phase)
    }

    async fn open(&self) {
        if !self.state.claim(Phase::Opened) {
            return;
        }
        if let Err(error) = self.run_hook(Phase::Opened, true).await {
            self.state.release(Phase::Opened);
            self.report(error);
            return;
        }
        for child in self.children.snapshot().values() {
            child.open().await;
        }
        if let Err(error) = self.run_hook(Phase::Opened, false).await {
            self.report(error);
        }
        self.publish(EventKind::TierOpened);
    }

    async fn load(&self) {
        self.open().await;
        if !self.state.has_reached(Phase::Opened) {
            return;
        }
        if !self.state.claim(Phase::Loaded) {
            return;
        }
        if let Err(error) = self.run_hook(Phase::Loaded, true).await {
            self.state.release(Phase::Loaded);
            self.report(error);
            return;
        }
        *self.store.lock() = Some(self.context.open_store(&self.address));
        for child in self.children.snapshot().values() {
            child.load().await;
        }
        if let Err(error) = self.run_hook(Phase::Loaded, false).await {
            self.report(error);
        }
        self.publish(EventKind::TierLoaded);
    }

    async fn start(&self) {
        self.load().await;
        if !self.state.has_reached(Phase::Loaded) {
            return;
        }
        if !self.state.claim(Phase::Started) {
            return;
        }
        if let Err(error) = self.run_hook(Phase::Started, true).await {
            self.state.release(Phase::Started);
            self.report(error);
            return;
        }
        for child in self.children.snapshot().values() {
            child.start().await;
        }
        if let Err(error) = self.run_hook(Phase::Started, false).await {
            self.report(error);
        }
        self.publish(EventKind::TierStarted);
    }

    async fn stop(&self) {
        if !self.state.has_reached(Phase::Started) {
            return;
        }
        if !self.state.claim(Phase::Stopped) {
            return;
        }
        if let Err(error) = self.run_hook(Phase::Stopped, true).await {
            self.state.release(Phase::Stopped);
            self.report(error);
            return;
        }
        for child in self.children.snapshot().values() {
            child.stop().await;
        }
        if let Err(error) = self.run_hook(Phase::Stopped, false).await {
            self.report(error);
        }
        self.publish(EventKind::TierStopped);
    }

    async fn unload(&self) {
        if self.state.has_reached(Phase::Started) {
            self.stop().await;
        }
        if !self.state.has_reached(Phase::Loaded) {
            return;
        }
        if !self.state.claim(Phase::Unloaded) {
            return;
        }
        if let Err(error) = self.run_hook(Phase::Unloaded, true).await {
            self.state.release(Phase::Unloaded);
            self.report(error);
            return;
        }
        for child in self.children.snapshot().values() {
            child.unload().await;
        }
        *self.store.lock() = None;
        if let Err(error) = self.run_hook(Phase::Unloaded, false).await {
            self.report(error);
        }
        self.publish(EventKind::TierUnloaded);
    }

    async fn close(&self) {
        if self.state.has_reached(Phase::Started) && !self.state.has_reached(Phase::Stopped) {
            self.stop().await;
        }
        if self.state.has_reached(Phase::Loaded) && !self.state.has_reached(Phase::Unloaded) {
            self.unload().await;
        }
        if !self.state.claim(Phase::Closed) {
            return;
        }
        // Close cannot be vetoed: a failing will_close is reported and the
        // teardown still runs.
        if let Err(error) = self.run_hook(Phase::Closed, true).await {
            self.report(error);
        }
        for child in self.children.clear() {
            child.close().await;
        }
        for uplink in self.uplinks.clear() {
            uplink.close().await;
        }
        *self.store.lock() = None;
        if let Err(error) = self.run_hook(Phase::Closed, false).await {
            self.report(error);
        }
        self.publish(EventKind::TierClosed);
    }

    fn get_child(&self, kind: TierKind, name: &str) -> Option<Arc<dyn TierBinding>> {
        self.children.get(&ChildKey::new(kind, name))
    }

    async fn open_or_create_child(
        &self,
        kind: TierKind,
        name: &str,
    ) -> Result<Arc<dyn TierBinding>, RoutingError> {
        if !self.kind.can_contain(kind) {
            return Err(RoutingError::NotRoutable {
                address: self.address.to_string(),
            });
        }
        if self.state.is_closed() {
            return Err(RoutingError::Closed {
                address: self.address.to_string(),
            });
        }
        let key = ChildKey::new(kind, name);
        if let Some(existing) = self.children.get(&key) {
            return Ok(existing);
        }

        let child_address =
            self.address
                .with_coordinate(kind, name)
                .map_err(|_| RoutingError::NotRoutable {
                    address: self.address.to_string(),
                })?;
        if self.shell.policy.authorize(&child_address, Operation::CreateTier) == Decision::Deny {
            return Err(RoutingError::Unauthorized {
                address: child_address.to_string(),
            });
        }

        // Speculative construction happens entirely outside the table lock;
        // only the install itself is synchronized.
        let parent = self.self_ref.upgrade().ok_or_else(|| RoutingError::Closed {
            address: self.address.to_string(),
        })?;
        let context = Arc::new(NodeContext {
            address: child_address.clone(),
            parent: Arc::downgrade(&parent),
            shell: Arc::clone(&self.shell),
        });
        let hooks = self.shell.hooks.hooks_for(&child_address);
        let node = TierNode::new(
            kind,
            child_address.clone(),
            hooks,
            context,
            Arc::clone(&self.shell),
        );
        let candidate = self
            .shell
            .decorate(self.context.inject_child(node as Arc<dyn TierBinding>));

        match self.children.install(key.clone(), Arc::clone(&candidate)) {
            Ok(()) => {
                // A close that claimed its phase between the guard above and
                // this install has already drained the table without seeing
                // the entry; take it back out before it can start.
                if self.state.is_closed() {
                    self.children.remove(&key);
                    candidate.close().await;
                    return Err(RoutingError::Closed {
                        address: self.address.to_string(),
                    });
                }
                self.bus().publish(
                    RuntimeEvent::now(EventKind::ChildInstalled).with_address(&child_address),
                );
                self.bring_up(&candidate).await;
                Ok(candidate)
            }
            Err(winner) => {
                self.bus().publish(
                    RuntimeEvent::now(EventKind::ChildDiscarded).with_address(&child_address),
                );
                // The loser never opened; closing it is pure cleanup.
                candidate.close().await;
                Ok(winner)
            }
        }
    }

    async fn close_child(&self, kind: TierKind, name: &str) -> bool {
        match self.children.remove(&ChildKey::new(kind, name)) {
            Some(child) => {
                child.close().await;
                true
            }
            None => false,
        }
    }

    async fn push(&self, request: PushRequest) {
        if self.state.is_closed() {
            self.bus().publish(
                RuntimeEvent::now(EventKind::PushDeclined)
                    .with_address(&self.address)
                    .with_reason("route_closed"),
            );
            request.settle_declined();
            return;
        }

        let envelope = request.envelope().clone();
        let priority = request.priority();
        for uplink in self.uplinks.snapshot().values() {
            let fanned = PushRequest::new(envelope.clone()).with_priority(priority);
            if let Err(fault) = uplink.feed(fanned) {
                if fault.is_fatal() {
                    if let Some(removed) = self.uplinks.remove(uplink.key()) {
                        removed.close().await;
                    }
                } else if uplink.is_closed() {
                    self.uplinks.remove(uplink.key());
                }
            }
        }
        self.publish(EventKind::PushDelivered);
        request.settle_delivered();
    }

    async fn open_uplink(&self, key: LinkKey, peer: Arc<dyn EnvelopeSink>) -> Arc<dyn Uplink> {
        if !self.kind.is_linkable() || self.state.is_closed() {
            return ErrorResponder::refuse(
                key,
                self.address.clone(),
                EnvelopeKind::NotFound,
                &peer,
                self.bus(),
            )
            .await;
        }
        if let Some(existing) = self.uplinks.get(&key) {
            return existing;
        }
        let uplink = UplinkBinding::open(
            key.clone(),
            self.address.clone(),
            peer,
            Arc::clone(&self.shell.stage),
            self.shell.uplink_flow(),
            self.bus().clone(),
        );
        match self.uplinks.install(key, uplink.clone() as Arc<dyn Uplink>) {
            Ok(()) => {
                // Same window as child installation: a concurrent close may
                // have drained the uplink table before this entry landed.
                if self.state.is_closed() {
                    self.uplinks.remove(uplink.key());
                    uplink.close().await;
                }
                uplink as Arc<dyn Uplink>
            }
            Err(existing) => {
                uplink.close().await;
                existing
            }
        }
    }

    async fn close_uplink(&self, key: &LinkKey) -> bool {
        match self.uplinks.remove(key) {
            Some(uplink) => {
                uplink.close().await;
                true
            }
            None => false,
        }
    }

    fn did_fail(&self, error: &HookError) {
        self.notify_failure(error);
    }
}

/// Context of a non-root node: reaches upward through its parent.
pub(crate) struct NodeContext {
    address: Address,
    parent: Weak<TierNode>,
    shell: Arc<Shell>,
}

#[async_trait]
impl TierContext for NodeContext {
    fn address(&self) -> &Address {
        &self.address
    }

    fn stage(&self) -> Arc<dyn Stage> {
        Arc::clone(&self.shell.stage)
    }

    fn policy(&self) -> Arc<dyn AccessPolicy> {
        Arc::clone(&self.shell.policy)
    }

    fn open_store(&self, address: &Address) -> StoreHandle {
        self.shell.persistence.open_store(address)
    }

    fn bus(&self) -> Bus {
        self.shell.bus.clone()
    }

    async fn push_up(&self, envelope: Envelope) {
        self.shell.push_up(envelope).await;
    }

    fn report_failure(&self, error: &HookError) {
        if let Some(parent) = self.parent.upgrade() {
            parent.notify_failure(error);
        }
    }
}

/// Context of the root node: the end of every upward walk.
pub(crate) struct RootContext {
    address: Address,
    shell: Arc<Shell>,
}

#[async_trait]
impl TierContext for RootContext {
    fn address(&self) -> &Address {
        &self.address
    }

    fn stage(&self) -> Arc<dyn Stage> {
        Arc::clone(&self.shell.stage)
    }

    fn policy(&self) -> Arc<dyn AccessPolicy> {
        Arc::clone(&self.shell.policy)
    }

    fn open_store(&self, address: &Address) -> StoreHandle {
        self.shell.persistence.open_store(address)
    }

    fn bus(&self) -> Bus {
        self.shell.bus.clone()
    }

    async fn push_up(&self, envelope: Envelope) {
        self.shell.push_up(envelope).await;
    }

    fn report_failure(&self, _error: &HookError) {}
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "hook panicked".to_string()
    }
}
