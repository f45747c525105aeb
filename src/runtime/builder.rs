//! # Runtime builder.
//!
//! [`MeshRuntimeBuilder`] assembles the collaborator seams, wires the
//! observer fan-out onto the event bus, and starts the root tier.
//!
//! ## Example
//! ```rust,no_run
//! use meshvisor::{MeshRuntimeBuilder, RuntimeConfig};
//!
//! # async fn demo() {
//! let runtime = MeshRuntimeBuilder::new()
//!     .with_config(RuntimeConfig::default())
//!     .build()
//!     .await;
//! # let _ = runtime;
//! # }
//! ```

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use crate::config::RuntimeConfig;
use crate::envelope::EnvelopeSink;
use crate::events::Bus;
use crate::lifecycle::{LifecycleFactory, NoHooks};
use crate::link::LinkRouter;
use crate::observers::{Observe, ObserverSet};
use crate::policy::{AccessPolicy, AllowAll};
use crate::stage::{Stage, TokioStage};
use crate::store::{NoStore, Persistence};
use crate::tier::{TierBinding, TierDecorator, TierNode};

use super::runtime::MeshRuntime;
use super::shell::Shell;

/// Step-by-step construction of a [`MeshRuntime`].
///
/// Every seam has a working default: permissive policy, ephemeral stores,
/// the tokio stage, no gateway, no hooks, no observers.
pub struct MeshRuntimeBuilder {
    config: RuntimeConfig,
    stage: Arc<dyn Stage>,
    policy: Arc<dyn AccessPolicy>,
    persistence: Arc<dyn Persistence>,
    gateway: Option<Arc<dyn EnvelopeSink>>,
    hooks: Arc<dyn LifecycleFactory>,
    observers: Vec<Arc<dyn Observe>>,
    decorators: Vec<Arc<dyn TierDecorator>>,
}

impl Default for MeshRuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MeshRuntimeBuilder {
    /// A builder with all defaults.
    pub fn new() -> Self {
        Self {
            config: RuntimeConfig::default(),
            stage: Arc::new(TokioStage),
            policy: Arc::new(AllowAll),
            persistence: Arc::new(NoStore),
            gateway: None,
            hooks: Arc::new(NoHooks),
            observers: Vec::new(),
            decorators: Vec::new(),
        }
    }

    /// Replaces the runtime configuration.
    #[must_use]
    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the scheduler.
    #[must_use]
    pub fn with_stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stage = stage;
        self
    }

    /// Replaces the access policy.
    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn AccessPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Replaces the persistence backend.
    #[must_use]
    pub fn with_persistence(mut self, persistence: Arc<dyn Persistence>) -> Self {
        self.persistence = persistence;
        self
    }

    /// Sets the gateway sink for upward traffic.
    #[must_use]
    pub fn with_gateway(mut self, gateway: Arc<dyn EnvelopeSink>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Sets the lifecycle hook factory consulted for every new tier.
    #[must_use]
    pub fn with_hooks(mut self, hooks: Arc<dyn LifecycleFactory>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Attaches one observer to the event bus.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn Observe>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Attaches a batch of observers to the event bus.
    #[must_use]
    pub fn with_observers(mut self, observers: Vec<Arc<dyn Observe>>) -> Self {
        self.observers.extend(observers);
        self
    }

    /// Appends a decorator applied to every tier the runtime creates.
    ///
    /// Decorators wrap in registration order; the last registered is the
    /// outermost.
    #[must_use]
    pub fn with_decorator(mut self, decorator: Arc<dyn TierDecorator>) -> Self {
        self.decorators.push(decorator);
        self
    }

    /// Builds the runtime and starts its root tier.
    ///
    /// Must run inside a tokio runtime (workers are spawned here).
    pub async fn build(self) -> Arc<MeshRuntime> {
        let bus = Bus::new(self.config.bus_capacity_clamped());
        let token = CancellationToken::new();

        if !self.observers.is_empty() {
            spawn_observer_pump(self.observers, bus.clone(), token.clone());
        }

        let shell = Arc::new(Shell {
            config: self.config,
            stage: self.stage,
            policy: self.policy,
            persistence: self.persistence,
            gateway: self.gateway,
            hooks: self.hooks,
            bus,
            decorators: self.decorators,
            token,
        });

        let root = TierNode::root(Arc::clone(&shell));
        root.start().await;
        let root = root as Arc<dyn TierBinding>;
        let router = LinkRouter::new(Arc::clone(&root), Arc::clone(&shell));

        Arc::new(MeshRuntime::new(shell, root, router))
    }
}

/// Pumps bus events into the observer set until shutdown.
fn spawn_observer_pump(observers: Vec<Arc<dyn Observe>>, bus: Bus, token: CancellationToken) {
    let set = ObserverSet::new(observers, bus.clone());
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                received = rx.recv() => match received {
                    Ok(event) => set.emit(&event),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                },
            }
        }
        set.shutdown().await;
    });
}
