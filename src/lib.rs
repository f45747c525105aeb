//! # meshvisor
//!
//! **Meshvisor** is a multi-tenant distributed runtime core for Rust.
//!
//! It maintains a hierarchical namespace of tiers
//! (`mesh → part → host → node → lane`), gives every tier a monotonic
//! lifecycle with application hooks, and routes opaque envelopes through
//! credit-flow-controlled uplinks. The crate is designed as the kernel of a
//! larger mesh server; codecs, transports, storage engines, and policy
//! evaluation plug in at trait seams.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!          push_down(PushRequest)            open_uplink(addr, key, peer)
//!                  │                                   │
//!                  ▼                                   ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  LinkRouter (descends the tree along address coordinates)         │
//! │  - creates missing tiers for pushes                               │
//! │  - refuses missing/denied links via ErrorResponder                │
//! └──────────────────────────────┬────────────────────────────────────┘
//!                                ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Tier tree (TierBinding / TierNode)                               │
//! │  - LifecycleState (atomic phase claims, will/did hooks)           │
//! │  - ChildTable (race-free install, snapshot reads)                 │
//! │  - UplinkTable (per-node links)                                   │
//! └──────┬──────────────────────────────────────────────┬─────────────┘
//!        ▼                                              ▼
//! ┌──────────────────────────┐              ┌──────────────────────────┐
//! │ Uplink (UplinkBinding)   │              │ Shell (per-runtime env)  │
//! │ - FlowController         │              │ - Stage / AccessPolicy   │
//! │   supply→demand→buffer   │              │ - Persistence / gateway  │
//! │ - Linked/Unlinked frames │              │ - decorator chain        │
//! └──────────┬───────────────┘              └──────────┬───────────────┘
//!            ▼                                         ▼
//!          peer (EnvelopeSink)            Bus ──► ObserverSet ──► workers
//! ```
//!
//! ### Tier lifecycle
//! ```text
//! created ─► opened ─► loaded ─► started ─► stopped ─► unloaded ─► closed
//!
//! each transition:
//!   ├─► claim phase bit (CAS; losers return, close is terminal)
//!   ├─► will_* hook   (failure/panic releases the claim and reports)
//!   ├─► phase action  (cascades into children; down-phases children-first)
//!   ├─► did_* hook    (failure reports; the phase stands)
//!   └─► publish Tier* event
//! ```
//!
//! ## Features
//! | Area           | Description                                              | Key types / traits                          |
//! |----------------|----------------------------------------------------------|---------------------------------------------|
//! | **Addressing** | Hierarchical addresses with elidable coordinates.        | [`Address`], [`TierKind`]                   |
//! | **Tiers**      | The node tree, contexts, and transparent decoration.     | [`TierBinding`], [`TierContext`], [`TierProxy`] |
//! | **Lifecycle**  | Monotonic phases with `will`/`did` hooks.                | [`Phase`], [`Lifecycle`], [`LifecycleFactory`] |
//! | **Links**      | Flow-controlled uplinks and the push router.             | [`Uplink`], [`PushRequest`], [`LinkRouter`] |
//! | **Flow**       | Credit-based counters packed in one atomic word.         | [`FlowController`], [`FlowConfig`]          |
//! | **Seams**      | Scheduler, policy, persistence, gateway.                 | [`Stage`], [`AccessPolicy`], [`Persistence`], [`EnvelopeSink`] |
//! | **Events**     | Bus plus isolated observer fan-out.                      | [`RuntimeEvent`], [`Bus`], [`Observe`]      |
//! | **Errors**     | Typed errors with stable labels.                         | [`RoutingError`], [`FlowFault`], [`HookError`] |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogObserver`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use meshvisor::{Address, Envelope, LinkKey, MeshRuntimeBuilder, PushRequest};
//!
//! # use async_trait::async_trait;
//! # struct Stdout;
//! # #[async_trait]
//! # impl meshvisor::EnvelopeSink for Stdout {
//! #     async fn send(&self, _envelope: Envelope) {}
//! # }
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let runtime = MeshRuntimeBuilder::new().build().await;
//!
//!     // Create a node tier and hang an uplink off it.
//!     let addr = Address::parse("/part/p1/node/n1").unwrap();
//!     runtime.open_or_create(&addr).await.unwrap();
//!     let peer: Arc<dyn meshvisor::EnvelopeSink> = Arc::new(Stdout);
//!     runtime.open_uplink(&addr, LinkKey::new("peer-1"), peer).await;
//!
//!     // Push an event down; the envelope fans out to the node's uplinks.
//!     runtime
//!         .push_down(PushRequest::new(Envelope::event(addr, "hello")))
//!         .await;
//!
//!     runtime.shutdown().await.unwrap();
//! }
//! ```

mod addr;
mod config;
mod envelope;
mod error;
mod events;
mod flow;
mod lifecycle;
mod link;
mod observers;
mod policy;
mod runtime;
mod stage;
mod store;
mod tier;

// ---- Public re-exports ----

pub use addr::{Address, AddressError, TierKind};
pub use config::RuntimeConfig;
pub use envelope::{Envelope, EnvelopeKind, EnvelopeSink};
pub use error::{FlowFault, HookError, RoutingError, RuntimeError};
pub use events::{Bus, EventKind, RuntimeEvent};
pub use flow::{FlowConfig, FlowController, FlowCounters, FlowSink};
pub use lifecycle::{Lifecycle, LifecycleFactory, LifecycleState, NoHooks, Phase};
pub use link::{ErrorResponder, LinkKey, LinkRouter, PushRequest, Uplink, UplinkBinding};
pub use observers::{Observe, ObserverSet};
pub use policy::{AccessPolicy, AllowAll, Credentials, Decision, Directive, Operation};
pub use runtime::{MeshRuntime, MeshRuntimeBuilder};
pub use stage::{BoxTask, Stage, TokioStage};
pub use store::{NoStore, Persistence, StoreHandle};
pub use tier::{ChildKey, ChildTable, TierBinding, TierContext, TierDecorator, TierProxy};

// Optional: expose a simple built-in logging observer (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use observers::LogObserver;
