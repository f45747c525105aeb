//! Lifecycle machinery replicated at every tier.
//!
//! - [`Phase`]: the ordered phases `created → opened → loaded → started`
//!   and, on shutdown, `stopped → unloaded → closed`.
//! - [`LifecycleState`]: per-node atomic phase claims; every forward
//!   transition executes at most once, `closed` is terminal.
//! - [`Lifecycle`]: the `will*`/`did*` hook trait application tiers override.

mod hooks;
mod phase;
mod state;

pub use hooks::{Lifecycle, LifecycleFactory, NoHooks};
pub use phase::Phase;
pub use state::LifecycleState;
