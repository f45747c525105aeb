//! Tier tree: bindings, contexts, proxies, and the child table.
//!
//! ```text
//!                     ┌────────────┐
//!                     │    root    │
//!                     └─────┬──────┘
//!            ┌──────────────┼──────────────┐
//!       ┌────┴────┐    ┌────┴────┐    ┌────┴────┐
//!       │  mesh   │    │  part   │    │  host   │   (any strictly deeper
//!       └────┬────┘    └────┬────┘    └────┬────┘    kind may be a child)
//!            │              │              │
//!          nodes          nodes          nodes ── lanes
//! ```
//!
//! - [`TierBinding`]: the uniform node surface (lifecycle, children, pushes,
//!   uplinks).
//! - [`TierContext`]: a node's view of its environment and its path upward.
//! - [`TierProxy`] / [`TierDecorator`]: transparent composition over
//!   bindings.
//! - [`ChildTable`]: race-free child installation with snapshot reads.

mod binding;
mod context;
mod node;
mod proxy;
mod table;

pub use binding::TierBinding;
pub use context::TierContext;
pub use proxy::{TierDecorator, TierProxy};
pub use table::{ChildKey, ChildTable};

pub(crate) use node::TierNode;
