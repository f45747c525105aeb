//! Links: push requests, uplinks, and the router.
//!
//! ```text
//!   peer ◄── envelopes ──┐
//!                        │
//!   [LinkRouter] ──► [TierNode] ──► [Uplink (flow-controlled)] ──► peer
//!        │
//!        └── miss/deny ──► [ErrorResponder] ──► terminal envelope
//! ```
//!
//! - [`PushRequest`]: an envelope in flight with exactly-once settlement.
//! - [`Uplink`] / [`UplinkBinding`]: flow-controlled delivery paths.
//! - [`ErrorResponder`]: the degenerate uplink for refused link attempts.
//! - [`LinkRouter`]: descends the tree and routes pushes both ways.

mod push;
mod router;
mod uplink;

pub use push::PushRequest;
pub use router::LinkRouter;
pub use uplink::{ErrorResponder, LinkKey, Uplink, UplinkBinding, UplinkTable};
