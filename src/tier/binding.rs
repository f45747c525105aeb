//! # The tier binding trait.
//!
//! [`TierBinding`] is the uniform surface of every node in the tree: the
//! root, meshes, parts, hosts, nodes, and lanes all implement it. Lifecycle
//! transitions, child management, pushes, and uplinks flow through this
//! trait, which makes decorators ([`TierProxy`]) transparent to callers.
//!
//! ## Rules
//! - Transition methods are idempotent; losing a phase claim is a no-op.
//! - `open_or_create_child` returns the single installed child even under
//!   concurrent creation; racing losers are closed before anyone sees them.
//! - `push` settles its request exactly once.
//!
//! [`TierProxy`]: crate::tier::TierProxy

use std::sync::Arc;

use async_trait::async_trait;

use crate::addr::{Address, TierKind};
use crate::envelope::EnvelopeSink;
use crate::error::{HookError, RoutingError};
use crate::lifecycle::Phase;
use crate::link::{LinkKey, PushRequest, Uplink};

/// One node in the tier tree.
#[async_trait]
pub trait TierBinding: Send + Sync + 'static {
    /// The tier kind of this node.
    fn kind(&self) -> TierKind;

    /// The node's address.
    fn address(&self) -> &Address;

    /// The deepest claimed lifecycle phase.
    fn phase(&self) -> Phase;

    /// True once the node has claimed `phase`.
    fn has_reached(&self, phase: Phase) -> bool;

    /// Opens the node (and its known children). Idempotent.
    async fn open(&self);

    /// Loads durable state, opening first if needed. Idempotent.
    async fn load(&self);

    /// Starts the node, loading first if needed. Idempotent.
    async fn start(&self);

    /// Stops a started node; children stop first. Idempotent.
    async fn stop(&self);

    /// Releases durable state, stopping first if needed. Idempotent.
    async fn unload(&self);

    /// Terminally closes the node and its whole subtree. Idempotent.
    async fn close(&self);

    /// The installed child of the given kind and name, if any.
    fn get_child(&self, kind: TierKind, name: &str) -> Option<Arc<dyn TierBinding>>;

    /// Returns the installed child, creating it if absent.
    ///
    /// Concurrent callers all receive the same winner; a speculative loser
    /// is closed without ever reaching `opened`.
    async fn open_or_create_child(
        &self,
        kind: TierKind,
        name: &str,
    ) -> Result<Arc<dyn TierBinding>, RoutingError>;

    /// Closes and removes the named child. Returns `false` when absent.
    async fn close_child(&self, kind: TierKind, name: &str) -> bool;

    /// Delivers a push request to this node, fanning the envelope out to
    /// its uplinks. The request settles exactly once.
    async fn push(&self, request: PushRequest);

    /// Opens (or returns) the uplink registered under `key`.
    ///
    /// Refused attempts yield a degenerate responder uplink that has
    /// already sent its terminal envelope; no table entry is created.
    async fn open_uplink(&self, key: LinkKey, peer: Arc<dyn EnvelopeSink>) -> Arc<dyn Uplink>;

    /// Closes and removes the uplink under `key`. Returns `false` when absent.
    async fn close_uplink(&self, key: &LinkKey) -> bool;

    /// Observes a failure from this node or a descendant.
    fn did_fail(&self, error: &HookError);
}

impl std::fmt::Debug for dyn TierBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TierBinding")
            .field("kind", &self.kind())
            .field("address", self.address())
            .finish()
    }
}
