//! # Access policy seam.
//!
//! The runtime consults an [`AccessPolicy`] before creating a child tier or
//! opening an uplink. Policy evaluation itself (credential formats, ACL
//! storage) lives outside this crate; the core only needs allow/deny
//! answers at two decision points.
//!
//! ## Rules
//! - A denied [`Operation::CreateTier`] must not leave a phantom child entry.
//! - A denied [`Operation::Push`] settles the request as declined.
//! - A denied [`Operation::Link`] yields a terminal `Deny` envelope.

use bytes::Bytes;

use crate::addr::Address;

/// Opaque peer credentials presented at authentication.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Opaque credential material; the core never inspects it.
    pub token: Bytes,
}

impl Credentials {
    /// Wraps opaque credential material.
    pub fn new(token: impl Into<Bytes>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

/// Outcome of authenticating a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// The peer may interact with the runtime.
    Accept,
    /// The peer is rejected outright.
    Reject,
}

/// Outcome of authorizing one operation against one address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The operation proceeds.
    Allow,
    /// The operation is declined; no side effects occur.
    Deny,
}

/// The operation being authorized.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Creating a tier node at the address.
    CreateTier,
    /// Delivering a push request to the address.
    Push,
    /// Opening an uplink onto the address.
    Link,
}

/// Authorization seam consulted by the tier tree and the link router.
///
/// Implementations should be cheap and non-blocking; expensive evaluation
/// belongs behind a cache outside the core.
pub trait AccessPolicy: Send + Sync + 'static {
    /// Authenticates a connecting peer.
    fn authenticate(&self, credentials: &Credentials) -> Directive;

    /// Authorizes one operation against one address.
    fn authorize(&self, address: &Address, operation: Operation) -> Decision;
}

/// Permissive default policy: every peer and operation is allowed.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessPolicy for AllowAll {
    fn authenticate(&self, _credentials: &Credentials) -> Directive {
        Directive::Accept
    }

    fn authorize(&self, _address: &Address, _operation: Operation) -> Decision {
        Decision::Allow
    }
}
