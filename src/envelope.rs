//! # Opaque envelopes exchanged between the router and the flow controller.
//!
//! The wire codec is out of scope for this crate: an [`Envelope`] is the
//! smallest routable unit — a kind tag, a target [`Address`], and an opaque
//! payload. Peers and transports consume envelopes through the
//! [`EnvelopeSink`] seam.

use async_trait::async_trait;
use bytes::Bytes;

use crate::addr::Address;

/// Classification of an envelope.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKind {
    /// Application event flowing along a link.
    Event,
    /// Application command directed at a tier.
    Command,
    /// Link confirmation: the uplink is live.
    Linked,
    /// The uplink replayed its current state to the peer.
    Synced,
    /// Link termination: the uplink is gone.
    Unlinked,
    /// Structured resolution failure: the target does not exist.
    NotFound,
    /// Structured authorization failure.
    Deny,
}

/// The opaque unit of routing and flow control.
///
/// The core never inspects `body`; codecs live outside this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Envelope classification.
    pub kind: EnvelopeKind,
    /// Target address.
    pub to: Address,
    /// Opaque payload.
    pub body: Bytes,
}

impl Envelope {
    /// Creates an envelope with an empty body.
    pub fn new(kind: EnvelopeKind, to: Address) -> Self {
        Self {
            kind,
            to,
            body: Bytes::new(),
        }
    }

    /// Attaches an opaque payload.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// An application event envelope.
    pub fn event(to: Address, body: impl Into<Bytes>) -> Self {
        Self::new(EnvelopeKind::Event, to).with_body(body)
    }

    /// An application command envelope.
    pub fn command(to: Address, body: impl Into<Bytes>) -> Self {
        Self::new(EnvelopeKind::Command, to).with_body(body)
    }

    /// A link confirmation envelope.
    pub fn linked(to: Address) -> Self {
        Self::new(EnvelopeKind::Linked, to)
    }

    /// A state-replay completion envelope.
    pub fn synced(to: Address) -> Self {
        Self::new(EnvelopeKind::Synced, to)
    }

    /// A link termination envelope.
    pub fn unlinked(to: Address) -> Self {
        Self::new(EnvelopeKind::Unlinked, to)
    }

    /// A structured "no such tier" envelope.
    pub fn not_found(to: Address) -> Self {
        Self::new(EnvelopeKind::NotFound, to)
    }

    /// A structured authorization-failure envelope.
    pub fn deny(to: Address) -> Self {
        Self::new(EnvelopeKind::Deny, to)
    }

    /// True for the envelopes that terminate a link attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            EnvelopeKind::Unlinked | EnvelopeKind::NotFound | EnvelopeKind::Deny
        )
    }
}

/// Delivery seam toward a peer or transport.
///
/// Implementations must not block; slow consumers should buffer internally
/// or drop with their own accounting.
#[async_trait]
pub trait EnvelopeSink: Send + Sync + 'static {
    /// Delivers one envelope to the peer.
    async fn send(&self, envelope: Envelope);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_classification() {
        let to = Address::part("p1");
        assert!(Envelope::not_found(to.clone()).is_terminal());
        assert!(Envelope::unlinked(to.clone()).is_terminal());
        assert!(Envelope::deny(to.clone()).is_terminal());
        assert!(!Envelope::linked(to.clone()).is_terminal());
        assert!(!Envelope::event(to, Bytes::from_static(b"x")).is_terminal());
    }
}
