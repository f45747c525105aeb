//! # Push requests with exactly-once settlement.
//!
//! A [`PushRequest`] wraps an [`Envelope`] with a routing priority and two
//! optional settlement callbacks. Every request settles **exactly once**:
//! either delivered or declined. Consuming settle methods enforce this at
//! the type level, and dropping an unsettled request declines it so no
//! producer waits forever.

use crate::envelope::Envelope;

type Settlement = Box<dyn FnOnce() + Send + 'static>;

/// An envelope in flight, carrying priority and settlement callbacks.
pub struct PushRequest {
    envelope: Envelope,
    priority: f32,
    on_deliver: Option<Settlement>,
    on_decline: Option<Settlement>,
}

impl PushRequest {
    /// Wraps an envelope with the default priority (`0.0`).
    pub fn new(envelope: Envelope) -> Self {
        Self {
            envelope,
            priority: 0.0,
            on_deliver: None,
            on_decline: None,
        }
    }

    /// Sets the routing priority. Higher values drain first; `NaN` sorts
    /// below every real number under `total_cmp`.
    #[must_use]
    pub fn with_priority(mut self, priority: f32) -> Self {
        self.priority = priority;
        self
    }

    /// Registers a callback invoked when the request settles as delivered.
    #[must_use]
    pub fn on_deliver(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_deliver = Some(Box::new(f));
        self
    }

    /// Registers a callback invoked when the request settles as declined.
    #[must_use]
    pub fn on_decline(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_decline = Some(Box::new(f));
        self
    }

    /// The wrapped envelope.
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// The routing priority.
    pub fn priority(&self) -> f32 {
        self.priority
    }

    /// Settles as delivered, consuming the request.
    pub fn settle_delivered(mut self) {
        self.on_decline = None;
        if let Some(f) = self.on_deliver.take() {
            f();
        }
    }

    /// Settles as declined, consuming the request.
    pub fn settle_declined(mut self) {
        self.on_deliver = None;
        if let Some(f) = self.on_decline.take() {
            f();
        }
    }
}

impl Drop for PushRequest {
    /// An unsettled request declines on drop.
    fn drop(&mut self) {
        if let Some(f) = self.on_decline.take() {
            f();
        }
    }
}

impl std::fmt::Debug for PushRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushRequest")
            .field("envelope", &self.envelope)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::Address;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn probes() -> (Arc<AtomicU32>, Arc<AtomicU32>) {
        (Arc::new(AtomicU32::new(0)), Arc::new(AtomicU32::new(0)))
    }

    fn request(delivered: &Arc<AtomicU32>, declined: &Arc<AtomicU32>) -> PushRequest {
        let d = Arc::clone(delivered);
        let n = Arc::clone(declined);
        PushRequest::new(Envelope::event(Address::part("p1"), "x"))
            .on_deliver(move || {
                d.fetch_add(1, Ordering::SeqCst);
            })
            .on_decline(move || {
                n.fetch_add(1, Ordering::SeqCst);
            })
    }

    #[test]
    fn test_delivered_fires_once_and_suppresses_decline() {
        let (delivered, declined) = probes();
        request(&delivered, &declined).settle_delivered();
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
        assert_eq!(declined.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_declined_fires_once() {
        let (delivered, declined) = probes();
        request(&delivered, &declined).settle_declined();
        assert_eq!(delivered.load(Ordering::SeqCst), 0);
        assert_eq!(declined.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_declines_unsettled() {
        let (delivered, declined) = probes();
        drop(request(&delivered, &declined));
        assert_eq!(delivered.load(Ordering::SeqCst), 0);
        assert_eq!(declined.load(Ordering::SeqCst), 1);
    }
}
