//! # Event bus for broadcasting runtime events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] that provides
//! non-blocking event publishing from multiple sources (tier nodes, the link
//! router, flow controllers).
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks or awaits.
//! - **Bounded capacity**: a single ring buffer stores recent events for all
//!   receivers.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip the
//!   `n` oldest items.
//! - **No persistence**: events are lost when no subscriber is attached.

use tokio::sync::broadcast;

use super::event::RuntimeEvent;

/// Broadcast channel for runtime events.
///
/// Cheap to clone (internally holds an `Arc`-backed sender); every publisher
/// in the tree shares one bus.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<RuntimeEvent>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (clamped to ≥ 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<RuntimeEvent>(capacity);
        Self { tx }
    }

    /// Publishes an event to all active subscribers.
    ///
    /// If there are no receivers the event is dropped; publishing still
    /// returns immediately.
    pub fn publish(&self, event: RuntimeEvent) {
        let _ = self.tx.send(event);
    }

    /// Creates a new receiver that observes subsequent events.
    ///
    /// Each call creates an independent receiver; a receiver only sees
    /// events sent after it subscribed.
    pub fn subscribe(&self) -> broadcast::Receiver<RuntimeEvent> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(RuntimeEvent::now(EventKind::TierOpened));
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::TierOpened);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_silent() {
        let bus = Bus::new(1);
        bus.publish(RuntimeEvent::now(EventKind::TierClosed));
    }
}
