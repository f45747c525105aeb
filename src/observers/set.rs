//! # ObserverSet: non-blocking fan-out over multiple observers.
//!
//! [`ObserverSet`] distributes each [`RuntimeEvent`] to multiple observers
//! **without awaiting** their processing.
//!
//! ## What it guarantees
//! - `emit(&RuntimeEvent)` returns immediately.
//! - Per-observer FIFO (queue order).
//! - Panics inside observers are caught and reported (isolation).
//!
//! ## What it does **not** guarantee
//! - No global ordering across different observers.
//! - No retries on per-observer queue overflow (the event is dropped for
//!   that observer).
//!
//! ## Diagram
//! ```text
//!    emit(&RuntimeEvent)
//!        │                        (Arc-clone per observer)
//!        ├────────────────► [queue O1] ─► worker O1 ─► on_event()
//!        ├────────────────► [queue O2] ─► worker O2 ─► on_event()
//!        └────────────────► [queue ON] ─► worker ON ─► on_event()
//! ```

use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::events::{Bus, EventKind, RuntimeEvent};

use super::Observe;

/// Per-observer channel with metadata.
struct ObserverChannel {
    name: &'static str,
    sender: mpsc::Sender<Arc<RuntimeEvent>>,
}

/// Composite fan-out with per-observer bounded queues and worker tasks.
pub struct ObserverSet {
    channels: Vec<ObserverChannel>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl ObserverSet {
    /// Creates a new set and spawns one worker per observer.
    ///
    /// Worker panics inside `on_event` are caught and reported on `bus` as
    /// `EventKind::ObserverPanicked`.
    #[must_use]
    pub fn new(observers: Vec<Arc<dyn Observe>>, bus: Bus) -> Self {
        let mut channels = Vec::with_capacity(observers.len());
        let mut workers = Vec::with_capacity(observers.len());

        for observer in observers {
            let cap = observer.queue_capacity().max(1);
            let name = observer.name();
            let (tx, mut rx) = mpsc::channel::<Arc<RuntimeEvent>>(cap);
            let o = Arc::clone(&observer);
            let report_bus = bus.clone();

            let handle = tokio::spawn(async move {
                while let Some(ev) = rx.recv().await {
                    let fut = o.on_event(ev.as_ref());
                    if std::panic::AssertUnwindSafe(fut).catch_unwind().await.is_err() {
                        report_bus.publish(
                            RuntimeEvent::now(EventKind::ObserverPanicked)
                                .with_reason(o.name()),
                        );
                    }
                }
            });

            channels.push(ObserverChannel { name, sender: tx });
            workers.push(handle);
        }

        Self {
            channels,
            workers,
            bus,
        }
    }

    /// Fans one event out to all observers (non-blocking).
    ///
    /// If an observer's queue is full or closed, the event is dropped for it
    /// and `EventKind::ObserverOverflow` is published — unless the event is
    /// itself an observer report, which is dropped silently to avoid
    /// feedback loops.
    pub fn emit(&self, event: &RuntimeEvent) {
        let report = !event.is_observer_report();
        let ev = Arc::new(event.clone());
        for channel in &self.channels {
            if channel.sender.try_send(Arc::clone(&ev)).is_err() && report {
                self.bus.publish(
                    RuntimeEvent::now(EventKind::ObserverOverflow).with_reason(channel.name),
                );
            }
        }
    }

    /// Graceful shutdown: close all queues and await worker completion.
    pub async fn shutdown(self) {
        drop(self.channels);
        for handle in self.workers {
            let _ = handle.await;
        }
    }

    /// True if there are no observers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Number of observers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    struct Recorder {
        seen: Arc<Mutex<Vec<EventKind>>>,
    }

    #[async_trait]
    impl Observe for Recorder {
        async fn on_event(&self, event: &RuntimeEvent) {
            self.seen.lock().push(event.kind);
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    #[tokio::test]
    async fn test_emit_reaches_observer_in_order() {
        let bus = Bus::new(8);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let set = ObserverSet::new(
            vec![Arc::new(Recorder {
                seen: Arc::clone(&seen),
            })],
            bus,
        );

        set.emit(&RuntimeEvent::now(EventKind::TierOpened));
        set.emit(&RuntimeEvent::now(EventKind::TierClosed));
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(*seen.lock(), vec![EventKind::TierOpened, EventKind::TierClosed]);
        assert_eq!(set.len(), 1);
        assert!(!set.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_drains_workers() {
        let bus = Bus::new(8);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let set = ObserverSet::new(
            vec![Arc::new(Recorder {
                seen: Arc::clone(&seen),
            })],
            bus,
        );
        set.emit(&RuntimeEvent::now(EventKind::PushDelivered));
        set.shutdown().await;
        assert_eq!(*seen.lock(), vec![EventKind::PushDelivered]);
    }
}
