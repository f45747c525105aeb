//! # Built-in logging observer (requires the `logging` feature).
//!
//! [`LogObserver`] writes one log line per runtime event through the [`log`]
//! facade. Severity follows the event category:
//! - `info!` for ordinary progress (lifecycle, links, pushes)
//! - `warn!` for failures, refusals, faults, and observer reports

use async_trait::async_trait;
use log::{info, warn};

use crate::events::{EventKind, RuntimeEvent};

use super::Observe;

/// Logging observer backed by the [`log`] facade.
///
/// Attach it through the runtime builder; it consumes events like any other
/// observer, on its own worker with its own queue.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl LogObserver {
    /// Creates a new logging observer.
    pub fn new() -> Self {
        Self
    }
}

fn field(value: &Option<std::sync::Arc<str>>) -> &str {
    value.as_deref().unwrap_or("-")
}

#[async_trait]
impl Observe for LogObserver {
    async fn on_event(&self, event: &RuntimeEvent) {
        let addr = field(&event.address);
        let link = field(&event.link);
        let reason = field(&event.reason);

        match event.kind {
            EventKind::TierOpened => info!("[tier] opened addr={addr}"),
            EventKind::TierLoaded => info!("[tier] loaded addr={addr}"),
            EventKind::TierStarted => info!("[tier] started addr={addr}"),
            EventKind::TierStopped => info!("[tier] stopped addr={addr}"),
            EventKind::TierUnloaded => info!("[tier] unloaded addr={addr}"),
            EventKind::TierClosed => info!("[tier] closed addr={addr}"),
            EventKind::TierFailed => warn!("[tier] failed addr={addr} reason={reason}"),
            EventKind::ChildInstalled => info!("[table] child installed addr={addr}"),
            EventKind::ChildDiscarded => info!("[table] child discarded addr={addr}"),
            EventKind::UplinkOpened => info!("[link] opened addr={addr} link={link}"),
            EventKind::UplinkClosed => info!("[link] closed addr={addr} link={link}"),
            EventKind::UplinkRefused => warn!("[link] refused addr={addr} reason={reason}"),
            EventKind::LinkFault => warn!("[link] fault link={link} reason={reason}"),
            EventKind::IdleTimeout => info!("[link] idle timeout addr={addr} link={link}"),
            EventKind::PushDelivered => info!("[push] delivered addr={addr}"),
            EventKind::PushDeclined => warn!("[push] declined addr={addr} reason={reason}"),
            EventKind::ObserverOverflow => warn!("[observe] overflow observer={reason}"),
            EventKind::ObserverPanicked => warn!("[observe] panic observer={reason}"),
            EventKind::ShutdownRequested => info!("[runtime] shutdown requested"),
            EventKind::AllStoppedWithin => info!("[runtime] all tiers stopped within grace"),
            EventKind::GraceExceeded => warn!("[runtime] grace exceeded reason={reason}"),
            _ => info!("[event] kind={:?} addr={addr}", event.kind),
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
