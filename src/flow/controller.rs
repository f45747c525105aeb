//! # Flow controller: priority queue + packed counters.
//!
//! [`FlowController`] pairs a [`FlowState`] with a priority-ordered pending
//! queue. Producers `feed` requests; the controller admits them downstream
//! (through a [`FlowSink`]) only while demand credits are available, highest
//! priority first.
//!
//! ## Rules
//! - `feed` never blocks; an over-bound feed declines the request and faults
//!   the controller.
//! - Demand is refilled toward `target_demand` after every ack.
//! - Equal priorities drain in arrival order.
//! - After `close`, feeds are declined and the queue is drained; after a
//!   fault, the controller stays latched until torn down.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::FlowFault;
use crate::link::PushRequest;

use super::state::{Admission, FlowState, COUNTER_MAX};
use super::FlowConfig;

/// Consumer side of a flow controller.
///
/// `admit` receives requests in priority order, one per demand credit. The
/// implementation settles each request and calls back into
/// [`FlowController::push`] / [`FlowController::ack`] as delivery progresses.
pub trait FlowSink: Send + Sync + 'static {
    /// Hands one admitted request to the consumer.
    fn admit(&self, request: PushRequest);

    /// Reports a latched protocol fault.
    fn on_fault(&self, _fault: &FlowFault) {}
}

/// Pending entry: priority-descending, then arrival order.
struct Pending {
    priority: f32,
    seq: u64,
    request: PushRequest,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == CmpOrdering::Equal
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Max-heap: higher priority wins; earlier arrival breaks ties.
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Credit-based flow controller for one uplink.
pub struct FlowController {
    config: FlowConfig,
    state: FlowState,
    pending: Mutex<BinaryHeap<Pending>>,
    seq: AtomicU64,
    closing: AtomicBool,
    faulted: AtomicBool,
    sink: Arc<dyn FlowSink>,
}

impl FlowController {
    /// Creates a controller with clamped bounds around the given sink.
    pub fn new(config: FlowConfig, sink: Arc<dyn FlowSink>) -> Self {
        let mut config = config;
        config.supply_max = config.supply_max.clamp(1, COUNTER_MAX);
        config.demand_max = config.demand_max.clamp(1, COUNTER_MAX);
        config.buffer_max = config.buffer_max.clamp(1, COUNTER_MAX);
        config.target_demand = config.target_demand.clamp(1, config.demand_max);
        Self {
            config,
            state: FlowState::new(),
            pending: Mutex::new(BinaryHeap::new()),
            seq: AtomicU64::new(0),
            closing: AtomicBool::new(false),
            faulted: AtomicBool::new(false),
            sink,
        }
    }

    /// Offers one request to the controller.
    ///
    /// The request either joins the pending queue (and supply) or is
    /// declined immediately: when the controller is closing or faulted, or
    /// when the supply bound is violated (which also latches a fault).
    pub fn feed(&self, request: PushRequest) -> Result<(), FlowFault> {
        if self.closing.load(Ordering::Acquire) || self.faulted.load(Ordering::Acquire) {
            request.settle_declined();
            return Err(FlowFault::Closed);
        }
        if let Err(fault) = self.state.try_feed(self.config.supply_max) {
            request.settle_declined();
            self.fault(&fault);
            return Err(fault);
        }
        let priority = request.priority();
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        self.pending.lock().push(Pending {
            priority,
            seq,
            request,
        });
        // A close or fault that drained the queue between the guard above
        // and this push would otherwise strand the entry until drop; sweep
        // once more so the decline is prompt.
        if self.closing.load(Ordering::Acquire) || self.faulted.load(Ordering::Acquire) {
            self.drain_pending();
            return Err(FlowFault::Closed);
        }
        self.generate_demand();
        Ok(())
    }

    /// Moves supply into demand and hands admitted requests to the sink,
    /// highest priority first, until the target demand is reached or supply
    /// runs out.
    pub fn generate_demand(&self) {
        loop {
            if self.closing.load(Ordering::Acquire) || self.faulted.load(Ordering::Acquire) {
                return;
            }
            match self
                .state
                .try_admit(self.config.target_demand, self.config.demand_max)
            {
                Ok(Admission::Admitted) => {}
                Ok(Admission::NoSupply) | Ok(Admission::Saturated) => return,
                Err(fault) => {
                    self.fault(&fault);
                    return;
                }
            }
            // Supply was counted before the heap push, so a freshly admitted
            // credit can race an in-flight feed. Hand the credit back and let
            // that feed's own generate_demand pick it up.
            let popped = self.pending.lock().pop();
            match popped {
                Some(entry) => self.sink.admit(entry.request),
                None => {
                    let _ = self.state.undo_admit();
                    return;
                }
            }
        }
    }

    /// Consumes one demand credit for an in-flight delivery.
    pub fn push(&self) -> Result<(), FlowFault> {
        self.state.try_push(self.config.buffer_max).map_err(|fault| {
            self.fault(&fault);
            fault
        })
    }

    /// Acknowledges one delivery and refills demand.
    pub fn ack(&self) -> Result<(), FlowFault> {
        self.state.try_ack().map_err(|fault| {
            self.fault(&fault);
            fault
        })?;
        self.generate_demand();
        Ok(())
    }

    /// Drops the highest-priority pending request, declining it.
    ///
    /// Returns `false` when nothing is pending.
    pub fn skip(&self) -> bool {
        let popped = self.pending.lock().pop();
        match popped {
            Some(entry) => {
                let _ = self.state.try_skip();
                entry.request.settle_declined();
                true
            }
            None => false,
        }
    }

    /// Stops admitting new feeds; in-flight deliveries may still ack.
    pub fn begin_close(&self) {
        self.closing.store(true, Ordering::Release);
    }

    /// Closes the controller and declines everything still pending.
    pub fn close(&self) {
        self.begin_close();
        self.drain_pending();
    }

    /// True once closed with no admitted or unacknowledged work left.
    ///
    /// Already-admitted deliveries keep draining through `push`/`ack` after
    /// close; the link is fully quiescent when both reach zero.
    pub fn is_drained(&self) -> bool {
        let c = self.state.counters();
        self.closing.load(Ordering::Acquire) && c.demand == 0 && c.buffer == 0
    }

    /// Latches a protocol fault: declines pending work and notifies the sink.
    pub fn fault(&self, fault: &FlowFault) {
        if self.faulted.swap(true, Ordering::AcqRel) {
            return;
        }
        self.drain_pending();
        self.sink.on_fault(fault);
    }

    /// True once a fault has latched.
    pub fn is_faulted(&self) -> bool {
        self.faulted.load(Ordering::Acquire)
    }

    /// Current counter snapshot.
    pub fn counters(&self) -> super::FlowCounters {
        self.state.counters()
    }

    fn drain_pending(&self) {
        let drained = {
            let mut heap = self.pending.lock();
            std::mem::take(&mut *heap)
        };
        self.state.drain_supply();
        for entry in drained.into_sorted_vec() {
            entry.request.settle_declined();
        }
    }
}
