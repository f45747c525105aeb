//! # Packed atomic flow counters.
//!
//! [`FlowState`] stores the supply, demand, and buffer counters in one
//! `AtomicU64`, 20 bits each. Every transition is a single compare-exchange,
//! so concurrent feeders, demand generators, and ackers always observe a
//! consistent triple.
//!
//! ```text
//!   bits  0..20   supply
//!   bits 20..40   demand
//!   bits 40..60   buffer
//! ```
//!
//! Bound checks happen inside the CAS loop; a violation aborts the
//! transition and surfaces as a [`FlowFault`].

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::FlowFault;

const FIELD_BITS: u32 = 20;
const FIELD_MASK: u64 = (1 << FIELD_BITS) - 1;

const SUPPLY_SHIFT: u32 = 0;
const DEMAND_SHIFT: u32 = FIELD_BITS;
const BUFFER_SHIFT: u32 = 2 * FIELD_BITS;

/// Largest value any single counter (and any configured bound) may take.
pub const COUNTER_MAX: u32 = FIELD_MASK as u32;

/// A consistent snapshot of the three counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowCounters {
    /// Items offered but not yet admitted.
    pub supply: u32,
    /// Outstanding demand credits.
    pub demand: u32,
    /// Unacknowledged pushes.
    pub buffer: u32,
}

/// Outcome of a demand-admission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// One unit moved from supply to demand.
    Admitted,
    /// No supply available; nothing to admit.
    NoSupply,
    /// Demand already at the target level (or the configured maximum).
    Saturated,
}

/// The packed atomic word plus its transition operations.
#[derive(Debug, Default)]
pub struct FlowState {
    word: AtomicU64,
}

#[inline]
fn unpack(word: u64) -> FlowCounters {
    FlowCounters {
        supply: ((word >> SUPPLY_SHIFT) & FIELD_MASK) as u32,
        demand: ((word >> DEMAND_SHIFT) & FIELD_MASK) as u32,
        buffer: ((word >> BUFFER_SHIFT) & FIELD_MASK) as u32,
    }
}

#[inline]
fn pack(c: FlowCounters) -> u64 {
    (u64::from(c.supply) << SUPPLY_SHIFT)
        | (u64::from(c.demand) << DEMAND_SHIFT)
        | (u64::from(c.buffer) << BUFFER_SHIFT)
}

impl FlowState {
    /// Creates a state with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current counter snapshot.
    pub fn counters(&self) -> FlowCounters {
        unpack(self.word.load(Ordering::Acquire))
    }

    /// CAS loop shared by all transitions. `step` returns the next counter
    /// triple, `None` to abort without a fault, or an error to fault.
    fn transition<T>(
        &self,
        mut step: impl FnMut(FlowCounters) -> Result<Option<(FlowCounters, T)>, FlowFault>,
    ) -> Result<Option<T>, FlowFault> {
        let mut current = self.word.load(Ordering::Acquire);
        loop {
            let Some((next, out)) = step(unpack(current))? else {
                return Ok(None);
            };
            match self.word.compare_exchange_weak(
                current,
                pack(next),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(Some(out)),
                Err(observed) => current = observed,
            }
        }
    }

    /// Registers one offered item (`supply += 1`).
    ///
    /// Faults with [`FlowFault::SupplyOverrun`] when supply is already at
    /// `supply_max`.
    pub fn try_feed(&self, supply_max: u32) -> Result<(), FlowFault> {
        self.transition(|mut c| {
            if c.supply >= supply_max {
                return Err(FlowFault::SupplyOverrun { limit: supply_max });
            }
            c.supply += 1;
            Ok(Some((c, ())))
        })
        .map(|_| ())
    }

    /// Attempts to move one unit from supply to demand.
    ///
    /// Admits only while the in-flight total `demand + buffer` is below
    /// `target` (the steady-state goal); faults with
    /// [`FlowFault::DemandOverrun`] if demand somehow sits above
    /// `demand_max` (a protocol violation, not back-pressure).
    pub fn try_admit(&self, target: u32, demand_max: u32) -> Result<Admission, FlowFault> {
        let admitted = self.transition(|mut c| {
            if c.demand > demand_max {
                return Err(FlowFault::DemandOverrun { limit: demand_max });
            }
            if c.demand + c.buffer >= target || c.demand >= demand_max {
                return Ok(Some((c, Admission::Saturated)));
            }
            if c.supply == 0 {
                return Ok(Some((c, Admission::NoSupply)));
            }
            c.supply -= 1;
            c.demand += 1;
            Ok(Some((c, Admission::Admitted)))
        })?;
        // The closure always yields a value, so the CAS loop cannot abort.
        Ok(admitted.unwrap_or(Admission::NoSupply))
    }

    /// Reverses one `try_admit` (`demand -= 1`, `supply += 1`).
    ///
    /// Used when the admitted credit finds no pending item to carry.
    pub fn undo_admit(&self) -> Result<(), FlowFault> {
        self.transition(|mut c| {
            if c.demand == 0 {
                return Err(FlowFault::Underrun);
            }
            c.demand -= 1;
            c.supply += 1;
            Ok(Some((c, ())))
        })
        .map(|_| ())
    }

    /// Consumes one demand credit for a push (`demand -= 1`, `buffer += 1`).
    ///
    /// Faults with [`FlowFault::Underrun`] when no credit is outstanding and
    /// with [`FlowFault::BufferOverrun`] when the buffer is full.
    pub fn try_push(&self, buffer_max: u32) -> Result<(), FlowFault> {
        self.transition(|mut c| {
            if c.demand == 0 {
                return Err(FlowFault::Underrun);
            }
            if c.buffer >= buffer_max {
                return Err(FlowFault::BufferOverrun { limit: buffer_max });
            }
            c.demand -= 1;
            c.buffer += 1;
            Ok(Some((c, ())))
        })
        .map(|_| ())
    }

    /// Acknowledges one buffered push (`buffer -= 1`).
    pub fn try_ack(&self) -> Result<(), FlowFault> {
        self.transition(|mut c| {
            if c.buffer == 0 {
                return Err(FlowFault::Underrun);
            }
            c.buffer -= 1;
            Ok(Some((c, ())))
        })
        .map(|_| ())
    }

    /// Drops one supplied item without granting demand (`supply -= 1`).
    ///
    /// Returns `false` when supply is already zero.
    pub fn try_skip(&self) -> Result<bool, FlowFault> {
        self.transition(|mut c| {
            if c.supply == 0 {
                return Ok(Some((c, false)));
            }
            c.supply -= 1;
            Ok(Some((c, true)))
        })
        .map(|done| done.unwrap_or(false))
    }

    /// Clears the supply counter, returning how many items it held.
    ///
    /// Used during close and fault recovery to match the number of pending
    /// items being declined.
    pub fn drain_supply(&self) -> u32 {
        let mut current = self.word.load(Ordering::Acquire);
        loop {
            let mut c = unpack(current);
            let drained = c.supply;
            c.supply = 0;
            match self.word.compare_exchange_weak(
                current,
                pack(c),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return drained,
                Err(observed) => current = observed,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_feed_admit_push_ack_round() {
        let s = FlowState::new();
        s.try_feed(16).unwrap();
        assert_eq!(s.counters(), FlowCounters { supply: 1, demand: 0, buffer: 0 });

        assert_eq!(s.try_admit(4, 8).unwrap(), Admission::Admitted);
        assert_eq!(s.counters(), FlowCounters { supply: 0, demand: 1, buffer: 0 });

        s.try_push(8).unwrap();
        assert_eq!(s.counters(), FlowCounters { supply: 0, demand: 0, buffer: 1 });

        s.try_ack().unwrap();
        assert_eq!(s.counters(), FlowCounters { supply: 0, demand: 0, buffer: 0 });
    }

    #[test]
    fn test_feed_overrun_faults() {
        let s = FlowState::new();
        s.try_feed(1).unwrap();
        assert!(matches!(
            s.try_feed(1),
            Err(FlowFault::SupplyOverrun { limit: 1 })
        ));
    }

    #[test]
    fn test_admit_saturates_at_target() {
        let s = FlowState::new();
        for _ in 0..3 {
            s.try_feed(16).unwrap();
        }
        assert_eq!(s.try_admit(2, 8).unwrap(), Admission::Admitted);
        assert_eq!(s.try_admit(2, 8).unwrap(), Admission::Admitted);
        assert_eq!(s.try_admit(2, 8).unwrap(), Admission::Saturated);
        assert_eq!(s.counters().demand, 2);
    }

    #[test]
    fn test_unacked_buffer_counts_toward_target() {
        let s = FlowState::new();
        for _ in 0..3 {
            s.try_feed(16).unwrap();
        }
        assert_eq!(s.try_admit(2, 8).unwrap(), Admission::Admitted);
        s.try_push(8).unwrap();
        // demand == 0 but buffer == 1: in-flight total still caps admission
        // at target = 2.
        assert_eq!(s.try_admit(2, 8).unwrap(), Admission::Admitted);
        assert_eq!(s.try_admit(2, 8).unwrap(), Admission::Saturated);
        s.try_ack().unwrap();
        assert_eq!(s.try_admit(2, 8).unwrap(), Admission::Admitted);
    }

    #[test]
    fn test_admit_without_supply() {
        let s = FlowState::new();
        assert_eq!(s.try_admit(4, 8).unwrap(), Admission::NoSupply);
    }

    #[test]
    fn test_push_without_credit_is_underrun() {
        let s = FlowState::new();
        assert!(matches!(s.try_push(8), Err(FlowFault::Underrun)));
    }

    #[test]
    fn test_ack_without_buffer_is_underrun() {
        let s = FlowState::new();
        assert!(matches!(s.try_ack(), Err(FlowFault::Underrun)));
    }

    #[test]
    fn test_undo_admit_restores_supply() {
        let s = FlowState::new();
        s.try_feed(16).unwrap();
        s.try_admit(4, 8).unwrap();
        s.undo_admit().unwrap();
        assert_eq!(s.counters(), FlowCounters { supply: 1, demand: 0, buffer: 0 });
    }

    #[test]
    fn test_skip_consumes_supply_only() {
        let s = FlowState::new();
        s.try_feed(16).unwrap();
        assert!(s.try_skip().unwrap());
        assert!(!s.try_skip().unwrap());
        assert_eq!(s.counters(), FlowCounters { supply: 0, demand: 0, buffer: 0 });
    }

    #[test]
    fn test_concurrent_feeds_stay_within_bounds() {
        let s = Arc::new(FlowState::new());
        let limit = 64;
        let mut handles = Vec::new();
        for _ in 0..8 {
            let s = Arc::clone(&s);
            handles.push(std::thread::spawn(move || {
                let mut accepted = 0u32;
                for _ in 0..32 {
                    if s.try_feed(limit).is_ok() {
                        accepted += 1;
                    }
                }
                accepted
            }));
        }
        let total: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, limit);
        assert_eq!(s.counters().supply, limit);
    }
}
