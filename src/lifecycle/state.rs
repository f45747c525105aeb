//! # Atomic per-node phase claims.
//!
//! Every tier node carries one [`LifecycleState`]: a bitmask of phases the
//! node has claimed, updated by compare-and-swap. Claiming is how a
//! transition wins the right to run its hooks and phase action exactly once;
//! concurrent callers that lose the claim observe the already-advanced state
//! and return without effect.
//!
//! ## Rules
//! - A phase bit is set at most once per node (barring an explicit
//!   [`release`](LifecycleState::release) after a failed `will` hook).
//! - Once `Closed` is set no further claim succeeds; close is terminal.
//! - Reads are lock-free snapshots.

use std::sync::atomic::{AtomicU8, Ordering};

use super::phase::Phase;

/// Atomic set of claimed lifecycle phases.
#[derive(Debug, Default)]
pub struct LifecycleState {
    bits: AtomicU8,
}

impl LifecycleState {
    /// A fresh state: only `Created`, nothing claimed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to claim `phase`. Returns `true` exactly once per phase.
    ///
    /// Fails when the phase was already claimed or the node is closed
    /// (claiming `Closed` itself is the one transition allowed out of any
    /// non-closed state).
    pub fn claim(&self, phase: Phase) -> bool {
        let bit = phase.bit();
        if bit == 0 {
            return false;
        }
        let closed = Phase::Closed.bit();
        let mut current = self.bits.load(Ordering::Acquire);
        loop {
            if current & closed != 0 || current & bit != 0 {
                return false;
            }
            match self.bits.compare_exchange(
                current,
                current | bit,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    /// Releases a claimed phase after a failed `will` hook.
    ///
    /// The transition did not run; the node's phase stays wherever it was.
    pub fn release(&self, phase: Phase) {
        let bit = phase.bit();
        if bit != 0 {
            self.bits.fetch_and(!bit, Ordering::AcqRel);
        }
    }

    /// True when the node has claimed `phase` (always true for `Created`).
    pub fn has_reached(&self, phase: Phase) -> bool {
        let bit = phase.bit();
        bit == 0 || self.bits.load(Ordering::Acquire) & bit != 0
    }

    /// True once `Closed` is claimed.
    pub fn is_closed(&self) -> bool {
        self.has_reached(Phase::Closed)
    }

    /// The deepest claimed phase (`Created` when nothing is claimed).
    pub fn current(&self) -> Phase {
        let bits = self.bits.load(Ordering::Acquire);
        let mut current = Phase::Created;
        for phase in Phase::TRANSITIONS {
            if bits & phase.bit() != 0 {
                current = phase;
            }
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_is_at_most_once() {
        let state = LifecycleState::new();
        assert!(state.claim(Phase::Opened));
        assert!(!state.claim(Phase::Opened));
        assert!(state.has_reached(Phase::Opened));
    }

    #[test]
    fn test_closed_is_terminal() {
        let state = LifecycleState::new();
        assert!(state.claim(Phase::Closed));
        assert!(state.is_closed());
        for phase in [Phase::Opened, Phase::Loaded, Phase::Started] {
            assert!(!state.claim(phase), "{phase} claimable after close");
        }
        assert!(!state.claim(Phase::Closed));
    }

    #[test]
    fn test_release_undoes_claim() {
        let state = LifecycleState::new();
        assert!(state.claim(Phase::Opened));
        state.release(Phase::Opened);
        assert!(!state.has_reached(Phase::Opened));
        assert!(state.claim(Phase::Opened));
    }

    #[test]
    fn test_current_tracks_deepest_phase() {
        let state = LifecycleState::new();
        assert_eq!(state.current(), Phase::Created);
        state.claim(Phase::Opened);
        state.claim(Phase::Loaded);
        assert_eq!(state.current(), Phase::Loaded);
        state.claim(Phase::Started);
        state.claim(Phase::Stopped);
        assert_eq!(state.current(), Phase::Stopped);
    }

    #[test]
    fn test_created_is_always_reached() {
        let state = LifecycleState::new();
        assert!(state.has_reached(Phase::Created));
    }

    #[test]
    fn test_concurrent_claims_single_winner() {
        use std::sync::Arc;

        let state = Arc::new(LifecycleState::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let s = Arc::clone(&state);
            handles.push(std::thread::spawn(move || s.claim(Phase::Opened)));
        }
        let wins: usize = handles
            .into_iter()
            .map(|h| usize::from(h.join().unwrap()))
            .sum();
        assert_eq!(wins, 1);
    }
}
