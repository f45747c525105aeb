//! # The child table: race-free installation with snapshot reads.
//!
//! Every container node owns a [`ChildTable`] mapping `(kind, name)` to the
//! installed child binding. The table is read-copy-update: readers clone an
//! `Arc` to an immutable map, writers swap in a rebuilt map under a short
//! lock.
//!
//! ## Invariants
//! - At most one child is ever installed per key; concurrent installers get
//!   exactly one winner and the losers receive the winner back.
//! - The write lock covers only the pointer swap; no hook, policy, or
//!   decorator code ever runs under it.
//! - Snapshots are immutable: iteration never observes a torn table.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::addr::TierKind;

use super::binding::TierBinding;

/// Key of one child within its parent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChildKey {
    /// The child's tier kind.
    pub kind: TierKind,
    /// The child's local name.
    pub name: Arc<str>,
}

impl ChildKey {
    /// Creates a key.
    pub fn new(kind: TierKind, name: impl Into<Arc<str>>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

type Snapshot = Arc<HashMap<ChildKey, Arc<dyn TierBinding>>>;

/// Concurrent child registry with copy-on-write snapshots.
#[derive(Default)]
pub struct ChildTable {
    map: RwLock<Snapshot>,
}

impl ChildTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The child installed under `key`, if any.
    pub fn get(&self, key: &ChildKey) -> Option<Arc<dyn TierBinding>> {
        self.map.read().get(key).cloned()
    }

    /// A point-in-time snapshot of all children.
    pub fn snapshot(&self) -> Snapshot {
        Arc::clone(&self.map.read())
    }

    /// Installs `child` under `key` unless a child is already installed.
    ///
    /// On conflict the caller's candidate is rejected and the installed
    /// winner is returned as the error value.
    pub fn install(
        &self,
        key: ChildKey,
        child: Arc<dyn TierBinding>,
    ) -> Result<(), Arc<dyn TierBinding>> {
        let mut guard = self.map.write();
        if let Some(winner) = guard.get(&key) {
            return Err(Arc::clone(winner));
        }
        let mut next = (**guard).clone();
        next.insert(key, child);
        *guard = Arc::new(next);
        Ok(())
    }

    /// Removes and returns the child under `key`.
    pub fn remove(&self, key: &ChildKey) -> Option<Arc<dyn TierBinding>> {
        let mut guard = self.map.write();
        if !guard.contains_key(key) {
            return None;
        }
        let mut next = (**guard).clone();
        let removed = next.remove(key);
        *guard = Arc::new(next);
        removed
    }

    /// Empties the table, returning every child it held.
    pub fn clear(&self) -> Vec<Arc<dyn TierBinding>> {
        let mut guard = self.map.write();
        let drained = guard.values().cloned().collect();
        *guard = Arc::new(HashMap::new());
        drained
    }

    /// Number of installed children.
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    /// True when no children are installed.
    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}
