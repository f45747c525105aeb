//! # Persistence seam.
//!
//! A tier node acquires its [`StoreHandle`] at `load` time and releases it at
//! `unload`. The core never interprets store contents; storage engines live
//! outside this crate behind the [`Persistence`] trait.

use crate::addr::Address;

/// Opaque handle to durable state for one tier node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreHandle {
    address: Address,
    durable: bool,
}

impl StoreHandle {
    /// Creates a handle for the given address.
    pub fn new(address: Address, durable: bool) -> Self {
        Self { address, durable }
    }

    /// The address this store belongs to.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// False for ephemeral (in-memory) stores.
    pub fn is_durable(&self) -> bool {
        self.durable
    }
}

/// Storage seam consulted when a tier node loads.
pub trait Persistence: Send + Sync + 'static {
    /// Opens (or creates) the durable store for the address.
    fn open_store(&self, address: &Address) -> StoreHandle;
}

/// Default persistence: every store is ephemeral.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStore;

impl Persistence for NoStore {
    fn open_store(&self, address: &Address) -> StoreHandle {
        StoreHandle::new(address.clone(), false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_store_is_ephemeral() {
        let addr = Address::part("p1");
        let handle = NoStore.open_store(&addr);
        assert_eq!(handle.address(), &addr);
        assert!(!handle.is_durable());
    }
}
