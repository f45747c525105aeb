//! Hierarchical addressing: tier kinds and immutable addresses.
//!
//! An [`Address`] names a coordinate in the mesh → part → host → node → lane
//! namespace; a [`TierKind`] names one level of it. Addresses are immutable
//! values with structural equality; any suffix may be absent, denoting a
//! coarser-grained target.

mod address;
mod kind;

pub use address::{Address, AddressError};
pub use kind::TierKind;
