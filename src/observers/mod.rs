//! Observer fan-out for runtime events.
//!
//! An [`Observe`] implementation receives every [`RuntimeEvent`] through a
//! dedicated worker with a bounded queue; slow or panicking observers never
//! block the runtime or each other.
//!
//! [`RuntimeEvent`]: crate::events::RuntimeEvent

mod observer;
mod set;

pub use observer::Observe;
pub use set::ObserverSet;

#[cfg(feature = "logging")]
mod log;
#[cfg(feature = "logging")]
pub use log::LogObserver;
