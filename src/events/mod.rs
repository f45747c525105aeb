//! Runtime events and the broadcast bus that carries them.
//!
//! Every notable state change in the tree (tier transitions, child table
//! activity, link lifecycle, push outcomes) is published as a
//! [`RuntimeEvent`] on the [`Bus`]. Observers consume them through the
//! fan-out in [`crate::observers`].

mod bus;
mod event;

pub use bus::Bus;
pub use event::{EventKind, RuntimeEvent};
