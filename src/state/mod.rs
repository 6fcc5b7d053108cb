//! Immutable state snapshots and the transitions between them.
//!
//! A [`State`] is exactly one of value, empty or error, stamped with the
//! time it was built. A [`StateChange`] pairs two consecutive states of one
//! stream as seen by a listener.

mod change;
mod snapshot;

pub use change::StateChange;
pub use snapshot::{State, StateData};
