//! # State Stream
//!
//! In-process reactive state propagation: a node holds the latest snapshot
//! of a time-varying value and pushes every change to its listeners and to
//! the streams derived from it.
//!
//! ## Core Concepts
//!
//! - **State**: Immutable snapshot, exactly one of value, empty or error
//! - **StateChange**: The `(from, to)` pair a listener observes
//! - **StateStream**: The engine node with data, empty and error channels
//! - **Operators**: `map`, `filter`, `changed`, `switch_if_empty`, `debounce`, ...
//! - **Combinators**: `any`, `merge`, `merge_map`, `merge_conditionally`
//!
//! Dispatch is synchronous and depth-first: `update_state` returns once
//! every reachable listener has seen the change. Only the timed operators
//! defer work, onto a host-driven [`Scheduler`].
//!
//! ## Example
//!
//! ```ignore
//! use state_stream::{StateStream, StreamConfig};
//! use std::time::Duration;
//!
//! let motion: StateStream<bool> = StateStream::with_config(StreamConfig::labelled("hall.motion"));
//! let lux: StateStream<f64> = StateStream::new();
//!
//! let dark = lux.hysteresis(40.0, 60.0).map(|change| !change.to.value().copied().unwrap_or(false));
//! let light = StateStream::all_of(&[&motion, &dark])
//!     .switch_if_empty(false)
//!     .debounce_if(|change| change.to.value() == Some(&false), Duration::from_secs(30))
//!     .changed();
//!
//! light.then(|change| println!("light on: {:?}", change.to.value()));
//!
//! lux.update(12.0);
//! motion.update(true);
//! ```

pub mod error;
pub mod scheduler;
pub mod state;
pub mod stream;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use error::{Result, StreamError};
pub use scheduler::Scheduler;
pub use state::{State, StateChange, StateData};
pub use stream::{FaultPolicy, StateStream, StreamConfig};
pub use subscriptions::{
    DropReason, StreamEvent, SubscriptionConfig, SubscriptionFilter, SubscriptionHandle,
};
pub use types::*;
