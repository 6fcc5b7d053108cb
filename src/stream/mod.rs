//! The state-propagation engine.
//!
//! A [`StateStream`] holds the latest [`State`](crate::State) of a
//! time-varying value and pushes every change, synchronously and in
//! registration order, to the listeners of exactly one channel:
//! - data listeners for values
//! - empty listeners for intentionally absent values
//! - error listeners for faults
//!
//! Operators (`map`, `filter`, `changed`, `debounce`, ...) derive new
//! streams from one parent; combinators (`any`, `merge`, `merge_map`,
//! `merge_conditionally`) fan several inputs into one output. A derived
//! stream lives as long as its inputs do; [`StateStream::detach`] unhooks
//! it earlier.
//!
//! # Example
//!
//! ```ignore
//! let temperature: StateStream<f64> = StateStream::new();
//!
//! temperature
//!     .hysteresis(18.0, 22.0)
//!     .changed()
//!     .then(|change| println!("heating: {:?}", change.to.value()));
//!
//! temperature.update(17.2);
//! ```

mod combinators;
mod config;
mod node;
mod operators;
mod sink;

pub use config::{FaultPolicy, StreamConfig};
pub use node::StateStream;
pub(crate) use node::Node;
