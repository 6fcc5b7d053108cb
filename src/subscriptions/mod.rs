//! Queue-based subscriptions for protocol adapters.
//!
//! Callbacks run inside the producer's `update_state` call. Adapters that
//! own an event loop usually prefer a queue they can drain on their own
//! schedule; [`StateStream::subscribe_channel`](crate::StateStream::subscribe_channel)
//! mirrors a stream into a bounded `crossbeam-channel`:
//! - Filtering by channel (data, empty, error)
//! - Bounded buffers with slow-subscriber dropping
//!
//! # Example
//!
//! ```ignore
//! let handle = light.subscribe_channel(SubscriptionConfig::default());
//!
//! loop {
//!     match handle.recv() {
//!         Ok(StreamEvent::Change(change)) => publish(change.to),
//!         Ok(StreamEvent::Dropped { .. }) | Err(_) => break,
//!     }
//! }
//! ```

mod bridge;
mod types;

pub use types::{DropReason, StreamEvent, SubscriptionConfig, SubscriptionFilter, SubscriptionHandle};
