//! Types for queue-based subscriptions.

use crate::state::StateChange;
use crate::stream::Node;
use crate::types::{Channel, ListenerId};
use crossbeam_channel::{Receiver, RecvError, RecvTimeoutError, Sender, TryRecvError};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

/// Configuration for a subscription.
#[derive(Clone, Debug)]
pub struct SubscriptionConfig {
    /// Max buffered events before dropping the subscriber.
    /// Default: 1000
    pub buffer_size: usize,

    /// Filter criteria.
    pub filter: SubscriptionFilter,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1000,
            filter: SubscriptionFilter::all(),
        }
    }
}

/// Which channels feed the subscription.
#[derive(Clone, Debug, Default)]
pub struct SubscriptionFilter {
    pub include_data: bool,
    pub include_empty: bool,
    pub include_errors: bool,
}

impl SubscriptionFilter {
    /// Value transitions only.
    pub fn data() -> Self {
        Self {
            include_data: true,
            ..Default::default()
        }
    }

    /// Empty and error transitions only.
    pub fn terminal() -> Self {
        Self {
            include_empty: true,
            include_errors: true,
            ..Default::default()
        }
    }

    /// Every transition.
    pub fn all() -> Self {
        Self {
            include_data: true,
            include_empty: true,
            include_errors: true,
        }
    }

    pub(crate) fn channels(&self) -> Vec<Channel> {
        let mut channels = Vec::with_capacity(3);
        if self.include_data {
            channels.push(Channel::Data);
        }
        if self.include_empty {
            channels.push(Channel::Empty);
        }
        if self.include_errors {
            channels.push(Channel::Error);
        }
        channels
    }
}

/// Events delivered through a subscription queue.
#[derive(Clone, Debug)]
pub enum StreamEvent<T> {
    /// A transition on one of the subscribed channels.
    Change(StateChange<T>),

    /// Subscription was dropped; no further events follow.
    Dropped { reason: DropReason },
}

/// Why a subscription was dropped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Receiver was dropped.
    Disconnected,
    /// Explicitly closed.
    Unsubscribed,
}

/// Listener registrations backing one subscription.
pub(crate) struct Attachment<T> {
    pub(crate) source: Weak<Node<T>>,
    pub(crate) listeners: RefCell<Vec<ListenerId>>,
    /// Taken on detach, which disconnects the receiving end once drained.
    pub(crate) sender: RefCell<Option<Sender<StreamEvent<T>>>>,
}

/// Handle to a queue-based subscription.
pub struct SubscriptionHandle<T> {
    pub(crate) receiver: Receiver<StreamEvent<T>>,
    pub(crate) attachment: Rc<Attachment<T>>,
}

impl<T> SubscriptionHandle<T> {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<StreamEvent<T>, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<StreamEvent<T>, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<StreamEvent<T>, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Events waiting in the queue.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// False once the subscription was closed or dropped.
    pub fn is_active(&self) -> bool {
        self.attachment.sender.borrow().is_some()
    }

    /// The underlying receiver, for moving the consuming end to another
    /// thread.
    pub fn receiver(&self) -> Receiver<StreamEvent<T>> {
        self.receiver.clone()
    }
}
