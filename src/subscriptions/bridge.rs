//! Attaching bounded queues to streams.

use super::types::{Attachment, DropReason, StreamEvent, SubscriptionConfig, SubscriptionHandle};
use crate::state::StateChange;
use crate::stream::StateStream;
use crossbeam_channel::{bounded, TrySendError};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, warn};

impl<T: Clone + 'static> StateStream<T> {
    /// Mirror the selected channels of this stream into a bounded queue.
    ///
    /// A consumer that lets the queue fill up is dropped: its listeners are
    /// removed and the queue disconnects once drained.
    pub fn subscribe_channel(&self, config: SubscriptionConfig) -> SubscriptionHandle<T> {
        let (sender, receiver) = bounded(config.buffer_size);
        let attachment = Rc::new(Attachment {
            source: self.downgrade(),
            listeners: RefCell::new(Vec::new()),
            sender: RefCell::new(Some(sender)),
        });

        for channel in config.filter.channels() {
            let target = Rc::clone(&attachment);
            let id = self.subscribe(channel, move |change| deliver(&target, change));
            attachment.listeners.borrow_mut().push(id);
        }

        debug!(
            stream = self.label(),
            buffer_size = config.buffer_size,
            "queue subscription attached"
        );

        SubscriptionHandle {
            receiver,
            attachment,
        }
    }
}

impl<T: Clone + 'static> SubscriptionHandle<T> {
    /// Detach from the stream. A final `Dropped { Unsubscribed }` event is
    /// queued behind the pending ones (best effort).
    pub fn close(&self) {
        detach(&self.attachment, DropReason::Unsubscribed);
    }
}

fn deliver<T: Clone + 'static>(attachment: &Attachment<T>, change: &StateChange<T>) {
    let outcome = {
        let sender = attachment.sender.borrow();
        match sender.as_ref() {
            Some(sender) => sender.try_send(StreamEvent::Change(change.clone())),
            None => return,
        }
    };

    match outcome {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            warn!("queue subscription dropped: buffer overflow");
            detach(attachment, DropReason::BufferOverflow);
        }
        Err(TrySendError::Disconnected(_)) => {
            debug!("queue subscription dropped: receiver gone");
            detach(attachment, DropReason::Disconnected);
        }
    }
}

/// Remove the listeners and release the sender. Idempotent.
fn detach<T: Clone + 'static>(attachment: &Attachment<T>, reason: DropReason) {
    let sender = attachment.sender.borrow_mut().take();
    let Some(sender) = sender else {
        return;
    };

    // Might fail if the buffer is full, that's ok
    let _ = sender.try_send(StreamEvent::Dropped { reason });

    if let Some(source) = StateStream::upgrade(&attachment.source) {
        for id in attachment.listeners.borrow_mut().drain(..) {
            source.unsubscribe(id);
        }
    }
}
