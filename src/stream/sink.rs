//! Things a stream can dispatch to.

use super::node::{Node, StateStream};
use crate::state::StateChange;
use std::rc::{Rc, Weak};

pub(crate) type Listener<T> = Rc<dyn Fn(&StateChange<T>)>;

/// A registered listener entry.
pub(crate) struct Sink<T> {
    kind: SinkKind<T>,
}

enum SinkKind<T> {
    /// User callback.
    Callback(Listener<T>),
    /// Stream owned by the operator that installed this entry.
    Owned(StateStream<T>),
    /// Stream registered by the caller. Dispatch-only: the entry does not
    /// keep the stream alive.
    Weak(Weak<Node<T>>),
}

impl<T> Clone for Sink<T> {
    fn clone(&self) -> Self {
        let kind = match &self.kind {
            SinkKind::Callback(listener) => SinkKind::Callback(Rc::clone(listener)),
            SinkKind::Owned(stream) => SinkKind::Owned(stream.clone()),
            SinkKind::Weak(node) => SinkKind::Weak(Weak::clone(node)),
        };
        Self { kind }
    }
}

impl<T: Clone + 'static> Sink<T> {
    pub(crate) fn owned(stream: StateStream<T>) -> Self {
        Self {
            kind: SinkKind::Owned(stream),
        }
    }

    pub(crate) fn callback(listener: Listener<T>) -> Self {
        Self {
            kind: SinkKind::Callback(listener),
        }
    }

    pub(crate) fn weak(stream: &StateStream<T>) -> Self {
        Self {
            kind: SinkKind::Weak(stream.downgrade()),
        }
    }

    /// Deliver one change. Stream sinks receive the target state verbatim.
    pub(crate) fn deliver(&self, change: &StateChange<T>) {
        match &self.kind {
            SinkKind::Callback(listener) => listener(change),
            SinkKind::Owned(stream) => stream.update_state(change.to.clone()),
            SinkKind::Weak(node) => {
                if let Some(node) = node.upgrade() {
                    StateStream::from_node(node).update_state(change.to.clone());
                }
            }
        }
    }

    /// False once a weakly held stream has been dropped.
    pub(crate) fn is_alive(&self) -> bool {
        match &self.kind {
            SinkKind::Weak(node) => node.strong_count() > 0,
            _ => true,
        }
    }
}
