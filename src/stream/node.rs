//! The engine node: current state, previous state and three listener lists.

use super::config::{FaultPolicy, StreamConfig};
use super::sink::Sink;
use crate::error::StreamError;
use crate::scheduler::Scheduler;
use crate::state::{State, StateChange};
use crate::types::{Channel, ListenerId};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use tracing::{debug, error, trace};

/// Snapshot pair, updated together on every dispatch.
struct Snapshots<T> {
    current: Option<State<T>>,
    previous: Option<State<T>>,
}

type DetachHook = Box<dyn FnOnce()>;

struct Registration<T> {
    id: ListenerId,
    sink: Sink<T>,
}

pub(crate) struct Node<T> {
    config: StreamConfig,
    snapshots: RefCell<Snapshots<T>>,
    /// Indexed by `Channel::index`.
    listeners: RefCell<[Vec<Registration<T>>; 3]>,
    next_listener: Cell<u64>,
    faults: Cell<u64>,
    /// Lazily built `changed()` child.
    changed: RefCell<Option<StateStream<T>>>,
    /// Set on `changed()` children, whose output never repeats a value.
    deduplicated: Cell<bool>,
    /// Undo the registrations that feed this node. Only weak handles to
    /// upstream nodes are captured.
    upstream: RefCell<Vec<DetachHook>>,
}

/// Handle to a reactive state node.
///
/// Cloning the handle shares the node. A node lives as long as some handle
/// or some upstream operator entry holds it.
pub struct StateStream<T> {
    node: Rc<Node<T>>,
}

impl<T> Clone for StateStream<T> {
    fn clone(&self) -> Self {
        Self {
            node: Rc::clone(&self.node),
        }
    }
}

impl<T: Clone + 'static> StateStream<T> {
    /// Create an uninitialized stream with the default configuration.
    pub fn new() -> Self {
        Self::with_config(StreamConfig::default())
    }

    pub fn with_config(config: StreamConfig) -> Self {
        Self {
            node: Rc::new(Node {
                config,
                snapshots: RefCell::new(Snapshots {
                    current: None,
                    previous: None,
                }),
                listeners: RefCell::new([Vec::new(), Vec::new(), Vec::new()]),
                next_listener: Cell::new(1),
                faults: Cell::new(0),
                changed: RefCell::new(None),
                deduplicated: Cell::new(false),
                upstream: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Create an uninitialized stream driven by `scheduler`.
    pub fn with_scheduler(scheduler: Scheduler) -> Self {
        Self::with_config(StreamConfig::default().with_scheduler(scheduler))
    }

    pub(crate) fn from_node(node: Rc<Node<T>>) -> Self {
        Self { node }
    }

    pub(crate) fn downgrade(&self) -> Weak<Node<T>> {
        Rc::downgrade(&self.node)
    }

    pub(crate) fn upgrade(node: &Weak<Node<T>>) -> Option<Self> {
        node.upgrade().map(Self::from_node)
    }

    pub(super) fn changed_slot(&self) -> &RefCell<Option<StateStream<T>>> {
        &self.node.changed
    }

    pub(super) fn is_deduplicated(&self) -> bool {
        self.node.deduplicated.get()
    }

    pub(super) fn mark_deduplicated(&self) {
        self.node.deduplicated.set(true);
    }

    /// A fresh child sharing this stream's configuration.
    pub(crate) fn derive<U: Clone + 'static>(&self, operator: &str) -> StateStream<U> {
        StateStream::with_config(self.node.config.derive(operator))
    }

    // --- Producer side ---

    /// Publish a present value.
    pub fn update(&self, value: T) {
        self.update_state(State::from_value(value));
    }

    /// Publish a value, or an empty state for `None`.
    pub fn update_option(&self, value: Option<T>) {
        self.update_state(State::from_option(value));
    }

    pub fn update_empty(&self) {
        self.update_state(State::empty());
    }

    pub fn update_error(&self, error: impl Into<StreamError>) {
        self.update_state(State::from_error(error));
    }

    /// Store `state` verbatim and dispatch it on its channel.
    ///
    /// Returns once every listener, and every stream those listeners feed,
    /// has processed the change.
    pub fn update_state(&self, state: State<T>) {
        let change = {
            let mut snapshots = self.node.snapshots.borrow_mut();
            let repeated_error =
                state.is_error() && snapshots.current.as_ref().is_some_and(State::is_error);
            if !repeated_error {
                snapshots.previous = snapshots.current.take();
            }
            let change = StateChange::new(snapshots.previous.clone(), state.clone());
            snapshots.current = Some(state);
            change
        };
        self.dispatch(&change);
    }

    fn dispatch(&self, change: &StateChange<T>) {
        let channel = change.to.channel();
        let sinks: Vec<Sink<T>> = self.node.listeners.borrow()[channel.index()]
            .iter()
            .map(|registration| registration.sink.clone())
            .collect();

        trace!(
            stream = self.label(),
            %channel,
            listeners = sinks.len(),
            initial = change.is_initial_change(),
            "dispatch"
        );

        let mut dead = false;
        for sink in &sinks {
            if !sink.is_alive() {
                dead = true;
                continue;
            }
            match self.node.config.fault_policy {
                FaultPolicy::Propagate => sink.deliver(change),
                FaultPolicy::Isolate => {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| sink.deliver(change)));
                    if let Err(payload) = outcome {
                        self.record_fault(channel, payload);
                    }
                }
            }
        }

        if dead {
            self.node.listeners.borrow_mut()[channel.index()]
                .retain(|registration| registration.sink.is_alive());
        }
    }

    fn record_fault(&self, channel: Channel, payload: Box<dyn Any + Send>) {
        self.node.faults.set(self.node.faults.get() + 1);
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        let fault = StreamError::ListenerPanicked { channel, message };
        error!(stream = self.label(), error = %fault, "listener fault isolated");
    }

    // --- Consumer side ---

    /// Register `sink` on `channel`, returning a handle for `unsubscribe`.
    pub(crate) fn register(&self, channel: Channel, sink: Sink<T>) -> ListenerId {
        let id = ListenerId(self.node.next_listener.get());
        self.node.next_listener.set(id.0 + 1);
        self.node.listeners.borrow_mut()[channel.index()].push(Registration { id, sink });
        id
    }

    /// Register a callback on `channel`. Past updates are not replayed.
    pub fn subscribe<F>(&self, channel: Channel, listener: F) -> ListenerId
    where
        F: Fn(&StateChange<T>) + 'static,
    {
        self.register(channel, Sink::callback(Rc::new(listener)))
    }

    /// Forward every `channel` transition to `target` without
    /// reclassifying it. `target` is not kept alive by this registration;
    /// keep a handle to it for as long as it should receive updates.
    pub fn subscribe_to(&self, channel: Channel, target: &StateStream<T>) -> ListenerId {
        self.register(channel, Sink::weak(target))
    }

    /// Remove a registration from whichever channel holds it.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.node.listeners.borrow_mut();
        for list in listeners.iter_mut() {
            if let Some(pos) = list.iter().position(|registration| registration.id == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    /// Listen for value transitions.
    pub fn then<F>(&self, listener: F) -> &Self
    where
        F: Fn(&StateChange<T>) + 'static,
    {
        self.subscribe(Channel::Data, listener);
        self
    }

    pub fn on_empty<F>(&self, listener: F) -> &Self
    where
        F: Fn(&StateChange<T>) + 'static,
    {
        self.subscribe(Channel::Empty, listener);
        self
    }

    pub fn on_error<F>(&self, listener: F) -> &Self
    where
        F: Fn(&StateChange<T>) + 'static,
    {
        self.subscribe(Channel::Error, listener);
        self
    }

    /// Forward value transitions to `target`.
    ///
    /// `target` is held weakly: the caller must keep a handle to it, or it
    /// is dropped and silently removed from this stream's listeners.
    pub fn then_to(&self, target: &StateStream<T>) -> &Self {
        self.subscribe_to(Channel::Data, target);
        self
    }

    pub fn on_empty_to(&self, target: &StateStream<T>) -> &Self {
        self.subscribe_to(Channel::Empty, target);
        self
    }

    pub fn on_error_to(&self, target: &StateStream<T>) -> &Self {
        self.subscribe_to(Channel::Error, target);
        self
    }

    /// Forward all three channels to `target`. Held weakly, like `then_to`.
    pub fn forward_to(&self, target: &StateStream<T>) -> &Self {
        for channel in Channel::ALL {
            self.subscribe_to(channel, target);
        }
        self
    }

    // --- Upstream links ---

    /// Run `hook` when this stream is detached.
    pub(crate) fn on_detach<F>(&self, hook: F)
    where
        F: FnOnce() + 'static,
    {
        self.node.upstream.borrow_mut().push(Box::new(hook));
    }

    /// Record the registrations `parent` holds on behalf of this stream.
    pub(crate) fn link<P, I>(&self, parent: &StateStream<P>, ids: I)
    where
        P: Clone + 'static,
        I: IntoIterator<Item = ListenerId>,
    {
        let parent = parent.downgrade();
        let ids: Vec<ListenerId> = ids.into_iter().collect();
        self.on_detach(move || {
            if let Some(parent) = StateStream::upgrade(&parent) {
                for id in ids {
                    parent.unsubscribe(id);
                }
            }
        });
    }

    /// Detach `inner` together with this stream. Used by operators built
    /// from a chain of other operators.
    pub(crate) fn cascade<P: Clone + 'static>(&self, inner: &StateStream<P>) {
        let inner = inner.downgrade();
        self.on_detach(move || {
            if let Some(inner) = StateStream::upgrade(&inner) {
                inner.detach();
            }
        });
    }

    /// Disconnect a derived stream from the streams it was built from.
    ///
    /// The stream keeps its last state and its own listeners, but receives
    /// nothing further. Once no handle remains, the node is freed. Returns
    /// false for streams that were not attached to anything.
    pub fn detach(&self) -> bool {
        let hooks = std::mem::take(&mut *self.node.upstream.borrow_mut());
        if hooks.is_empty() {
            return false;
        }
        debug!(stream = self.label(), links = hooks.len(), "detached");
        for hook in hooks {
            hook();
        }
        true
    }

    /// Whether some upstream registration still feeds this stream.
    pub fn is_attached(&self) -> bool {
        !self.node.upstream.borrow().is_empty()
    }

    // --- Readers ---

    pub fn is_initialized(&self) -> bool {
        self.node.snapshots.borrow().current.is_some()
    }

    /// Latest state, `None` until the first update.
    pub fn state(&self) -> Option<State<T>> {
        self.node.snapshots.borrow().current.clone()
    }

    /// State preceding the latest one. Runs of consecutive errors keep
    /// pointing at the state before the first error.
    pub fn previous(&self) -> Option<State<T>> {
        self.node.snapshots.borrow().previous.clone()
    }

    /// Latest value, absent when uninitialized, empty or errored.
    pub fn value(&self) -> Option<T> {
        self.node
            .snapshots
            .borrow()
            .current
            .as_ref()
            .and_then(State::value)
            .cloned()
    }

    pub fn label(&self) -> &str {
        self.node.config.label.as_deref().unwrap_or("-")
    }

    pub fn config(&self) -> &StreamConfig {
        &self.node.config
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.node.config.scheduler
    }

    pub fn listener_count(&self, channel: Channel) -> usize {
        self.node.listeners.borrow()[channel.index()].len()
    }

    /// Listener panics caught under `FaultPolicy::Isolate`.
    pub fn fault_count(&self) -> u64 {
        self.node.faults.get()
    }

    /// Whether two handles point at the same node.
    pub fn ptr_eq(&self, other: &StateStream<T>) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }
}

impl<T: Clone + 'static> Default for StateStream<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for StateStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshots = self.node.snapshots.borrow();
        f.debug_struct("StateStream")
            .field("label", &self.node.config.label)
            .field("current", &snapshots.current)
            .field("previous", &snapshots.previous)
            .finish()
    }
}
