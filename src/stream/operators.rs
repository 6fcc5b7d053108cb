//! Single-parent operators.
//!
//! Every operator allocates a fresh child stream and installs listeners on
//! its parent. The listener entries own the child; the child only keeps the
//! ids of those entries and a weak handle to the parent, so that
//! [`StateStream::detach`] can remove them. Unless noted, empty and error
//! transitions reach the child unchanged, on the same channel.

use super::node::{Node, StateStream};
use super::sink::Sink;
use crate::error::StreamError;
use crate::state::{State, StateChange};
use crate::types::{Channel, ListenerId, TimerId};
use serde::de::DeserializeOwned;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};
use std::time::Duration;
use tracing::debug;

/// The inner stream a `flat_map` child currently follows.
struct Followed<U> {
    stream: Weak<Node<U>>,
    listeners: Vec<ListenerId>,
}

impl<U: Clone + 'static> Followed<U> {
    fn release(self) {
        if let Some(stream) = StateStream::upgrade(&self.stream) {
            for id in self.listeners {
                stream.unsubscribe(id);
            }
        }
    }
}

impl<T: Clone + 'static> StateStream<T> {
    /// Forward empty and error transitions to a child of the same type.
    fn forward_terminal(&self, child: &StateStream<T>) -> [ListenerId; 2] {
        [
            self.register(Channel::Empty, Sink::owned(child.clone())),
            self.register(Channel::Error, Sink::owned(child.clone())),
        ]
    }

    /// Forward empty and error transitions to a child of another type.
    fn forward_terminal_as<U: Clone + 'static>(&self, child: &StateStream<U>) -> [ListenerId; 2] {
        [Channel::Empty, Channel::Error].map(|channel| {
            let child = child.clone();
            self.subscribe(channel, move |change| {
                if let Some(state) = change.to.retype::<U>() {
                    child.update_state(state);
                }
            })
        })
    }

    fn map_named<U, F>(&self, operator: &str, transform: F) -> StateStream<U>
    where
        U: Clone + 'static,
        F: Fn(&StateChange<T>) -> Option<U> + 'static,
    {
        let child = self.derive::<U>(operator);
        let terminal = self.forward_terminal_as(&child);
        let target = child.clone();
        let data = self.subscribe(Channel::Data, move |change| {
            target.update_option(transform(change))
        });
        child.link(self, terminal.into_iter().chain([data]));
        child
    }

    /// Publish `transform(change)` as a value for every value transition.
    ///
    /// Repeated equal results are all published; combine with `changed()`
    /// to deduplicate.
    pub fn map<U, F>(&self, transform: F) -> StateStream<U>
    where
        U: Clone + 'static,
        F: Fn(&StateChange<T>) -> U + 'static,
    {
        self.map_named("map", move |change| Some(transform(change)))
    }

    /// Like `map`, but a `None` result publishes an empty state.
    pub fn map_option<U, F>(&self, transform: F) -> StateStream<U>
    where
        U: Clone + 'static,
        F: Fn(&StateChange<T>) -> Option<U> + 'static,
    {
        self.map_named("map", transform)
    }

    /// Publish `value` for every value transition, whatever the input.
    pub fn map_to<U: Clone + 'static>(&self, value: U) -> StateStream<U> {
        self.map_named("map_to", move |_| Some(value.clone()))
    }

    /// Forward value transitions accepted by `predicate`, with their
    /// original timestamp. Rejected transitions produce no event at all.
    pub fn filter<P>(&self, predicate: P) -> StateStream<T>
    where
        P: Fn(&StateChange<T>) -> bool + 'static,
    {
        self.filter_named("filter", predicate)
    }

    fn filter_named<P>(&self, operator: &str, predicate: P) -> StateStream<T>
    where
        P: Fn(&StateChange<T>) -> bool + 'static,
    {
        let child = self.derive::<T>(operator);
        let terminal = self.forward_terminal(&child);
        let target = child.clone();
        let data = self.subscribe(Channel::Data, move |change| {
            if predicate(change) {
                target.update_state(change.to.clone());
            }
        });
        child.link(self, terminal.into_iter().chain([data]));
        child
    }

    /// Forward value transitions whose value differs from the previous one
    /// according to `eq`.
    pub fn changed_by<E>(&self, eq: E) -> StateStream<T>
    where
        E: Fn(&T, &T) -> bool + 'static,
    {
        self.filter_named("changed_by", move |change| change.is_changed_by(&eq))
    }

    /// Replace empty transitions with `fallback`. The child never observes
    /// an empty state from this operator.
    pub fn switch_if_empty(&self, fallback: T) -> StateStream<T> {
        self.switch_if_empty_with(move |_| fallback.clone())
    }

    /// Replace empty transitions with a value computed from the transition.
    pub fn switch_if_empty_with<F>(&self, fallback: F) -> StateStream<T>
    where
        F: Fn(&StateChange<T>) -> T + 'static,
    {
        let child = self.derive::<T>("switch_if_empty");
        let data = self.register(Channel::Data, Sink::owned(child.clone()));
        let error = self.register(Channel::Error, Sink::owned(child.clone()));
        let target = child.clone();
        let empty = self.subscribe(Channel::Empty, move |change| target.update(fallback(change)));
        child.link(self, [data, error, empty]);
        child
    }

    /// Trailing-edge debounce: a value is published once no newer value
    /// arrived for `delay`. Empty and error transitions are forwarded at
    /// once and discard the pending value.
    pub fn debounce(&self, delay: Duration) -> StateStream<T> {
        self.debounced("debounce", |_| true, delay)
    }

    /// Debounce only the value transitions accepted by `predicate`; the
    /// others are forwarded at once. Any transition cancels a pending one.
    pub fn debounce_if<P>(&self, predicate: P, delay: Duration) -> StateStream<T>
    where
        P: Fn(&StateChange<T>) -> bool + 'static,
    {
        self.debounced("debounce_if", predicate, delay)
    }

    fn debounced<P>(&self, operator: &str, predicate: P, delay: Duration) -> StateStream<T>
    where
        P: Fn(&StateChange<T>) -> bool + 'static,
    {
        let child = self.derive::<T>(operator);
        let pending: Rc<Cell<Option<TimerId>>> = Rc::new(Cell::new(None));
        let mut ids = self.cancel_on_terminal(&child, &pending);

        let target = child.clone();
        let scheduler = self.scheduler().clone();
        let timer = Rc::clone(&pending);
        ids.push(self.subscribe(Channel::Data, move |change| {
            if let Some(id) = timer.take() {
                scheduler.cancel(id);
            }
            if !predicate(change) {
                target.update_state(change.to.clone());
                return;
            }
            let slot = Rc::clone(&timer);
            let delayed = target.clone();
            let state = change.to.clone();
            let id = scheduler.schedule(delay, move || {
                slot.set(None);
                delayed.update_state(state);
            });
            debug!(stream = target.label(), timer = ?id, ?delay, "emission deferred");
            timer.set(Some(id));
        }));

        child.link(self, ids);
        child.cancel_on_detach(pending);
        child
    }

    /// Forward empty and error transitions at once, dropping the pending
    /// timer of a timed operator.
    fn cancel_on_terminal(
        &self,
        child: &StateStream<T>,
        pending: &Rc<Cell<Option<TimerId>>>,
    ) -> Vec<ListenerId> {
        [Channel::Empty, Channel::Error]
            .into_iter()
            .map(|channel| {
                let target = child.clone();
                let pending = Rc::clone(pending);
                let scheduler = self.scheduler().clone();
                self.subscribe(channel, move |change| {
                    if let Some(id) = pending.take() {
                        scheduler.cancel(id);
                    }
                    target.update_state(change.to.clone());
                })
            })
            .collect()
    }

    /// A detached timed operator must not fire a leftover timer.
    fn cancel_on_detach(&self, pending: Rc<Cell<Option<TimerId>>>) {
        let scheduler = self.scheduler().clone();
        self.on_detach(move || {
            if let Some(id) = pending.take() {
                scheduler.cancel(id);
            }
        });
    }

    /// Drop empty transitions; values and errors pass.
    pub fn non_empty(&self) -> StateStream<T> {
        let child = self.derive::<T>("non_empty");
        let data = self.register(Channel::Data, Sink::owned(child.clone()));
        let error = self.register(Channel::Error, Sink::owned(child.clone()));
        child.link(self, [data, error]);
        child
    }

    /// Pass value transitions only while `enable` holds `true`.
    ///
    /// When `enable` switches to `true`, the current value of this stream,
    /// if any, is published again.
    pub fn gate(&self, enable: &StateStream<bool>) -> StateStream<T> {
        let child = self.derive::<T>("gate");
        let terminal = self.forward_terminal(&child);

        let target = child.clone();
        let gate = enable.downgrade();
        let data = self.subscribe(Channel::Data, move |change| {
            let open = StateStream::upgrade(&gate).and_then(|g| g.value()) == Some(true);
            if open {
                target.update_state(change.to.clone());
            }
        });
        child.link(self, terminal.into_iter().chain([data]));

        let target = child.clone();
        let source = self.downgrade();
        let opened = enable.subscribe(Channel::Data, move |change| {
            if change.to.value() != Some(&true) {
                return;
            }
            if let Some(value) = StateStream::upgrade(&source).and_then(|s| s.value()) {
                target.update(value);
            }
        });
        child.link(enable, [opened]);
        child
    }

    /// Publish each value at once and fall back to `fallback` once `delay`
    /// passes without a newer value.
    pub fn reset_after(&self, delay: Duration, fallback: T) -> StateStream<T> {
        let child = self.derive::<T>("reset_after");
        let pending: Rc<Cell<Option<TimerId>>> = Rc::new(Cell::new(None));
        let mut ids = self.cancel_on_terminal(&child, &pending);

        let target = child.clone();
        let scheduler = self.scheduler().clone();
        let timer = Rc::clone(&pending);
        ids.push(self.subscribe(Channel::Data, move |change| {
            if let Some(id) = timer.take() {
                scheduler.cancel(id);
            }
            let slot = Rc::clone(&timer);
            let resting = target.clone();
            let fallback = fallback.clone();
            let id = scheduler.schedule(delay, move || {
                slot.set(None);
                resting.update(fallback);
            });
            timer.set(Some(id));
            target.update_state(change.to.clone());
        }));

        child.link(self, ids);
        child.cancel_on_detach(pending);
        child
    }

    /// Follow the stream `transform` selects for each value transition.
    ///
    /// Every transition of the selected stream, on any channel, is
    /// forwarded. Selecting another stream unsubscribes from the previous
    /// one; selecting the current one again keeps it; `None` follows
    /// nothing. Selection does not replay the selected stream's current
    /// state. Empty and error transitions of this stream are forwarded.
    pub fn flat_map<U, F>(&self, transform: F) -> StateStream<U>
    where
        U: Clone + 'static,
        F: Fn(&StateChange<T>) -> Option<StateStream<U>> + 'static,
    {
        let child = self.derive::<U>("flat_map");
        let terminal = self.forward_terminal_as(&child);
        let followed: Rc<RefCell<Option<Followed<U>>>> = Rc::new(RefCell::new(None));

        let target = child.clone();
        let current = Rc::clone(&followed);
        let data = self.subscribe(Channel::Data, move |change| {
            let next = transform(change);
            let unchanged = match (current.borrow().as_ref(), next.as_ref()) {
                (Some(prev), Some(next)) => prev.stream.ptr_eq(&next.downgrade()),
                (None, None) => true,
                _ => false,
            };
            if unchanged {
                return;
            }

            let previous = current.borrow_mut().take();
            if let Some(previous) = previous {
                previous.release();
            }
            if let Some(next) = next {
                let listeners = Channel::ALL
                    .into_iter()
                    .map(|channel| next.register(channel, Sink::owned(target.clone())))
                    .collect();
                debug!(stream = target.label(), source = next.label(), "flat_map switched");
                *current.borrow_mut() = Some(Followed {
                    stream: next.downgrade(),
                    listeners,
                });
            }
        });

        child.link(self, terminal.into_iter().chain([data]));
        child.on_detach(move || {
            let previous = followed.borrow_mut().take();
            if let Some(previous) = previous {
                previous.release();
            }
        });
        child
    }

    /// Merge this stream, under the key `"self"`, with the named `others`,
    /// and publish `transform` of the combined map.
    pub fn join<'a, K, I, U, F>(&'a self, others: I, transform: F) -> StateStream<U>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, &'a StateStream<T>)>,
        U: Clone + 'static,
        F: Fn(&StateChange<BTreeMap<String, T>>) -> U + 'static,
    {
        let inputs = std::iter::once((String::from("self"), self))
            .chain(others.into_iter().map(|(name, stream)| (name.into(), stream)));
        let merged = StateStream::merge_map(inputs);
        let child = merged.map(transform);
        child.cascade(&merged);
        child
    }
}

impl<T: Clone + PartialEq + 'static> StateStream<T> {
    /// Forward value transitions whose value differs from the previous one.
    ///
    /// Memoized: every call on the same stream returns the same child, and
    /// calling `changed()` on that child returns the child itself.
    /// Detaching the child clears the memo.
    pub fn changed(&self) -> StateStream<T> {
        if self.is_deduplicated() {
            return self.clone();
        }
        if let Some(child) = self.changed_slot().borrow().as_ref() {
            return child.clone();
        }

        let child = self.filter_named("changed", |change| change.is_changed());
        child.mark_deduplicated();
        let parent = self.downgrade();
        child.on_detach(move || {
            if let Some(parent) = StateStream::upgrade(&parent) {
                parent.changed_slot().borrow_mut().take();
            }
        });
        *self.changed_slot().borrow_mut() = Some(child.clone());
        child
    }

    /// Like `changed()`, but the first value transition is not forwarded.
    pub fn non_initial_changes(&self) -> StateStream<T> {
        self.filter_named("non_initial_changes", |change| {
            !change.is_initial_change() && change.is_changed()
        })
    }

    /// A `true` pulse of length `pulse` after every change of the value,
    /// resting at `false`. The first value does not trigger a pulse.
    pub fn when_changed(&self, pulse: Duration) -> StateStream<bool> {
        let changes = self.non_initial_changes();
        let marks = changes.map_to(true);
        let signal = marks.reset_after(pulse, false);
        marks.cascade(&changes);
        signal.cascade(&marks);
        signal
    }
}

impl<T: Clone + PartialOrd + 'static> StateStream<T> {
    /// Two-threshold switch: `true` above `high`, `false` below `low`,
    /// nothing in between.
    pub fn hysteresis(&self, low: T, high: T) -> StateStream<bool> {
        let child = self.derive::<bool>("hysteresis");
        let terminal = self.forward_terminal_as(&child);
        let target = child.clone();
        let data = self.subscribe(Channel::Data, move |change| {
            let Some(value) = change.to.value() else {
                return;
            };
            if *value > high {
                target.update(true);
            } else if *value < low {
                target.update(false);
            }
        });
        child.link(self, terminal.into_iter().chain([data]));
        child
    }
}

impl StateStream<serde_json::Value> {
    /// Read `key` from object values. A missing key or JSON `null` becomes
    /// an empty state.
    pub fn extract(&self, key: &str) -> StateStream<serde_json::Value> {
        let key = key.to_string();
        self.map_named("extract", move |change| {
            change
                .to
                .value()
                .and_then(|value| value.get(&key))
                .filter(|value| !value.is_null())
                .cloned()
        })
    }

    /// Read `key` and decode it into `U`. Decoding failures are published
    /// on the error channel.
    pub fn extract_as<U>(&self, key: &str) -> StateStream<U>
    where
        U: DeserializeOwned + Clone + 'static,
    {
        let key = key.to_string();
        let child = self.derive::<U>("extract");
        let terminal = self.forward_terminal_as(&child);
        let target = child.clone();
        let data = self.subscribe(Channel::Data, move |change| {
            let field = change.to.value().and_then(|value| value.get(&key));
            let state = match field {
                None | Some(serde_json::Value::Null) => State::empty(),
                Some(field) => match decode::<U>(field) {
                    Ok(value) => State::from_value(value),
                    Err(e) => State::from_error(e),
                },
            };
            target.update_state(state);
        });
        child.link(self, terminal.into_iter().chain([data]));
        child
    }
}

fn decode<U: DeserializeOwned>(value: &serde_json::Value) -> crate::error::Result<U> {
    serde_json::from_value(value.clone()).map_err(StreamError::from)
}
