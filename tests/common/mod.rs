//! Shared test helpers.
#![allow(dead_code)]

use state_stream::{StateChange, StateStream};
use std::cell::RefCell;
use std::rc::Rc;

/// Records every transition a stream dispatches, per channel.
pub struct Recorder<T> {
    data: Rc<RefCell<Vec<StateChange<T>>>>,
    empty: Rc<RefCell<Vec<StateChange<T>>>>,
    error: Rc<RefCell<Vec<StateChange<T>>>>,
}

impl<T: Clone + 'static> Recorder<T> {
    pub fn attach(stream: &StateStream<T>) -> Self {
        let recorder = Self {
            data: Rc::new(RefCell::new(Vec::new())),
            empty: Rc::new(RefCell::new(Vec::new())),
            error: Rc::new(RefCell::new(Vec::new())),
        };
        let data = Rc::clone(&recorder.data);
        let empty = Rc::clone(&recorder.empty);
        let error = Rc::clone(&recorder.error);
        stream
            .then(move |change| data.borrow_mut().push(change.clone()))
            .on_empty(move |change| empty.borrow_mut().push(change.clone()))
            .on_error(move |change| error.borrow_mut().push(change.clone()));
        recorder
    }

    pub fn data(&self) -> Vec<StateChange<T>> {
        self.data.borrow().clone()
    }

    pub fn empty(&self) -> Vec<StateChange<T>> {
        self.empty.borrow().clone()
    }

    pub fn errors(&self) -> Vec<StateChange<T>> {
        self.error.borrow().clone()
    }

    pub fn last_data(&self) -> Option<StateChange<T>> {
        self.data.borrow().last().cloned()
    }

    pub fn total(&self) -> usize {
        self.data.borrow().len() + self.empty.borrow().len() + self.error.borrow().len()
    }
}

/// `(from value, to value)` of a change. The outer `None` on the left
/// means the change was the initial one.
pub fn values<T: Clone>(change: &StateChange<T>) -> (Option<Option<T>>, Option<T>) {
    (
        change.from.as_ref().map(|state| state.value().cloned()),
        change.to.value().cloned(),
    )
}

pub fn s(value: &str) -> String {
    value.to_string()
}
