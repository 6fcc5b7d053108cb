//! Multi-input combinators.
//!
//! Combinators are driven by the value channel of their inputs only: an
//! input moving to empty or error does not trigger the output. Inputs are
//! read through weak handles, so the output never keeps an input alive, and
//! `detach` on the output removes its listeners from every input.

use super::config::StreamConfig;
use super::node::{Node, StateStream};
use crate::types::Channel;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

fn output_config<T: Clone + 'static>(inputs: &[&StateStream<T>], operator: &str) -> StreamConfig {
    inputs
        .first()
        .map(|input| input.config().derive(operator))
        .unwrap_or_default()
}

fn current<T: Clone + 'static>(input: &Weak<Node<T>>) -> Option<T> {
    StateStream::upgrade(input).and_then(|stream| stream.value())
}

impl<T: Clone + 'static> StateStream<T> {
    /// A stream initialized with `value`.
    pub fn just(value: T) -> Self {
        let stream = Self::new();
        stream.update(value);
        stream
    }

    /// Republish every value from any of `inputs`.
    pub fn any(inputs: &[&StateStream<T>]) -> StateStream<T> {
        let output = StateStream::with_config(output_config(inputs, "any"));
        for input in inputs {
            let target = output.clone();
            let id = input.subscribe(Channel::Data, move |change| {
                if let Some(value) = change.to.value() {
                    target.update(value.clone());
                }
            });
            output.link(*input, [id]);
        }
        output
    }

    /// On any input value, publish the current value of every input by
    /// name. Uninitialized, empty and errored inputs are left out.
    pub fn merge_map<'a, K, I>(inputs: I) -> StateStream<BTreeMap<String, T>>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, &'a StateStream<T>)>,
    {
        let named: Vec<(String, &StateStream<T>)> = inputs
            .into_iter()
            .map(|(name, stream)| (name.into(), stream))
            .collect();
        let config = named
            .first()
            .map(|(_, input)| input.config().derive("merge_map"))
            .unwrap_or_default();
        let output = StateStream::with_config(config);

        let sources: Rc<Vec<(String, Weak<Node<T>>)>> = Rc::new(
            named
                .iter()
                .map(|(name, stream)| (name.clone(), stream.downgrade()))
                .collect(),
        );

        for (_, input) in &named {
            let target = output.clone();
            let sources = Rc::clone(&sources);
            let id = input.subscribe(Channel::Data, move |_| {
                let snapshot: BTreeMap<String, T> = sources
                    .iter()
                    .filter_map(|(name, source)| current(source).map(|value| (name.clone(), value)))
                    .collect();
                target.update(snapshot);
            });
            output.link(*input, [id]);
        }
        output
    }

    /// On any input value, publish one slot per input, in input order, each
    /// holding that input's own current value.
    pub fn merge(inputs: &[&StateStream<T>]) -> StateStream<Vec<Option<T>>> {
        let output = StateStream::with_config(output_config(inputs, "merge"));
        let sources: Rc<Vec<Weak<Node<T>>>> =
            Rc::new(inputs.iter().map(|input| input.downgrade()).collect());

        for input in inputs {
            let target = output.clone();
            let sources = Rc::clone(&sources);
            let id = input.subscribe(Channel::Data, move |_| {
                target.update(sources.iter().map(current).collect());
            });
            output.link(*input, [id]);
        }
        output
    }

    /// On any condition or value change, publish the current value of every
    /// pair whose condition is `true`, in pair order. Pairs whose condition
    /// is not `true` are left out, so the output has one slot per true
    /// condition; the slot is `None` while that pair's value stream holds
    /// no value.
    pub fn merge_conditionally(
        pairs: &[(&StateStream<bool>, &StateStream<T>)],
    ) -> StateStream<Vec<Option<T>>> {
        let config = pairs
            .first()
            .map(|(_, value)| value.config().derive("merge_conditionally"))
            .unwrap_or_default();
        let output = StateStream::with_config(config);

        let sources: Vec<(Weak<Node<bool>>, Weak<Node<T>>)> = pairs
            .iter()
            .map(|(condition, value)| (condition.downgrade(), value.downgrade()))
            .collect();
        let target = output.clone();
        let publish: Rc<dyn Fn()> = Rc::new(move || {
            let selected: Vec<Option<T>> = sources
                .iter()
                .filter(|(condition, _)| current(condition) == Some(true))
                .map(|(_, value)| current(value))
                .collect();
            target.update(selected);
        });

        for (condition, value) in pairs {
            let trigger = Rc::clone(&publish);
            let id = condition.subscribe(Channel::Data, move |_| trigger());
            output.link(*condition, [id]);
            let trigger = Rc::clone(&publish);
            let id = value.subscribe(Channel::Data, move |_| trigger());
            output.link(*value, [id]);
        }
        output
    }
}

impl StateStream<bool> {
    /// `true` while at least one input holds `true`.
    pub fn any_of(inputs: &[&StateStream<bool>]) -> StateStream<bool> {
        let merged = StateStream::merge(inputs);
        let output = merged.map(|change| {
            change
                .to
                .value()
                .is_some_and(|slots| slots.iter().any(|slot| *slot == Some(true)))
        });
        output.cascade(&merged);
        output
    }

    /// `true` while every input holds `true`. Uninitialized inputs count as
    /// `false`.
    pub fn all_of(inputs: &[&StateStream<bool>]) -> StateStream<bool> {
        let merged = StateStream::merge(inputs);
        let output = merged.map(|change| {
            change
                .to
                .value()
                .is_some_and(|slots| slots.iter().all(|slot| *slot == Some(true)))
        });
        output.cascade(&merged);
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_just() {
        let stream = StateStream::just(3);
        assert!(stream.is_initialized());
        assert_eq!(stream.value(), Some(3));
    }

    #[test]
    fn test_output_does_not_keep_inputs_alive() {
        let a: StateStream<i32> = StateStream::new();
        let b: StateStream<i32> = StateStream::new();
        let merged = StateStream::merge(&[&a, &b]);

        a.update(1);
        drop(b);
        a.update(2);

        assert_eq!(merged.value(), Some(vec![Some(2), None]));
    }

    #[test]
    fn test_any_of_all_of() {
        let door: StateStream<bool> = StateStream::new();
        let window: StateStream<bool> = StateStream::new();
        let open = StateStream::any_of(&[&door, &window]);
        let sealed_check = StateStream::all_of(&[&door, &window]);

        door.update(true);
        assert_eq!(open.value(), Some(true));
        assert_eq!(sealed_check.value(), Some(false));

        window.update(true);
        assert_eq!(sealed_check.value(), Some(true));

        door.update(false);
        window.update(false);
        assert_eq!(open.value(), Some(false));
    }

    #[test]
    fn test_merge_conditionally_keeps_slot_for_unset_value() {
        let first_on: StateStream<bool> = StateStream::new();
        let first: StateStream<i32> = StateStream::new();
        let second_on: StateStream<bool> = StateStream::new();
        let second: StateStream<i32> = StateStream::new();
        let out = StateStream::merge_conditionally(&[(&first_on, &first), (&second_on, &second)]);

        first_on.update(true);
        second_on.update(true);
        second.update(2);

        assert_eq!(out.value(), Some(vec![None, Some(2)]));
    }

    #[test]
    fn test_detach_removes_listeners_from_every_input() {
        let a: StateStream<i32> = StateStream::new();
        let b: StateStream<i32> = StateStream::new();
        let merged = StateStream::merge(&[&a, &b]);
        let any = StateStream::any(&[&a, &b]);

        assert!(merged.detach());
        assert!(any.detach());
        assert_eq!(a.listener_count(Channel::Data), 0);
        assert_eq!(b.listener_count(Channel::Data), 0);

        a.update(1);
        assert!(!merged.is_initialized());
        assert!(!any.is_initialized());
    }

    #[test]
    fn test_detach_all_of_releases_inner_merge() {
        let door: StateStream<bool> = StateStream::new();
        let window: StateStream<bool> = StateStream::new();
        let sealed = StateStream::all_of(&[&door, &window]);

        sealed.detach();

        assert_eq!(door.listener_count(Channel::Data), 0);
        assert_eq!(window.listener_count(Channel::Data), 0);
    }
}
