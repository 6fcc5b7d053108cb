//! Property tests for the base engine.

use proptest::prelude::*;
use state_stream::{Channel, StateStream};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Clone, Debug)]
enum Input {
    Value(i64),
    Empty,
    Error(String),
}

fn input() -> impl Strategy<Value = Input> {
    prop_oneof![
        4 => any::<i64>().prop_map(Input::Value),
        1 => Just(Input::Empty),
        1 => "[a-z]{1,8}".prop_map(Input::Error),
    ]
}

proptest! {
    #[test]
    fn value_round_trips_unchanged(value in any::<String>()) {
        let stream: StateStream<String> = StateStream::new();
        stream.update(value.clone());
        prop_assert_eq!(stream.state().and_then(|s| s.into_value()), Some(value));
    }

    #[test]
    fn exactly_one_channel_per_update(inputs in prop::collection::vec(input(), 1..40)) {
        let stream: StateStream<i64> = StateStream::new();
        let fired = Rc::new(RefCell::new(Vec::new()));
        for channel in Channel::ALL {
            let fired = Rc::clone(&fired);
            stream.subscribe(channel, move |_| fired.borrow_mut().push(channel));
        }

        for item in &inputs {
            match item {
                Input::Value(v) => stream.update(*v),
                Input::Empty => stream.update_empty(),
                Input::Error(e) => stream.update_error(e.as_str()),
            }
        }

        let fired = fired.borrow();
        prop_assert_eq!(fired.len(), inputs.len());
        for (channel, item) in fired.iter().zip(&inputs) {
            let expected = match item {
                Input::Value(_) => Channel::Data,
                Input::Empty => Channel::Empty,
                Input::Error(_) => Channel::Error,
            };
            prop_assert_eq!(*channel, expected);
        }
    }

    #[test]
    fn previous_is_never_an_error_after_a_repeat(inputs in prop::collection::vec(input(), 2..40)) {
        let stream: StateStream<i64> = StateStream::new();
        let mut last_was_error = false;
        for item in &inputs {
            let is_error = matches!(item, Input::Error(_));
            match item {
                Input::Value(v) => stream.update(*v),
                Input::Empty => stream.update_empty(),
                Input::Error(e) => stream.update_error(e.as_str()),
            }
            if is_error && last_was_error {
                prop_assert!(!stream.previous().is_some_and(|s| s.is_error()));
            }
            last_was_error = is_error;
        }
    }

    #[test]
    fn changed_never_repeats_a_value(values in prop::collection::vec(0i64..4, 1..40)) {
        let stream: StateStream<i64> = StateStream::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        stream.changed().then(move |change| s.borrow_mut().push(*change.to.value().unwrap()));

        for v in &values {
            stream.update(*v);
        }

        let mut expected = values.clone();
        expected.dedup();
        prop_assert_eq!(&*seen.borrow(), &expected);
    }
}
