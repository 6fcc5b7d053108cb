//! Static combinators: any, merge, merge_map, merge_conditionally.

mod common;

use common::{s, Recorder};
use state_stream::{Channel, StateStream};
use std::collections::BTreeMap;

#[test]
fn test_any_republishes_each_input() {
    let kitchen: StateStream<String> = StateStream::new();
    let hall: StateStream<String> = StateStream::new();
    let any = StateStream::any(&[&kitchen, &hall]);
    let recorder = Recorder::attach(&any);

    kitchen.update(s("k1"));
    hall.update(s("h1"));
    kitchen.update(s("k2"));

    let seen: Vec<String> = recorder.data().iter().filter_map(|c| c.to.value().cloned()).collect();
    assert_eq!(seen, vec![s("k1"), s("h1"), s("k2")]);
}

#[test]
fn test_any_ignores_empty_and_error() {
    let a: StateStream<i32> = StateStream::new();
    let any = StateStream::any(&[&a]);
    let recorder = Recorder::attach(&any);

    a.update_empty();
    a.update_error("error");

    assert_eq!(recorder.total(), 0);
    assert!(!any.is_initialized());
}

#[test]
fn test_merge_slots_follow_their_own_input() {
    let a: StateStream<i32> = StateStream::new();
    let b: StateStream<i32> = StateStream::new();
    let c: StateStream<i32> = StateStream::new();
    let merged = StateStream::merge(&[&a, &b, &c]);

    a.update(1);
    assert_eq!(merged.value(), Some(vec![Some(1), None, None]));

    c.update(3);
    assert_eq!(merged.value(), Some(vec![Some(1), None, Some(3)]));

    b.update(2);
    assert_eq!(merged.value(), Some(vec![Some(1), Some(2), Some(3)]));
}

#[test]
fn test_merge_reads_empty_input_as_absent() {
    let a: StateStream<i32> = StateStream::new();
    let b: StateStream<i32> = StateStream::new();
    let merged = StateStream::merge(&[&a, &b]);

    b.update(2);
    a.update(1);
    b.update_empty();
    assert_eq!(merged.value(), Some(vec![Some(1), Some(2)]));

    a.update(10);
    assert_eq!(merged.value(), Some(vec![Some(10), None]));
}

#[test]
fn test_merge_map() {
    let temperature: StateStream<f64> = StateStream::new();
    let humidity: StateStream<f64> = StateStream::new();
    let climate = StateStream::merge_map([("temperature", &temperature), ("humidity", &humidity)]);

    temperature.update(21.5);
    let mut expected = BTreeMap::new();
    expected.insert(s("temperature"), 21.5);
    assert_eq!(climate.value(), Some(expected.clone()));

    humidity.update(40.0);
    expected.insert(s("humidity"), 40.0);
    assert_eq!(climate.value(), Some(expected));
}

#[test]
fn test_merge_conditionally() {
    let heating: StateStream<bool> = StateStream::new();
    let cooling: StateStream<bool> = StateStream::new();
    let heat_msg: StateStream<String> = StateStream::new();
    let cool_msg: StateStream<String> = StateStream::new();
    let active = StateStream::merge_conditionally(&[(&heating, &heat_msg), (&cooling, &cool_msg)]);
    let recorder = Recorder::attach(&active);

    heat_msg.update(s("heat"));
    cool_msg.update(s("cool"));
    assert_eq!(active.value(), Some(vec![]));

    heating.update(true);
    assert_eq!(active.value(), Some(vec![Some(s("heat"))]));

    cooling.update(true);
    assert_eq!(active.value(), Some(vec![Some(s("heat")), Some(s("cool"))]));

    heating.update(false);
    assert_eq!(active.value(), Some(vec![Some(s("cool"))]));

    assert_eq!(recorder.data().len(), 5);
}

#[test]
fn test_merge_conditionally_length_follows_true_conditions() {
    let enabled: StateStream<bool> = StateStream::new();
    let payload: StateStream<i32> = StateStream::new();
    let other_enabled: StateStream<bool> = StateStream::new();
    let other_payload: StateStream<i32> = StateStream::new();
    let out = StateStream::merge_conditionally(&[(&enabled, &payload), (&other_enabled, &other_payload)]);

    enabled.update(true);
    assert_eq!(out.value(), Some(vec![None]));

    other_enabled.update(true);
    other_payload.update(2);
    assert_eq!(out.value(), Some(vec![None, Some(2)]));

    payload.update(7);
    assert_eq!(out.value(), Some(vec![Some(7), Some(2)]));
}

#[test]
fn test_detached_combinator_stops_following_inputs() {
    let a: StateStream<i32> = StateStream::new();
    let b: StateStream<i32> = StateStream::new();
    let climate = StateStream::merge_map([("a", &a), ("b", &b)]);

    a.update(1);
    assert!(climate.detach());
    b.update(2);

    assert_eq!(climate.value().map(|m| m.len()), Some(1));
    assert_eq!(a.listener_count(Channel::Data), 0);
    assert_eq!(b.listener_count(Channel::Data), 0);
}

#[test]
fn test_combinator_chains_with_operators() {
    let a: StateStream<i32> = StateStream::new();
    let b: StateStream<i32> = StateStream::new();
    let sum = StateStream::merge(&[&a, &b])
        .map(|change| change.to.value().map_or(0, |slots| slots.iter().flatten().sum::<i32>()))
        .changed();
    let recorder = Recorder::attach(&sum);

    a.update(1);
    b.update(2);
    b.update(2);
    a.update(0);
    b.update(3);

    let seen: Vec<i32> = recorder.data().iter().filter_map(|c| c.to.value().copied()).collect();
    assert_eq!(seen, vec![1, 3, 2, 3]);
}
