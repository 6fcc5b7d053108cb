//! Base engine behavior: classification, dispatch and previous-state tracking.

mod common;

use common::{s, values, Recorder};
use state_stream::{Channel, State, StateData, StateStream, StreamError, Timestamp};

#[test]
fn test_fresh_stream_is_uninitialized() {
    let stream: StateStream<String> = StateStream::new();
    assert!(!stream.is_initialized());
    assert_eq!(stream.value(), None);
}

#[test]
fn test_first_update_becomes_initialized() {
    let stream: StateStream<String> = StateStream::new();
    stream.update(s("data"));
    assert!(stream.is_initialized());
    assert_eq!(stream.value(), Some(s("data")));
}

#[test]
fn test_empty_update_fires_empty_channel() {
    let stream: StateStream<String> = StateStream::new();
    let recorder = Recorder::attach(&stream);

    stream.update_option(None);

    assert!(recorder.data().is_empty());
    assert!(recorder.errors().is_empty());
    let empty = recorder.empty();
    assert_eq!(empty.len(), 1);
    assert!(empty[0].from.is_none());
    assert_eq!(empty[0].to.value(), None);
    assert!(empty[0].to.is_empty());
    assert!(stream.is_initialized());
}

#[test]
fn test_error_update_fires_error_channel_only() {
    let stream: StateStream<String> = StateStream::new();
    let recorder = Recorder::attach(&stream);

    stream.update_error(StreamError::Disconnected(s("broker")));

    assert!(recorder.data().is_empty());
    assert!(recorder.empty().is_empty());
    let state = stream.state().unwrap();
    assert_eq!(state.error(), Some(&StreamError::Disconnected(s("broker"))));
    assert_eq!(state.value(), None);
    assert!(!state.is_empty());
}

#[test]
fn test_consecutive_errors_keep_previous() {
    let stream: StateStream<String> = StateStream::new();
    let recorder = Recorder::attach(&stream);

    stream.update(s("ok"));
    stream.update_error("first");
    stream.update_error("second");

    let errors = recorder.errors();
    assert_eq!(errors.len(), 2);
    assert_eq!(values(&errors[1]), (Some(Some(s("ok"))), None));
    assert_eq!(stream.previous().and_then(State::into_value), Some(s("ok")));
}

#[test]
fn test_leading_errors_keep_previous_unset() {
    let stream: StateStream<String> = StateStream::new();
    stream.update_error("first");
    stream.update_error("second");
    assert!(stream.previous().is_none());
}

#[test]
fn test_update_state_forwards_verbatim() {
    let stream: StateStream<String> = StateStream::new();
    let state = State::with_timestamp(StateData::Value(s("data")), Timestamp(1234));

    stream.update_state(state.clone());

    assert_eq!(stream.state(), Some(state));
}

#[test]
fn test_value_round_trip() {
    let stream: StateStream<Vec<u8>> = StateStream::new();
    stream.update(vec![0, 1, 2]);
    assert_eq!(stream.state().and_then(State::into_value), Some(vec![0, 1, 2]));
}

#[test]
fn test_second_update_reports_previous() {
    let stream: StateStream<String> = StateStream::new();
    let recorder = Recorder::attach(&stream);

    stream.update(s("a"));
    stream.update(s("b"));

    assert_eq!(values(&recorder.data()[1]), (Some(Some(s("a"))), Some(s("b"))));
}

#[test]
fn test_then_returns_self_for_chaining() {
    let stream: StateStream<i32> = StateStream::new();
    stream.then(|_| {}).then(|_| {}).on_empty(|_| {}).on_error(|_| {});

    assert_eq!(stream.listener_count(Channel::Data), 2);
    assert_eq!(stream.listener_count(Channel::Empty), 1);
    assert_eq!(stream.listener_count(Channel::Error), 1);
}

#[test]
fn test_chained_stream_preserves_tag() {
    let source: StateStream<i32> = StateStream::new();
    let sink: StateStream<i32> = StateStream::new();
    source.forward_to(&sink);
    let recorder = Recorder::attach(&sink);

    source.update(1);
    source.update_empty();
    source.update_error("x");

    assert_eq!(recorder.data().len(), 1);
    assert_eq!(recorder.empty().len(), 1);
    assert_eq!(recorder.errors().len(), 1);
}
