//! The tri-state snapshot type.

use crate::error::StreamError;
use crate::types::{Channel, Timestamp};
use serde::{Deserialize, Serialize};

/// Payload of a state: exactly one variant is active.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum StateData<T> {
    /// A present value.
    Value(T),
    /// Value intentionally absent. Distinct from a stream that was never
    /// initialized.
    Empty,
    /// A fault description.
    Error(StreamError),
}

/// Immutable snapshot of a time-varying value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct State<T> {
    data: StateData<T>,
    at: Timestamp,
}

impl<T> State<T> {
    pub fn from_value(value: T) -> Self {
        Self::new(StateData::Value(value))
    }

    pub fn empty() -> Self {
        Self::new(StateData::Empty)
    }

    pub fn from_error(error: impl Into<StreamError>) -> Self {
        Self::new(StateData::Error(error.into()))
    }

    /// `None` becomes an empty state.
    pub fn from_option(value: Option<T>) -> Self {
        match value {
            Some(value) => Self::from_value(value),
            None => Self::empty(),
        }
    }

    pub fn new(data: StateData<T>) -> Self {
        Self {
            data,
            at: Timestamp::now(),
        }
    }

    /// Build a state with an explicit creation time.
    pub fn with_timestamp(data: StateData<T>, at: Timestamp) -> Self {
        Self { data, at }
    }

    pub fn data(&self) -> &StateData<T> {
        &self.data
    }

    /// The value, absent for both empty and error states.
    pub fn value(&self) -> Option<&T> {
        match &self.data {
            StateData::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&StreamError> {
        match &self.data {
            StateData::Error(error) => Some(error),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self.data {
            StateData::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_value(&self) -> bool {
        matches!(self.data, StateData::Value(_))
    }

    /// True only for the empty variant, never for an error.
    pub fn is_empty(&self) -> bool {
        matches!(self.data, StateData::Empty)
    }

    pub fn is_error(&self) -> bool {
        matches!(self.data, StateData::Error(_))
    }

    pub fn at(&self) -> Timestamp {
        self.at
    }

    /// The listener channel this state dispatches on.
    pub fn channel(&self) -> Channel {
        match self.data {
            StateData::Value(_) => Channel::Data,
            StateData::Empty => Channel::Empty,
            StateData::Error(_) => Channel::Error,
        }
    }

    /// Re-type a state that carries no value.
    ///
    /// Returns `None` for value states, which cannot change payload type
    /// without a transformation.
    pub fn retype<U>(&self) -> Option<State<U>> {
        let data = match &self.data {
            StateData::Value(_) => return None,
            StateData::Empty => StateData::Empty,
            StateData::Error(error) => StateData::Error(error.clone()),
        };
        Some(State::with_timestamp(data, self.at))
    }
}
