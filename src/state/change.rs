//! Transitions between consecutive states.

use super::State;

/// One transition observed by a listener.
///
/// `from` is `None` on the first transition a stream ever dispatches.
#[derive(Clone, Debug, PartialEq)]
pub struct StateChange<T> {
    pub from: Option<State<T>>,
    pub to: State<T>,
}

impl<T> StateChange<T> {
    pub fn new(from: Option<State<T>>, to: State<T>) -> Self {
        Self { from, to }
    }

    pub fn is_initial_change(&self) -> bool {
        self.from.is_none()
    }

    /// The target carries no value (empty or error).
    pub fn is_terminal_change(&self) -> bool {
        !self.to.is_value()
    }

    /// Value of the target state, if any.
    pub fn value(&self) -> Option<&T> {
        self.to.value()
    }

    /// Compare the two values with a custom equality.
    ///
    /// An absent value on either side equals only another absent value.
    pub fn is_changed_by<F>(&self, eq: F) -> bool
    where
        F: Fn(&T, &T) -> bool,
    {
        let from = self.from.as_ref().and_then(State::value);
        match (from, self.to.value()) {
            (Some(a), Some(b)) => !eq(a, b),
            (None, None) => false,
            _ => true,
        }
    }
}

impl<T: PartialEq> StateChange<T> {
    /// Value equality between `from` and `to`.
    pub fn is_changed(&self) -> bool {
        self.is_changed_by(|a, b| a == b)
    }
}
