//! Error types for state streams.

use crate::types::Channel;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Fault carried by the `Error` variant of a state.
///
/// Errors are data: they travel through the error channel like any other
/// transition and never unwind the producer's call stack.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum StreamError {
    #[error("Source failure: {0}")]
    Source(String),

    #[error("Disconnected: {0}")]
    Disconnected(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Listener on {channel} channel panicked: {message}")]
    ListenerPanicked { channel: Channel, message: String },
}

impl From<serde_json::Error> for StreamError {
    fn from(e: serde_json::Error) -> Self {
        StreamError::Decode(e.to_string())
    }
}

impl From<&str> for StreamError {
    fn from(message: &str) -> Self {
        StreamError::Source(message.to_string())
    }
}

impl From<String> for StreamError {
    fn from(message: String) -> Self {
        StreamError::Source(message)
    }
}

/// Result type for fallible stream operations.
pub type Result<T> = std::result::Result<T, StreamError>;
