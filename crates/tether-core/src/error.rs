//! Channel-layer error taxonomy.

use thiserror::Error;

/// A failure decoding or interpreting a wire frame.
///
/// Protocol failures are answered with an `error` envelope to the offending
/// sender only; they never propagate to other connections.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame was not a valid `{type, data}` JSON object.
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A failure inside the application collaborator while processing a valid
/// envelope.
///
/// Caught at the dispatch boundary and converted to an `error` envelope
/// unicast to the sender; never closes the connection.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    /// Create a handler error with a caller-facing message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The caller-facing message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}
