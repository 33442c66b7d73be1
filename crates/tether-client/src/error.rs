//! Client error types.

use thiserror::Error;

/// Failures in the channel client.
///
/// WebSocket transport failures never surface here; the driver absorbs
/// them and reconnects, so the application only sees status changes.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP fallback request failure.
    #[error("fallback request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The fallback endpoint reported a handler failure.
    #[error("action rejected: {0}")]
    Rejected(String),

    /// Escalation requested but no fallback endpoint is configured.
    #[error("no fallback endpoint configured")]
    NoFallback,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_displays_message() {
        let err = ClientError::Rejected("unknown action".into());
        assert_eq!(err.to_string(), "action rejected: unknown action");
    }
}
