//! Server error types.

use thiserror::Error;

/// Failures starting or running the channel server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Socket bind or serve failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration file or value.
    #[error("invalid configuration: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let err: ServerError = std::io::Error::other("refused").into();
        assert!(err.to_string().contains("refused"));
    }

    #[test]
    fn config_error_displays_detail() {
        let err = ServerError::Config("port out of range".into());
        assert_eq!(err.to_string(), "invalid configuration: port out of range");
    }
}
