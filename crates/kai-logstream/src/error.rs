//! Error types for log streaming.

use thiserror::Error;

/// Errors that can occur while publishing or subscribing.
#[derive(Debug, Error)]
pub enum LogStreamError {
    /// The Redis server rejected a command or could not be reached.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Reading from the child's pipe failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The log stream was closed.
    #[error("log stream closed")]
    StreamClosed,
}

/// Result type alias for log stream operations.
pub type Result<T> = std::result::Result<T, LogStreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        assert_eq!(LogStreamError::StreamClosed.to_string(), "log stream closed");

        let err: LogStreamError =
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe gone").into();
        assert_eq!(err.to_string(), "I/O error: pipe gone");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LogStreamError>();
    }
}
