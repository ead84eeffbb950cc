//! Service-level error types
//!
//! These cover startup and server failures (configuration, sockets, tracing).
//! Request failures are modelled by [`crate::api::ApiError`] and adapter
//! failures by [`crate::storage::StorageError`].

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for service startup and lifecycle
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "port taken");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.to_string(), "I/O error: port taken");
    }

    #[test]
    fn test_internal_display() {
        let err = Error::Internal("subscriber already set".to_string());
        assert_eq!(err.to_string(), "Internal error: subscriber already set");
    }
}
