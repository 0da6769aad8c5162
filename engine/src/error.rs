//! Error types for the Tether engine.

use thiserror::Error;

/// All possible errors from the Tether engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Validation errors
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("type mismatch for field '{field}': expected {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: String,
        got: String,
    },

    // Queue errors
    #[error("invalid queue: {0}")]
    InvalidQueue(String),

    #[error("guest writes are local-only and cannot be queued")]
    GuestNotQueueable,

    #[error("invalid schema: {0}")]
    InvalidSchema(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::InvalidDocument("expected an object".into());
        assert_eq!(err.to_string(), "invalid document: expected an object");

        let err = Error::TypeMismatch {
            field: "favorites".into(),
            expected: "Array".into(),
            got: "String".into(),
        };
        assert_eq!(
            err.to_string(),
            "type mismatch for field 'favorites': expected Array, got String"
        );

        assert_eq!(
            Error::GuestNotQueueable.to_string(),
            "guest writes are local-only and cannot be queued"
        );
    }
}
