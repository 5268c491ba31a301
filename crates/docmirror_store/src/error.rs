//! Error types for remote-store operations.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by a remote document store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The requested record does not exist.
    #[error("record not found: {collection}/{id}")]
    NotFound {
        /// Collection name.
        collection: String,
        /// Record identifier.
        id: String,
    },

    /// Network or transport failure.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Authentication is missing or invalid.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The server rejected the request as invalid.
    #[error("invalid request: {0}")]
    Invalid(String),

    /// The live channel could not be established or torn down.
    #[error("subscription error: {0}")]
    Subscription(String),
}

impl StoreError {
    /// Creates a not-found error.
    pub fn not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Transport { retryable, .. } => *retryable,
            StoreError::Subscription(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(StoreError::transport_retryable("connection lost").is_retryable());
        assert!(!StoreError::transport_fatal("bad certificate").is_retryable());
        assert!(StoreError::Subscription("channel dropped".into()).is_retryable());
        assert!(!StoreError::not_found("posts", "r1").is_retryable());
    }

    #[test]
    fn error_display() {
        let err = StoreError::not_found("posts", "r1");
        assert_eq!(err.to_string(), "record not found: posts/r1");
    }
}
