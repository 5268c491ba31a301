//! Error types for the caching core.

use docmirror_store::StoreError;
use thiserror::Error;

/// Result type for caching operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors surfaced by docmirror adapters.
///
/// Fetch-path failures are captured into the adapter's error state and never
/// returned to the caller; mutation-path failures are captured *and* returned,
/// since the caller issued an explicit action and needs a failure signal.
/// Background autosave failures are captured only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The remote store rejected or failed an operation.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A local mutation was requested but no snapshot is materialized.
    #[error("no snapshot to modify")]
    NoSnapshot,
}

impl CacheError {
    /// Returns true if the underlying failure can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            CacheError::Store(err) => err.is_retryable(),
            CacheError::NoSnapshot => false,
        }
    }
}
