use std::error::Error;
use thiserror::Error;

/// Result alias for storage and lookup operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends and directory clients regardless of the
/// underlying transport. Absent documents are `Option::None`, never errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or refused the operation.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Human-readable summary of what failed.
        message: String,
        /// Backend-specific cause.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}
