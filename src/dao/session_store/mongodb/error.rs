use thiserror::Error;
use uuid::Uuid;

use crate::dao::storage::StorageError;

/// Result alias for the MongoDB backend.
pub type MongoResult<T> = Result<T, MongoDaoError>;

/// Failures specific to the MongoDB session store.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// The connection URI could not be parsed.
    #[error("invalid MongoDB URI `{uri}`")]
    InvalidUri {
        /// Offending URI.
        uri: String,
        /// Driver error.
        source: mongodb::error::Error,
    },
    /// The client could not be constructed from its options.
    #[error("failed to build MongoDB client")]
    ClientConstruction {
        /// Driver error.
        source: mongodb::error::Error,
    },
    /// The server never answered the initial ping.
    #[error("MongoDB did not answer pings after {attempts} attempts")]
    InitialPing {
        /// Number of pings sent before giving up.
        attempts: u32,
        /// Last driver error.
        source: mongodb::error::Error,
    },
    /// Index creation failed at connect time.
    #[error("failed to ensure index `{index}` on `{collection}`")]
    EnsureIndex {
        /// Target collection.
        collection: &'static str,
        /// Index being created.
        index: &'static str,
        /// Driver error.
        source: mongodb::error::Error,
    },
    /// A health-check ping failed.
    #[error("MongoDB health ping failed")]
    HealthPing {
        /// Driver error.
        source: mongodb::error::Error,
    },
    /// Writing a session document failed.
    #[error("failed to save session `{id}`")]
    SaveSession {
        /// Session being written.
        id: Uuid,
        /// Driver error.
        source: mongodb::error::Error,
    },
    /// Reading a session document failed.
    #[error("failed to load session `{id}`")]
    LoadSession {
        /// Session being read.
        id: Uuid,
        /// Driver error.
        source: mongodb::error::Error,
    },
    /// The live-code lookup query failed.
    #[error("failed to look up game code `{code}`")]
    CodeLookup {
        /// Code being resolved.
        code: String,
        /// Driver error.
        source: mongodb::error::Error,
    },
}

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        let message = err.to_string();
        StorageError::unavailable(message, err)
    }
}
