use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use thiserror::Error;

/// Result alias for MongoDB operations.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Server error code reported for unique index violations.
const DUPLICATE_KEY_CODE: i32 = 11000;

/// Failures of the MongoDB backend, one variant per operation.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// The connection string could not be parsed.
    #[error("failed to parse MongoDB connection URI")]
    InvalidUri {
        #[source]
        source: MongoError,
    },
    /// The driver rejected the client options.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    /// The server never answered the start-up ping.
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    /// A periodic ping failed.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    /// An index could not be created.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    /// An insert failed.
    #[error("failed to insert into `{collection}`")]
    Insert {
        collection: &'static str,
        #[source]
        source: MongoError,
    },
    /// A lookup by id failed.
    #[error("failed to load `{id}` from `{collection}`")]
    Load {
        collection: &'static str,
        id: String,
        #[source]
        source: MongoError,
    },
    /// A query failed.
    #[error("failed to query `{collection}`")]
    Query {
        collection: &'static str,
        #[source]
        source: MongoError,
    },
    /// A replace failed.
    #[error("failed to save `{id}` in `{collection}`")]
    Save {
        collection: &'static str,
        id: String,
        #[source]
        source: MongoError,
    },
    /// A delete failed.
    #[error("failed to delete `{id}` from `{collection}`")]
    Delete {
        collection: &'static str,
        id: String,
        #[source]
        source: MongoError,
    },
}

/// Whether the driver error is a unique index violation.
pub fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY_CODE
    )
}
