mod connection;
mod error;
mod models;
/// Connection settings.
pub mod config;
/// [`QuizStore`](crate::dao::quiz_store::QuizStore) implementation.
pub mod store;

pub use config::MongoConfig;
pub use error::MongoDaoError;
pub use store::MongoQuizStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}
