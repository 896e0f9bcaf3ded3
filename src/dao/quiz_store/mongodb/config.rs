use mongodb::options::ClientOptions;

use super::error::{MongoDaoError, MongoResult};

const DEFAULT_DATABASE: &str = "questnest";

/// Where and how to reach MongoDB.
#[derive(Clone)]
pub struct MongoConfig {
    /// Parsed driver options.
    pub options: ClientOptions,
    /// Database holding the quiz collections.
    pub database_name: String,
}

impl MongoConfig {
    /// Parse `uri`, falling back to the default database name.
    pub async fn from_uri(uri: &str, db_name: Option<&str>) -> MongoResult<Self> {
        let database_name = db_name.unwrap_or(DEFAULT_DATABASE).to_owned();
        // The URI embeds credentials, so it is kept out of the error.
        let options = ClientOptions::parse(uri)
            .await
            .map_err(|source| MongoDaoError::InvalidUri { source })?;

        Ok(Self {
            options,
            database_name,
        })
    }
}
