use std::time::Duration;

use mongodb::{Client, Database, bson::doc};
use tracing::{info, warn};

use super::{
    config::MongoConfig,
    error::{MongoDaoError, MongoResult},
};

const PING_ATTEMPTS: u32 = 6;
const FIRST_PING_RETRY: Duration = Duration::from_millis(200);
const MAX_PING_RETRY: Duration = Duration::from_secs(4);

/// Delays between ping attempts: doubling from [`FIRST_PING_RETRY`] up to [`MAX_PING_RETRY`].
fn ping_delays() -> impl Iterator<Item = Duration> {
    std::iter::successors(Some(FIRST_PING_RETRY), |delay| {
        Some((*delay * 2).min(MAX_PING_RETRY))
    })
}

/// Open a client for the configured database and wait until the server answers a ping.
///
/// The wider outage handling lives in the storage supervisor; this only absorbs a server that
/// is still starting up.
pub async fn open_database(config: &MongoConfig) -> MongoResult<(Client, Database)> {
    let client = Client::with_options(config.options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(&config.database_name);

    let mut delays = ping_delays();
    let mut attempt = 0;
    loop {
        attempt += 1;
        match database.run_command(doc! { "ping": 1 }).await {
            Ok(_) => {
                info!(database = %config.database_name, attempt, "MongoDB answered ping");
                return Ok((client, database));
            }
            Err(err) if attempt >= PING_ATTEMPTS => {
                return Err(MongoDaoError::InitialPing {
                    attempts: attempt,
                    source: err,
                });
            }
            Err(err) => {
                let delay = delays.next().unwrap_or(MAX_PING_RETRY);
                warn!(
                    database = %config.database_name,
                    attempt,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %err,
                    "MongoDB ping failed"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
