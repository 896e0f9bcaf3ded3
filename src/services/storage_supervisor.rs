use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{quiz_store::QuizStore, storage::StorageError},
    state::SharedState,
};

const FIRST_RETRY: Duration = Duration::from_secs(1);
const RETRY_CEILING: Duration = Duration::from_secs(10);
const PING_EVERY: Duration = Duration::from_secs(5);
const RECONNECT_TRIES: u32 = 3;

/// Doubling retry delay capped at [`RETRY_CEILING`].
struct Backoff(Duration);

impl Backoff {
    fn new() -> Self {
        Self(FIRST_RETRY)
    }

    /// Sleep for the current delay, then double it.
    async fn wait(&mut self) {
        sleep(self.0).await;
        self.0 = (self.0 * 2).min(RETRY_CEILING);
    }
}

/// Keep a store installed in the shared state, flipping degraded mode while it is unreachable.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn QuizStore>, StorageError>> + Send,
{
    let mut backoff = Backoff::new();

    loop {
        match connect().await {
            Ok(store) => {
                state.set_quiz_store(store.clone()).await;
                info!("quiz store connected; serving sessions and results");
                backoff = Backoff::new();
                watch_store(&state, store.as_ref()).await;
            }
            Err(err) => {
                warn!(
                    error = %err,
                    retry_in_ms = backoff.0.as_millis() as u64,
                    "quiz store connection failed"
                );
                state.update_degraded(true);
            }
        }
        backoff.wait().await;
    }
}

/// Ping `store` until it fails and cannot be revived in place.
async fn watch_store(state: &SharedState, store: &dyn QuizStore) {
    loop {
        let healthy = store.health_check().await.is_ok() || reconnect(state, store).await;
        if !healthy {
            warn!(
                tries = RECONNECT_TRIES,
                "quiz store still unreachable; reconnecting from scratch"
            );
            return;
        }
        if state.is_degraded() {
            info!("quiz store reachable again; leaving degraded mode");
            state.update_degraded(false);
        }
        sleep(PING_EVERY).await;
    }
}

/// Revive the existing client; the first failure already puts the service in degraded mode.
async fn reconnect(state: &SharedState, store: &dyn QuizStore) -> bool {
    let mut backoff = Backoff::new();
    for attempt in 1..=RECONNECT_TRIES {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "quiz store reconnected after failed ping");
                return true;
            }
            Err(err) => {
                warn!(attempt, error = %err, "quiz store reconnect failed");
                state.update_degraded(true);
                backoff.wait().await;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::quiz_store::memory::MemoryQuizStore,
        state::{
            AppState,
            test_support::{ScriptedCompletion, test_config},
        },
    };

    #[tokio::test(start_paused = true)]
    async fn installs_store_once_connect_succeeds() {
        let state = AppState::new(&test_config(), ScriptedCompletion::failing());
        let mut watcher = state.degraded_watcher();
        let mut failures = 2;

        let supervisor = tokio::spawn(run(state.clone(), move || {
            let outcome: Result<Arc<dyn QuizStore>, StorageError> = if failures > 0 {
                failures -= 1;
                Err(StorageError::unavailable(
                    "offline".into(),
                    std::io::Error::other("offline"),
                ))
            } else {
                Ok(Arc::new(MemoryQuizStore::new()))
            };
            async move { outcome }
        }));

        while *watcher.borrow_and_update() {
            watcher.changed().await.unwrap();
        }
        assert!(!state.is_degraded());
        assert!(state.quiz_store().await.is_some());
        supervisor.abort();
    }
}
