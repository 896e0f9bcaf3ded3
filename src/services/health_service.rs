use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Ping the store and report whether the backend is serving normally.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_quiz_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
                return HealthResponse::degraded();
            }
        }
        Err(_) => {
            warn!("storage unavailable (degraded mode)");
            return HealthResponse::degraded();
        }
    }

    HealthResponse::ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{
        AppState,
        test_support::{ScriptedCompletion, memory_state, test_config},
    };

    #[tokio::test]
    async fn reports_ok_with_a_healthy_store() {
        let (state, _store) = memory_state(ScriptedCompletion::failing()).await;
        assert_eq!(health_status(&state).await.status, "ok");
    }

    #[tokio::test]
    async fn reports_degraded_without_a_store() {
        let state = AppState::new(&test_config(), ScriptedCompletion::failing());
        assert_eq!(health_status(&state).await.status, "degraded");
    }
}
