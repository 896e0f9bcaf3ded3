use tracing::{info, warn};

use crate::{
    dao::{
        models::{GameSessionEntity, NewGameSession, SessionStatus},
        quiz_store::QuizStore,
    },
    dto::{
        parse_timestamp,
        session::{CreateSessionRequest, SessionResponse, UpdateSessionRequest},
    },
    error::ServiceError,
    services::{auth_service::AuthUser, session_code},
    state::SharedState,
};

/// Attempts at the allocate-then-insert sequence before giving up on a code race.
const CREATE_ATTEMPTS: usize = 3;

const NOT_FOUND: &str = "Session not found.";

/// Create a session hosted by `caller` with a fresh unique code.
pub async fn create_session(
    state: &SharedState,
    caller: &AuthUser,
    request: CreateSessionRequest,
) -> Result<SessionResponse, ServiceError> {
    let store = state.require_quiz_store().await?;

    let template = NewGameSession {
        host: caller.id.clone(),
        code: String::new(),
        mode: request.mode.unwrap_or_default(),
        status: SessionStatus::default(),
        quiz_settings: request.quiz_settings.map(Into::into),
        participants: request
            .participants
            .unwrap_or_default()
            .into_iter()
            .map(Into::into)
            .collect(),
    };

    let mut attempt = 0;
    loop {
        attempt += 1;
        let code = session_code::allocate(store.as_ref())
            .await
            .map_err(ServiceError::storage("Failed to create session."))?;

        let mut session = template.clone();
        session.code = code;
        match store.insert_session(session).await {
            Ok(created) => {
                info!(id = %created.id, code = %created.code, host = %created.host, "session created");
                return Ok(created.into());
            }
            Err(err) if err.is_duplicate_key() && attempt < CREATE_ATTEMPTS => {
                warn!(attempt, "session code taken between check and insert; retrying");
            }
            Err(err) => return Err(ServiceError::storage("Failed to create session.")(err)),
        }
    }
}

/// Sessions hosted by the caller, most recently updated first.
pub async fn list_my_sessions(
    state: &SharedState,
    caller: &AuthUser,
) -> Result<Vec<SessionResponse>, ServiceError> {
    let store = state.require_quiz_store().await?;
    let sessions = store
        .list_sessions_by_host(caller.id.clone())
        .await
        .map_err(ServiceError::storage("Failed to fetch sessions."))?;
    Ok(sessions.into_iter().map(Into::into).collect())
}

/// Case-insensitive lookup by shareable code.
pub async fn get_session_by_code(
    state: &SharedState,
    code: &str,
) -> Result<SessionResponse, ServiceError> {
    let store = state.require_quiz_store().await?;
    store
        .find_session_by_code(code.trim().to_uppercase())
        .await
        .map_err(ServiceError::storage("Failed to fetch session."))?
        .map(Into::into)
        .ok_or_else(|| ServiceError::NotFound(NOT_FOUND.into()))
}

/// Apply the allow-listed fields of `request`; host only.
pub async fn update_session(
    state: &SharedState,
    caller: &AuthUser,
    id: String,
    request: UpdateSessionRequest,
) -> Result<SessionResponse, ServiceError> {
    let store = state.require_quiz_store().await?;
    let mut session = load_hosted_session(
        store.as_ref(),
        caller,
        id,
        "Only the host can update this session.",
        "Failed to update session.",
    )
    .await?;

    if request.is_empty() {
        return Err(ServiceError::InvalidInput(
            "No valid fields provided for update.".into(),
        ));
    }
    apply_update(&mut session, request)?;

    store
        .replace_session(session)
        .await
        .map_err(ServiceError::storage("Failed to update session."))?
        .map(Into::into)
        .ok_or_else(|| ServiceError::NotFound(NOT_FOUND.into()))
}

/// Delete a session; host only.
pub async fn delete_session(
    state: &SharedState,
    caller: &AuthUser,
    id: String,
) -> Result<(), ServiceError> {
    let store = state.require_quiz_store().await?;
    let session = load_hosted_session(
        store.as_ref(),
        caller,
        id,
        "Only the host can delete this session.",
        "Failed to delete session.",
    )
    .await?;

    let deleted = store
        .delete_session(session.id.clone())
        .await
        .map_err(ServiceError::storage("Failed to delete session."))?;
    if !deleted {
        return Err(ServiceError::NotFound(NOT_FOUND.into()));
    }
    info!(id = %session.id, "session deleted");
    Ok(())
}

async fn load_hosted_session(
    store: &dyn QuizStore,
    caller: &AuthUser,
    id: String,
    forbidden: &str,
    context: &'static str,
) -> Result<GameSessionEntity, ServiceError> {
    let session = store
        .find_session(id)
        .await
        .map_err(ServiceError::storage(context))?
        .ok_or_else(|| ServiceError::NotFound(NOT_FOUND.into()))?;

    if session.host != caller.id {
        return Err(ServiceError::Forbidden(forbidden.into()));
    }
    Ok(session)
}

fn apply_update(
    session: &mut GameSessionEntity,
    request: UpdateSessionRequest,
) -> Result<(), ServiceError> {
    let started_at = request.started_at.map(parse_optional_timestamp).transpose()?;
    let ended_at = request.ended_at.map(parse_optional_timestamp).transpose()?;

    if let Some(mode) = request.mode {
        session.mode = mode;
    }
    if let Some(status) = request.status {
        session.status = status;
    }
    if let Some(settings) = request.quiz_settings {
        session.quiz_settings = Some(settings.into());
    }
    if let Some(participants) = request.participants {
        session.participants = participants.into_iter().map(Into::into).collect();
    }
    if let Some(started_at) = started_at {
        session.started_at = started_at;
    }
    if let Some(ended_at) = ended_at {
        session.ended_at = ended_at;
    }
    Ok(())
}

fn parse_optional_timestamp(
    value: Option<String>,
) -> Result<Option<std::time::SystemTime>, ServiceError> {
    match value {
        None => Ok(None),
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| ServiceError::InvalidInput(format!("Invalid timestamp `{raw}`."))),
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use futures::future::BoxFuture;

    use super::*;
    use crate::{
        dao::{
            models::{NewQuizResult, QuizResultEntity, ResultFilter, SessionMode},
            quiz_store::memory::MemoryQuizStore,
            storage::{StorageError, StorageResult},
        },
        dto::session::{ParticipantDto, QuizSettingsDto},
        state::{
            AppState,
            test_support::{ScriptedCompletion, memory_state, test_config},
        },
    };

    fn user(id: &str) -> AuthUser {
        AuthUser {
            id: id.into(),
            email: None,
        }
    }

    #[tokio::test]
    async fn create_applies_defaults_and_unique_codes() {
        let (state, _store) = memory_state(ScriptedCompletion::failing()).await;
        let host = user("host");

        let first = create_session(&state, &host, CreateSessionRequest::default())
            .await
            .unwrap();
        let second = create_session(
            &state,
            &host,
            CreateSessionRequest {
                mode: Some(SessionMode::Versus),
                quiz_settings: Some(QuizSettingsDto {
                    topics: vec!["rust".into()],
                    difficulty: Some("Hard".into()),
                    number_of_questions: Some(5),
                }),
                participants: Some(vec![ParticipantDto {
                    nickname: Some("ana".into()),
                    is_host: true,
                    ..ParticipantDto::default()
                }]),
            },
        )
        .await
        .unwrap();

        assert_eq!(first.host, "host");
        assert_eq!(first.mode, SessionMode::Solo);
        assert_eq!(first.status, SessionStatus::Lobby);
        assert!(first.participants.is_empty());
        assert!(first.quiz_settings.is_none());
        assert_ne!(first.code, second.code);
        assert_eq!(second.participants[0].score, 0);
    }

    #[tokio::test]
    async fn lookup_by_code_is_case_insensitive() {
        let (state, _store) = memory_state(ScriptedCompletion::failing()).await;
        let created = create_session(&state, &user("h"), CreateSessionRequest::default())
            .await
            .unwrap();

        let found = get_session_by_code(&state, &created.code.to_lowercase())
            .await
            .unwrap();
        assert_eq!(found.id, created.id);

        let again = get_session_by_code(&state, &created.code).await.unwrap();
        assert_eq!(again.updated_at, found.updated_at);

        assert!(matches!(
            get_session_by_code(&state, "ZZZZZZZ").await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn only_host_may_update_or_delete() {
        let (state, _store) = memory_state(ScriptedCompletion::failing()).await;
        let host = user("host");
        let intruder = user("intruder");
        let created = create_session(&state, &host, CreateSessionRequest::default())
            .await
            .unwrap();

        let update = || UpdateSessionRequest {
            status: Some(SessionStatus::InProgress),
            ..UpdateSessionRequest::default()
        };

        let err = update_session(&state, &intruder, created.id.clone(), update())
            .await
            .unwrap_err();
        assert!(
            matches!(err, ServiceError::Forbidden(ref m) if m == "Only the host can update this session.")
        );
        let err = delete_session(&state, &intruder, created.id.clone())
            .await
            .unwrap_err();
        assert!(
            matches!(err, ServiceError::Forbidden(ref m) if m == "Only the host can delete this session.")
        );

        let updated = update_session(&state, &host, created.id.clone(), update())
            .await
            .unwrap();
        assert_eq!(updated.status, SessionStatus::InProgress);
        assert_eq!(updated.code, created.code);

        delete_session(&state, &host, created.id.clone()).await.unwrap();
        assert!(matches!(
            delete_session(&state, &host, created.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn update_checks_run_in_order() {
        let (state, _store) = memory_state(ScriptedCompletion::failing()).await;
        let host = user("host");

        assert!(matches!(
            update_session(&state, &host, "not-an-id".into(), UpdateSessionRequest::default())
                .await,
            Err(ServiceError::NotFound(_))
        ));

        let created = create_session(&state, &host, CreateSessionRequest::default())
            .await
            .unwrap();
        assert!(matches!(
            update_session(&state, &user("x"), created.id.clone(), UpdateSessionRequest::default())
                .await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            update_session(&state, &host, created.id.clone(), UpdateSessionRequest::default())
                .await,
            Err(ServiceError::InvalidInput(ref m)) if m == "No valid fields provided for update."
        ));
    }

    #[tokio::test]
    async fn timestamps_can_be_set_and_cleared() {
        let (state, _store) = memory_state(ScriptedCompletion::failing()).await;
        let host = user("host");
        let created = create_session(&state, &host, CreateSessionRequest::default())
            .await
            .unwrap();

        let started = update_session(
            &state,
            &host,
            created.id.clone(),
            UpdateSessionRequest {
                started_at: Some(Some("2024-05-01T10:00:00Z".into())),
                ..UpdateSessionRequest::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(started.started_at.as_deref(), Some("2024-05-01T10:00:00Z"));

        let cleared = update_session(
            &state,
            &host,
            created.id.clone(),
            UpdateSessionRequest {
                started_at: Some(None),
                ..UpdateSessionRequest::default()
            },
        )
        .await
        .unwrap();
        assert!(cleared.started_at.is_none());

        assert!(matches!(
            update_session(
                &state,
                &host,
                created.id,
                UpdateSessionRequest {
                    ended_at: Some(Some("soon".into())),
                    ..UpdateSessionRequest::default()
                },
            )
            .await,
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn listing_returns_only_hosted_sessions() {
        let (state, _store) = memory_state(ScriptedCompletion::failing()).await;
        let a = user("a");
        let b = user("b");
        let older = create_session(&state, &a, CreateSessionRequest::default())
            .await
            .unwrap();
        create_session(&state, &b, CreateSessionRequest::default())
            .await
            .unwrap();
        let newer = create_session(&state, &a, CreateSessionRequest::default())
            .await
            .unwrap();

        let mine = list_my_sessions(&state, &a).await.unwrap();
        let ids: Vec<_> = mine.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec![newer.id.as_str(), older.id.as_str()]);
    }

    /// Store whose first `failures` session inserts hit a unique-key race.
    struct RacingStore {
        inner: MemoryQuizStore,
        failures: AtomicUsize,
    }

    impl QuizStore for RacingStore {
        fn insert_session(
            &self,
            session: NewGameSession,
        ) -> BoxFuture<'static, StorageResult<GameSessionEntity>> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Box::pin(async { Err(StorageError::DuplicateKey { key: "code" }) });
            }
            self.inner.insert_session(session)
        }
        fn find_session(
            &self,
            id: String,
        ) -> BoxFuture<'static, StorageResult<Option<GameSessionEntity>>> {
            self.inner.find_session(id)
        }
        fn find_session_by_code(
            &self,
            code: String,
        ) -> BoxFuture<'static, StorageResult<Option<GameSessionEntity>>> {
            self.inner.find_session_by_code(code)
        }
        fn list_sessions_by_host(
            &self,
            host: String,
        ) -> BoxFuture<'static, StorageResult<Vec<GameSessionEntity>>> {
            self.inner.list_sessions_by_host(host)
        }
        fn replace_session(
            &self,
            session: GameSessionEntity,
        ) -> BoxFuture<'static, StorageResult<Option<GameSessionEntity>>> {
            self.inner.replace_session(session)
        }
        fn delete_session(&self, id: String) -> BoxFuture<'static, StorageResult<bool>> {
            self.inner.delete_session(id)
        }
        fn insert_result(
            &self,
            result: NewQuizResult,
        ) -> BoxFuture<'static, StorageResult<QuizResultEntity>> {
            self.inner.insert_result(result)
        }
        fn find_result(
            &self,
            id: String,
        ) -> BoxFuture<'static, StorageResult<Option<QuizResultEntity>>> {
            self.inner.find_result(id)
        }
        fn list_results(
            &self,
            filter: ResultFilter,
        ) -> BoxFuture<'static, StorageResult<Vec<QuizResultEntity>>> {
            self.inner.list_results(filter)
        }
        fn replace_result(
            &self,
            result: QuizResultEntity,
        ) -> BoxFuture<'static, StorageResult<Option<QuizResultEntity>>> {
            self.inner.replace_result(result)
        }
        fn delete_result(&self, id: String) -> BoxFuture<'static, StorageResult<bool>> {
            self.inner.delete_result(id)
        }
        fn leaderboard(
            &self,
            limit: usize,
        ) -> BoxFuture<'static, StorageResult<Vec<QuizResultEntity>>> {
            self.inner.leaderboard(limit)
        }
        fn user_emails(
            &self,
            ids: Vec<String>,
        ) -> BoxFuture<'static, StorageResult<HashMap<String, String>>> {
            self.inner.user_emails(ids)
        }
        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.health_check()
        }
        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.try_reconnect()
        }
    }

    async fn racing_state(failures: usize) -> SharedState {
        let state = AppState::new(&test_config(), ScriptedCompletion::failing());
        state
            .set_quiz_store(Arc::new(RacingStore {
                inner: MemoryQuizStore::new(),
                failures: AtomicUsize::new(failures),
            }))
            .await;
        state
    }

    #[tokio::test]
    async fn create_retries_after_a_code_race() {
        let state = racing_state(2).await;
        let created = create_session(&state, &user("h"), CreateSessionRequest::default())
            .await
            .unwrap();
        assert_eq!(created.code.len(), 6);
    }

    #[tokio::test]
    async fn create_gives_up_after_repeated_races() {
        let state = racing_state(CREATE_ATTEMPTS).await;
        let err = create_session(&state, &user("h"), CreateSessionRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Storage {
                context: "Failed to create session.",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn degraded_store_fails_fast() {
        let (state, _store) = memory_state(ScriptedCompletion::failing()).await;
        state.update_degraded(true);
        assert!(matches!(
            list_my_sessions(&state, &user("a")).await,
            Err(ServiceError::Degraded)
        ));
    }
}
