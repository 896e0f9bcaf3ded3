//! Process-local [`QuizStore`] used for local runs without MongoDB and by the test suites.

use std::{collections::HashMap, sync::Arc, time::SystemTime};

use futures::future::BoxFuture;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::dao::{
    models::{GameSessionEntity, NewGameSession, NewQuizResult, QuizResultEntity, ResultFilter},
    quiz_store::QuizStore,
    storage::{StorageError, StorageResult},
};

/// In-memory store keeping records in insertion order.
#[derive(Clone, Default)]
pub struct MemoryQuizStore {
    inner: Arc<RwLock<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    sessions: Vec<GameSessionEntity>,
    results: Vec<QuizResultEntity>,
    users: HashMap<String, String>,
}

impl MemoryQuizStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user so that leaderboard entries can resolve its email.
    pub async fn insert_user(&self, id: impl Into<String>, email: impl Into<String>) {
        let mut guard = self.inner.write().await;
        guard.users.insert(id.into(), email.into());
    }

    fn next_id() -> String {
        Uuid::new_v4().simple().to_string()
    }
}

impl QuizStore for MemoryQuizStore {
    fn insert_session(
        &self,
        session: NewGameSession,
    ) -> BoxFuture<'static, StorageResult<GameSessionEntity>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut guard = inner.write().await;
            // Check and insert under the same lock so the code constraint is atomic.
            if guard.sessions.iter().any(|s| s.code == session.code) {
                return Err(StorageError::DuplicateKey { key: "code" });
            }
            let entity = GameSessionEntity::from_new(Self::next_id(), session, SystemTime::now());
            guard.sessions.push(entity.clone());
            Ok(entity)
        })
    }

    fn find_session(
        &self,
        id: String,
    ) -> BoxFuture<'static, StorageResult<Option<GameSessionEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let guard = inner.read().await;
            Ok(guard.sessions.iter().find(|s| s.id == id).cloned())
        })
    }

    fn find_session_by_code(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<GameSessionEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let guard = inner.read().await;
            Ok(guard.sessions.iter().find(|s| s.code == code).cloned())
        })
    }

    fn list_sessions_by_host(
        &self,
        host: String,
    ) -> BoxFuture<'static, StorageResult<Vec<GameSessionEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let guard = inner.read().await;
            let mut sessions: Vec<_> = guard
                .sessions
                .iter()
                .rev()
                .filter(|s| s.host == host)
                .cloned()
                .collect();
            sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            Ok(sessions)
        })
    }

    fn replace_session(
        &self,
        mut session: GameSessionEntity,
    ) -> BoxFuture<'static, StorageResult<Option<GameSessionEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut guard = inner.write().await;
            let Some(slot) = guard.sessions.iter_mut().find(|s| s.id == session.id) else {
                return Ok(None);
            };
            session.updated_at = SystemTime::now();
            *slot = session.clone();
            Ok(Some(session))
        })
    }

    fn delete_session(&self, id: String) -> BoxFuture<'static, StorageResult<bool>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut guard = inner.write().await;
            let before = guard.sessions.len();
            guard.sessions.retain(|s| s.id != id);
            Ok(guard.sessions.len() != before)
        })
    }

    fn insert_result(
        &self,
        result: NewQuizResult,
    ) -> BoxFuture<'static, StorageResult<QuizResultEntity>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut guard = inner.write().await;
            let entity = QuizResultEntity::from_new(Self::next_id(), result, SystemTime::now());
            guard.results.push(entity.clone());
            Ok(entity)
        })
    }

    fn find_result(
        &self,
        id: String,
    ) -> BoxFuture<'static, StorageResult<Option<QuizResultEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let guard = inner.read().await;
            Ok(guard.results.iter().find(|r| r.id == id).cloned())
        })
    }

    fn list_results(
        &self,
        filter: ResultFilter,
    ) -> BoxFuture<'static, StorageResult<Vec<QuizResultEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let guard = inner.read().await;
            // Reverse insertion order first so equal timestamps still list newest first.
            let mut results: Vec<_> = guard
                .results
                .iter()
                .rev()
                .filter(|r| filter.matches(r))
                .cloned()
                .collect();
            results.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(results)
        })
    }

    fn replace_result(
        &self,
        mut result: QuizResultEntity,
    ) -> BoxFuture<'static, StorageResult<Option<QuizResultEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut guard = inner.write().await;
            let Some(slot) = guard.results.iter_mut().find(|r| r.id == result.id) else {
                return Ok(None);
            };
            result.updated_at = SystemTime::now();
            *slot = result.clone();
            Ok(Some(result))
        })
    }

    fn delete_result(&self, id: String) -> BoxFuture<'static, StorageResult<bool>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut guard = inner.write().await;
            let before = guard.results.len();
            guard.results.retain(|r| r.id != id);
            Ok(guard.results.len() != before)
        })
    }

    fn leaderboard(
        &self,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<QuizResultEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let guard = inner.read().await;
            let mut ranked: Vec<_> = guard
                .results
                .iter()
                .filter(|r| r.is_public_completed())
                .cloned()
                .collect();
            ranked.sort_by(QuizResultEntity::leaderboard_cmp);
            ranked.truncate(limit);
            Ok(ranked)
        })
    }

    fn user_emails(
        &self,
        ids: Vec<String>,
    ) -> BoxFuture<'static, StorageResult<HashMap<String, String>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let guard = inner.read().await;
            Ok(ids
                .into_iter()
                .filter_map(|id| guard.users.get(&id).map(|email| (id, email.clone())))
                .collect())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
