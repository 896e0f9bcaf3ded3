/// In-memory backend.
pub mod memory;
#[cfg(feature = "mongo-store")]
/// MongoDB backend.
pub mod mongodb;

use std::collections::HashMap;

use crate::dao::models::{
    GameSessionEntity, NewGameSession, NewQuizResult, QuizResultEntity, ResultFilter,
};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;

/// Abstraction over the persistence layer for game sessions, quiz results and user lookups.
///
/// Identifiers are opaque strings; a malformed identifier behaves like an unknown one
/// (`Ok(None)` / `Ok(false)`) instead of surfacing a backend format error.
pub trait QuizStore: Send + Sync {
    /// Insert a session; fails with [`StorageError::DuplicateKey`] when the code is taken.
    ///
    /// [`StorageError::DuplicateKey`]: crate::dao::storage::StorageError::DuplicateKey
    fn insert_session(
        &self,
        session: NewGameSession,
    ) -> BoxFuture<'static, StorageResult<GameSessionEntity>>;
    /// Session by id, `None` when unknown or malformed.
    fn find_session(&self, id: String)
    -> BoxFuture<'static, StorageResult<Option<GameSessionEntity>>>;
    /// Session by its exact (uppercase) code.
    fn find_session_by_code(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<GameSessionEntity>>>;
    /// Sessions hosted by `host`, most recently updated first.
    fn list_sessions_by_host(
        &self,
        host: String,
    ) -> BoxFuture<'static, StorageResult<Vec<GameSessionEntity>>>;
    /// Overwrite a session (last write wins) and bump its `updated_at`.
    fn replace_session(
        &self,
        session: GameSessionEntity,
    ) -> BoxFuture<'static, StorageResult<Option<GameSessionEntity>>>;
    /// Remove a session; `false` when nothing matched.
    fn delete_session(&self, id: String) -> BoxFuture<'static, StorageResult<bool>>;

    /// Insert a result and assign its id and timestamps.
    fn insert_result(
        &self,
        result: NewQuizResult,
    ) -> BoxFuture<'static, StorageResult<QuizResultEntity>>;
    /// Result by id, `None` when unknown or malformed.
    fn find_result(&self, id: String) -> BoxFuture<'static, StorageResult<Option<QuizResultEntity>>>;
    /// Results matching `filter`, newest first.
    fn list_results(
        &self,
        filter: ResultFilter,
    ) -> BoxFuture<'static, StorageResult<Vec<QuizResultEntity>>>;
    /// Overwrite a result (last write wins) and bump its `updated_at`.
    fn replace_result(
        &self,
        result: QuizResultEntity,
    ) -> BoxFuture<'static, StorageResult<Option<QuizResultEntity>>>;
    /// Remove a result; `false` when nothing matched.
    fn delete_result(&self, id: String) -> BoxFuture<'static, StorageResult<bool>>;
    /// Public completed results in leaderboard order, at most `limit` of them.
    fn leaderboard(&self, limit: usize) -> BoxFuture<'static, StorageResult<Vec<QuizResultEntity>>>;

    /// Resolve user ids to their email address; unknown ids are absent from the map.
    fn user_emails(
        &self,
        ids: Vec<String>,
    ) -> BoxFuture<'static, StorageResult<HashMap<String, String>>>;

    /// Cheap round trip proving the backend answers.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Rebuild the connection in place after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
