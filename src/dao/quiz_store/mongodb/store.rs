use std::{collections::HashMap, sync::Arc};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{DateTime, Document, doc, oid::ObjectId},
    options::IndexOptions,
};
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    connection::open_database,
    error::{MongoDaoError, MongoResult, is_duplicate_key},
    models::{
        MongoResultDocument, MongoSessionDocument, MongoUserEmail, doc_id, parse_object_id, user_ref,
    },
};
use crate::dao::{
    models::{GameSessionEntity, NewGameSession, NewQuizResult, QuizResultEntity, ResultFilter},
    quiz_store::QuizStore,
    storage::{StorageError, StorageResult},
};

const SESSION_COLLECTION_NAME: &str = "gamesessions";
const RESULT_COLLECTION_NAME: &str = "quizresults";
const USER_COLLECTION_NAME: &str = "users";

/// [`QuizStore`] backed by MongoDB; clones share one client.
#[derive(Clone)]
pub struct MongoQuizStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            open_database(&self.config).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoQuizStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            open_database(&config).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        let sessions = database.collection::<Document>(SESSION_COLLECTION_NAME);
        create_index(&sessions, SESSION_COLLECTION_NAME, "code", doc! {"code": 1}, true).await?;
        create_index(
            &sessions,
            SESSION_COLLECTION_NAME,
            "host,updatedAt",
            doc! {"host": 1, "updatedAt": -1},
            false,
        )
        .await?;

        let results = database.collection::<Document>(RESULT_COLLECTION_NAME);
        create_index(
            &results,
            RESULT_COLLECTION_NAME,
            "user,createdAt",
            doc! {"user": 1, "createdAt": -1},
            false,
        )
        .await?;
        create_index(
            &results,
            RESULT_COLLECTION_NAME,
            "leaderboard",
            doc! {
                "visibility": 1,
                "status": 1,
                "accuracy": -1,
                "correctCount": -1,
                "totalTimeSeconds": 1,
                "createdAt": 1,
            },
            false,
        )
        .await?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn session_collection(&self) -> Collection<MongoSessionDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoSessionDocument>(SESSION_COLLECTION_NAME)
    }

    async fn result_collection(&self) -> Collection<MongoResultDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoResultDocument>(RESULT_COLLECTION_NAME)
    }

    async fn user_collection(&self) -> Collection<MongoUserEmail> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoUserEmail>(USER_COLLECTION_NAME)
    }

    async fn insert_session(&self, session: NewGameSession) -> StorageResult<GameSessionEntity> {
        let document = MongoSessionDocument::from_new(ObjectId::new(), session, DateTime::now());
        let collection = self.session_collection().await;

        match collection.insert_one(&document).await {
            Ok(_) => Ok(document.into()),
            Err(source) if is_duplicate_key(&source) => {
                Err(StorageError::DuplicateKey { key: "code" })
            }
            Err(source) => Err(MongoDaoError::Insert {
                collection: SESSION_COLLECTION_NAME,
                source,
            }
            .into()),
        }
    }

    async fn find_session(&self, id: String) -> MongoResult<Option<GameSessionEntity>> {
        let Some(oid) = parse_object_id(&id) else {
            return Ok(None);
        };
        let collection = self.session_collection().await;

        let document = collection
            .find_one(doc_id(oid))
            .await
            .map_err(|source| MongoDaoError::Load {
                collection: SESSION_COLLECTION_NAME,
                id,
                source,
            })?;

        Ok(document.map(Into::into))
    }

    async fn find_session_by_code(&self, code: String) -> MongoResult<Option<GameSessionEntity>> {
        let collection = self.session_collection().await;

        let document = collection
            .find_one(doc! {"code": &code})
            .await
            .map_err(|source| MongoDaoError::Load {
                collection: SESSION_COLLECTION_NAME,
                id: code,
                source,
            })?;

        Ok(document.map(Into::into))
    }

    async fn list_sessions_by_host(&self, host: String) -> MongoResult<Vec<GameSessionEntity>> {
        let collection = self.session_collection().await;
        let query_err = |source| MongoDaoError::Query {
            collection: SESSION_COLLECTION_NAME,
            source,
        };

        let documents: Vec<MongoSessionDocument> = collection
            .find(doc! {"host": user_ref(&host)})
            .sort(doc! {"updatedAt": -1})
            .await
            .map_err(query_err)?
            .try_collect()
            .await
            .map_err(query_err)?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn replace_session(
        &self,
        mut session: GameSessionEntity,
    ) -> MongoResult<Option<GameSessionEntity>> {
        let Some(oid) = parse_object_id(&session.id) else {
            return Ok(None);
        };
        session.updated_at = DateTime::now().to_system_time();
        let id = session.id.clone();
        let document = MongoSessionDocument::from_entity(oid, session.clone());
        let collection = self.session_collection().await;

        let outcome = collection
            .replace_one(doc_id(oid), &document)
            .await
            .map_err(|source| MongoDaoError::Save {
                collection: SESSION_COLLECTION_NAME,
                id,
                source,
            })?;

        Ok((outcome.matched_count > 0).then_some(session))
    }

    async fn delete_session(&self, id: String) -> MongoResult<bool> {
        let Some(oid) = parse_object_id(&id) else {
            return Ok(false);
        };
        let collection = self.session_collection().await;
        let outcome = collection
            .delete_one(doc_id(oid))
            .await
            .map_err(|source| MongoDaoError::Delete {
                collection: SESSION_COLLECTION_NAME,
                id,
                source,
            })?;
        Ok(outcome.deleted_count > 0)
    }

    async fn insert_result(&self, result: NewQuizResult) -> MongoResult<QuizResultEntity> {
        let document = MongoResultDocument::from_new(ObjectId::new(), result, DateTime::now());
        let collection = self.result_collection().await;

        collection
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::Insert {
                collection: RESULT_COLLECTION_NAME,
                source,
            })?;

        Ok(document.into())
    }

    async fn find_result(&self, id: String) -> MongoResult<Option<QuizResultEntity>> {
        let Some(oid) = parse_object_id(&id) else {
            return Ok(None);
        };
        let collection = self.result_collection().await;

        let document = collection
            .find_one(doc_id(oid))
            .await
            .map_err(|source| MongoDaoError::Load {
                collection: RESULT_COLLECTION_NAME,
                id,
                source,
            })?;

        Ok(document.map(Into::into))
    }

    async fn list_results(&self, filter: ResultFilter) -> MongoResult<Vec<QuizResultEntity>> {
        let query = match filter {
            ResultFilter::PublicCompleted => doc! {"visibility": "public", "status": "completed"},
            ResultFilter::OwnedBy(user) => doc! {"user": user_ref(&user)},
        };
        let collection = self.result_collection().await;
        let query_err = |source| MongoDaoError::Query {
            collection: RESULT_COLLECTION_NAME,
            source,
        };

        let documents: Vec<MongoResultDocument> = collection
            .find(query)
            .sort(doc! {"createdAt": -1})
            .await
            .map_err(query_err)?
            .try_collect()
            .await
            .map_err(query_err)?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn replace_result(
        &self,
        mut result: QuizResultEntity,
    ) -> MongoResult<Option<QuizResultEntity>> {
        let Some(oid) = parse_object_id(&result.id) else {
            return Ok(None);
        };
        result.updated_at = DateTime::now().to_system_time();
        let id = result.id.clone();
        let document = MongoResultDocument::from_entity(oid, result.clone());
        let collection = self.result_collection().await;

        let outcome = collection
            .replace_one(doc_id(oid), &document)
            .await
            .map_err(|source| MongoDaoError::Save {
                collection: RESULT_COLLECTION_NAME,
                id,
                source,
            })?;

        Ok((outcome.matched_count > 0).then_some(result))
    }

    async fn delete_result(&self, id: String) -> MongoResult<bool> {
        let Some(oid) = parse_object_id(&id) else {
            return Ok(false);
        };
        let collection = self.result_collection().await;
        let outcome = collection
            .delete_one(doc_id(oid))
            .await
            .map_err(|source| MongoDaoError::Delete {
                collection: RESULT_COLLECTION_NAME,
                id,
                source,
            })?;
        Ok(outcome.deleted_count > 0)
    }

    async fn leaderboard(&self, limit: usize) -> MongoResult<Vec<QuizResultEntity>> {
        let collection = self.result_collection().await;
        let query_err = |source| MongoDaoError::Query {
            collection: RESULT_COLLECTION_NAME,
            source,
        };

        let documents: Vec<MongoResultDocument> = collection
            .find(doc! {"visibility": "public", "status": "completed"})
            .sort(doc! {
                "accuracy": -1,
                "correctCount": -1,
                "totalTimeSeconds": 1,
                "createdAt": 1,
            })
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .await
            .map_err(query_err)?
            .try_collect()
            .await
            .map_err(query_err)?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn user_emails(&self, ids: Vec<String>) -> MongoResult<HashMap<String, String>> {
        let object_ids: Vec<ObjectId> = ids.iter().filter_map(|id| parse_object_id(id)).collect();
        if object_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let collection = self.user_collection().await;
        let query_err = |source| MongoDaoError::Query {
            collection: USER_COLLECTION_NAME,
            source,
        };

        let users: Vec<MongoUserEmail> = collection
            .find(doc! {"_id": {"$in": object_ids}})
            .projection(doc! {"email": 1})
            .await
            .map_err(query_err)?
            .try_collect()
            .await
            .map_err(query_err)?;

        Ok(users
            .into_iter()
            .filter_map(|user| user.email.map(|email| (user.id.to_hex(), email)))
            .collect())
    }
}

async fn create_index(
    collection: &Collection<Document>,
    collection_name: &'static str,
    index: &'static str,
    keys: Document,
    unique: bool,
) -> MongoResult<()> {
    let model = IndexModel::builder()
        .keys(keys)
        .options(
            IndexOptions::builder()
                .name(Some(format!("{collection_name}_{index}_idx")))
                .unique(Some(unique))
                .build(),
        )
        .build();

    collection
        .create_index(model)
        .await
        .map_err(|source| MongoDaoError::EnsureIndex {
            collection: collection_name,
            index,
            source,
        })?;
    Ok(())
}

impl QuizStore for MongoQuizStore {
    fn insert_session(
        &self,
        session: NewGameSession,
    ) -> BoxFuture<'static, StorageResult<GameSessionEntity>> {
        let store = self.clone();
        Box::pin(async move { store.insert_session(session).await })
    }

    fn find_session(
        &self,
        id: String,
    ) -> BoxFuture<'static, StorageResult<Option<GameSessionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_session(id).await.map_err(Into::into) })
    }

    fn find_session_by_code(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<GameSessionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_session_by_code(code).await.map_err(Into::into) })
    }

    fn list_sessions_by_host(
        &self,
        host: String,
    ) -> BoxFuture<'static, StorageResult<Vec<GameSessionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_sessions_by_host(host).await.map_err(Into::into) })
    }

    fn replace_session(
        &self,
        session: GameSessionEntity,
    ) -> BoxFuture<'static, StorageResult<Option<GameSessionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.replace_session(session).await.map_err(Into::into) })
    }

    fn delete_session(&self, id: String) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_session(id).await.map_err(Into::into) })
    }

    fn insert_result(
        &self,
        result: NewQuizResult,
    ) -> BoxFuture<'static, StorageResult<QuizResultEntity>> {
        let store = self.clone();
        Box::pin(async move { store.insert_result(result).await.map_err(Into::into) })
    }

    fn find_result(
        &self,
        id: String,
    ) -> BoxFuture<'static, StorageResult<Option<QuizResultEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_result(id).await.map_err(Into::into) })
    }

    fn list_results(
        &self,
        filter: ResultFilter,
    ) -> BoxFuture<'static, StorageResult<Vec<QuizResultEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_results(filter).await.map_err(Into::into) })
    }

    fn replace_result(
        &self,
        result: QuizResultEntity,
    ) -> BoxFuture<'static, StorageResult<Option<QuizResultEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.replace_result(result).await.map_err(Into::into) })
    }

    fn delete_result(&self, id: String) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_result(id).await.map_err(Into::into) })
    }

    fn leaderboard(
        &self,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<QuizResultEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.leaderboard(limit).await.map_err(Into::into) })
    }

    fn user_emails(
        &self,
        ids: Vec<String>,
    ) -> BoxFuture<'static, StorageResult<HashMap<String, String>>> {
        let store = self.clone();
        Box::pin(async move { store.user_emails(ids).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
