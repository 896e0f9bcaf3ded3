mod chat;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

pub use self::chat::ChatRelay;
use crate::{
    adapters::TextCompletion, config::AppConfig, dao::quiz_store::QuizStore,
    error::ServiceError, services::auth_service::TokenVerifier,
};

/// Handle to [`AppState`] injected into handlers.
pub type SharedState = Arc<AppState>;

/// Central application state storing the store handle, chat peers and outbound clients.
pub struct AppState {
    quiz_store: RwLock<Option<Arc<dyn QuizStore>>>,
    degraded: watch::Sender<bool>,
    chat: ChatRelay,
    completion: Arc<dyn TextCompletion>,
    tokens: TokenVerifier,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: &AppConfig, completion: Arc<dyn TextCompletion>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            quiz_store: RwLock::new(None),
            degraded: degraded_tx,
            chat: ChatRelay::new(),
            completion,
            tokens: TokenVerifier::new(&config.jwt_secret),
        })
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn quiz_store(&self) -> Option<Arc<dyn QuizStore>> {
        let guard = self.quiz_store.read().await;
        guard.as_ref().cloned()
    }

    /// Store handle for request processing; fails while degraded.
    pub async fn require_quiz_store(&self) -> Result<Arc<dyn QuizStore>, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.quiz_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a store implementation and leave degraded mode.
    pub async fn set_quiz_store(&self, store: Arc<dyn QuizStore>) {
        {
            let mut guard = self.quiz_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    /// Registry of connected chat peers.
    pub fn chat(&self) -> &ChatRelay {
        &self.chat
    }

    /// Client for the external question generator.
    pub fn completion(&self) -> Arc<dyn TextCompletion> {
        self.completion.clone()
    }

    /// Verifier for bearer tokens.
    pub fn tokens(&self) -> &TokenVerifier {
        &self.tokens
    }
}
