//! QuestNest Back binary entrypoint wiring REST, WebSocket, storage and completion layers.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use questnest_back::{
    adapters::OpenAiCompletion,
    config::{AppConfig, StoreBackend},
    dao::quiz_store::memory::MemoryQuizStore,
    routes,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();
    init_tracing();
    if let Ok(path) = dotenv {
        info!(path = %path.display(), "loaded environment file");
    }

    let config = AppConfig::load();
    let completion = OpenAiCompletion::new(
        config.openai_base_url.clone(),
        config.openai_api_key.clone(),
        config.openai_model.clone(),
        config.question_timeout,
    )
    .context("building completion client")?;

    let app_state = AppState::new(&config, Arc::new(completion));
    install_store(&app_state, &config).await;

    let app = build_router(app_state, &config.allowed_origins);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Select the storage backend; MongoDB is supervised in the background.
async fn install_store(state: &SharedState, config: &AppConfig) {
    match config.store_backend {
        StoreBackend::Memory => {
            info!("using in-memory store; data is lost on restart");
            state.set_quiz_store(Arc::new(MemoryQuizStore::new())).await;
        }
        #[cfg(feature = "mongo-store")]
        StoreBackend::Mongodb => spawn_mongo_supervisor(state.clone(), config),
        #[cfg(not(feature = "mongo-store"))]
        StoreBackend::Mongodb => {
            warn!("built without MongoDB support; falling back to the in-memory store");
            state.set_quiz_store(Arc::new(MemoryQuizStore::new())).await;
        }
    }
}

#[cfg(feature = "mongo-store")]
fn spawn_mongo_supervisor(state: SharedState, config: &AppConfig) {
    use questnest_back::{
        dao::{
            quiz_store::{
                QuizStore,
                mongodb::{MongoConfig, MongoQuizStore},
            },
            storage::StorageError,
        },
        services::storage_supervisor,
    };

    let uri = config.mongo_uri.clone();
    let db = config.mongo_db.clone();
    tokio::spawn(storage_supervisor::run(state, move || {
        let uri = uri.clone();
        let db = db.clone();
        async move {
            let mongo_config = MongoConfig::from_uri(&uri, Some(&db)).await?;
            let store = MongoQuizStore::connect(mongo_config).await?;
            Ok::<Arc<dyn QuizStore>, StorageError>(Arc::new(store))
        }
    }));
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState, allowed_origins: &[String]) -> Router<()> {
    routes::router(state)
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
}

/// Permissive CORS unless an explicit origin list is configured.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(origin = %origin, error = %err, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("shutdown signal received");
}
