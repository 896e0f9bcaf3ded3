use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::get,
};

use crate::{
    dto::session::{CreateSessionRequest, MessageResponse, SessionResponse, UpdateSessionRequest},
    error::AppError,
    routes::extract::{ApiJson, ApiJsonOrDefault, require_auth},
    services::{auth_service::AuthUser, session_service},
    state::SharedState,
};

/// Host-owned game session endpoints; every route requires a bearer token.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/sessions", get(list_sessions).post(create_session))
        // GET resolves a shareable code; PUT and DELETE take the session id.
        .route(
            "/sessions/{key}",
            get(get_session_by_code)
                .put(update_session)
                .delete(delete_session),
        )
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

/// Create a session hosted by the caller. An empty body creates a solo session in the lobby.
#[utoipa::path(
    post,
    path = "/sessions",
    tag = "sessions",
    security(("bearer" = [])),
    request_body(content = CreateSessionRequest, description = "Optional; defaults apply to every field"),
    responses(
        (status = 201, description = "Session created", body = SessionResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 500, description = "Failed to create session")
    )
)]
pub async fn create_session(
    State(state): State<SharedState>,
    Extension(caller): Extension<AuthUser>,
    ApiJsonOrDefault(payload): ApiJsonOrDefault<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    let session = session_service::create_session(&state, &caller, payload).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// List the caller's sessions, most recently updated first.
#[utoipa::path(
    get,
    path = "/sessions",
    tag = "sessions",
    security(("bearer" = [])),
    responses((status = 200, description = "Sessions hosted by the caller", body = [SessionResponse]))
)]
pub async fn list_sessions(
    State(state): State<SharedState>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<Vec<SessionResponse>>, AppError> {
    Ok(Json(session_service::list_my_sessions(&state, &caller).await?))
}

/// Look a session up by its code, ignoring case.
#[utoipa::path(
    get,
    path = "/sessions/{code}",
    tag = "sessions",
    security(("bearer" = [])),
    params(("code" = String, Path, description = "Shareable session code")),
    responses(
        (status = 200, description = "Session", body = SessionResponse),
        (status = 404, description = "Session not found")
    )
)]
pub async fn get_session_by_code(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    Ok(Json(session_service::get_session_by_code(&state, &code).await?))
}

/// Update the allow-listed fields of a session. Host only.
#[utoipa::path(
    put,
    path = "/sessions/{id}",
    tag = "sessions",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Session identifier")),
    request_body = UpdateSessionRequest,
    responses(
        (status = 200, description = "Updated session", body = SessionResponse),
        (status = 400, description = "No valid fields provided"),
        (status = 403, description = "Caller is not the host"),
        (status = 404, description = "Session not found")
    )
)]
pub async fn update_session(
    State(state): State<SharedState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<UpdateSessionRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    Ok(Json(
        session_service::update_session(&state, &caller, id, payload).await?,
    ))
}

/// Delete a session. Host only.
#[utoipa::path(
    delete,
    path = "/sessions/{id}",
    tag = "sessions",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Session deleted", body = MessageResponse),
        (status = 403, description = "Caller is not the host"),
        (status = 404, description = "Session not found")
    )
)]
pub async fn delete_session(
    State(state): State<SharedState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    session_service::delete_session(&state, &caller, id).await?;
    Ok(Json(MessageResponse::new("Session deleted.")))
}
