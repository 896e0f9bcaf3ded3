use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::get,
};

use crate::{
    dto::{
        result::{
            CreateResultRequest, LeaderboardEntry, LeaderboardQuery, ResultListQuery,
            ResultResponse, UpdateResultRequest,
        },
        session::MessageResponse,
    },
    error::AppError,
    routes::extract::{ApiJson, ApiQuery, require_auth},
    services::{auth_service::AuthUser, result_service},
    state::SharedState,
};

/// Quiz result endpoints (authenticated) and the public leaderboard.
pub fn router(state: SharedState) -> Router<SharedState> {
    let protected = Router::new()
        .route("/results", get(list_results).post(create_result))
        .route(
            "/results/{id}",
            get(get_result).put(update_result).delete(delete_result),
        )
        .route_layer(middleware::from_fn_with_state(state, require_auth));

    Router::new()
        .route("/leaderboard", get(leaderboard))
        .merge(protected)
}

/// Record a quiz attempt for the caller.
#[utoipa::path(
    post,
    path = "/results",
    tag = "results",
    security(("bearer" = [])),
    request_body = CreateResultRequest,
    responses(
        (status = 201, description = "Result stored", body = ResultResponse),
        (status = 400, description = "Invalid counts or payload"),
        (status = 500, description = "Failed to save quiz result")
    )
)]
pub async fn create_result(
    State(state): State<SharedState>,
    Extension(caller): Extension<AuthUser>,
    ApiJson(payload): ApiJson<CreateResultRequest>,
) -> Result<(StatusCode, Json<ResultResponse>), AppError> {
    let result = result_service::create_result(&state, &caller, payload).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// List public completed results or the caller's own, newest first.
#[utoipa::path(
    get,
    path = "/results",
    tag = "results",
    security(("bearer" = [])),
    params(ResultListQuery),
    responses((status = 200, description = "Results", body = [ResultResponse]))
)]
pub async fn list_results(
    State(state): State<SharedState>,
    Extension(caller): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<ResultListQuery>,
) -> Result<Json<Vec<ResultResponse>>, AppError> {
    Ok(Json(result_service::list_results(&state, &caller, query).await?))
}

/// Fetch a public result or one of the caller's own.
#[utoipa::path(
    get,
    path = "/results/{id}",
    tag = "results",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Result identifier")),
    responses(
        (status = 200, description = "Result", body = ResultResponse),
        (status = 403, description = "Private result of another user"),
        (status = 404, description = "Quiz result not found")
    )
)]
pub async fn get_result(
    State(state): State<SharedState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<ResultResponse>, AppError> {
    Ok(Json(result_service::get_result(&state, &caller, id).await?))
}

/// Change visibility or notes. Owner only.
#[utoipa::path(
    put,
    path = "/results/{id}",
    tag = "results",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Result identifier")),
    request_body = UpdateResultRequest,
    responses(
        (status = 200, description = "Updated result", body = ResultResponse),
        (status = 400, description = "Invalid visibility or no fields"),
        (status = 403, description = "Caller is not the owner"),
        (status = 404, description = "Quiz result not found")
    )
)]
pub async fn update_result(
    State(state): State<SharedState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<UpdateResultRequest>,
) -> Result<Json<ResultResponse>, AppError> {
    Ok(Json(
        result_service::update_result(&state, &caller, id, payload).await?,
    ))
}

/// Delete a result. Owner only.
#[utoipa::path(
    delete,
    path = "/results/{id}",
    tag = "results",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Result identifier")),
    responses(
        (status = 200, description = "Result deleted", body = MessageResponse),
        (status = 403, description = "Caller is not the owner"),
        (status = 404, description = "Quiz result not found")
    )
)]
pub async fn delete_result(
    State(state): State<SharedState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    result_service::delete_result(&state, &caller, id).await?;
    Ok(Json(MessageResponse::new("Quiz result deleted.")))
}

/// Ranked public completed results.
#[utoipa::path(
    get,
    path = "/leaderboard",
    tag = "results",
    params(LeaderboardQuery),
    responses(
        (status = 200, description = "Leaderboard", body = [LeaderboardEntry]),
        (status = 500, description = "Failed to fetch leaderboard")
    )
)]
pub async fn leaderboard(
    State(state): State<SharedState>,
    ApiQuery(query): ApiQuery<LeaderboardQuery>,
) -> Result<Json<Vec<LeaderboardEntry>>, AppError> {
    let limit = result_service::parse_limit(query.limit.as_deref());
    Ok(Json(result_service::leaderboard(&state, limit).await?))
}
