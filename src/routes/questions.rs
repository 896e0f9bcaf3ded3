use axum::{Json, Router, extract::State, middleware, routing::post};

use crate::{
    dto::question::{Question, QuestionRequest},
    error::AppError,
    routes::extract::{ApiJson, require_auth},
    services::question_service,
    state::SharedState,
};

/// Generate a fresh batch of multiple choice questions.
#[utoipa::path(
    post,
    path = "/questions",
    tag = "questions",
    security(("bearer" = [])),
    request_body = QuestionRequest,
    responses(
        (status = 200, description = "Generated questions", body = [Question]),
        (status = 400, description = "Invalid request"),
        (status = 500, description = "Failed to fetch questions"),
        (status = 502, description = "Invalid format from upstream")
    )
)]
pub async fn generate_questions(
    State(state): State<SharedState>,
    ApiJson(payload): ApiJson<QuestionRequest>,
) -> Result<Json<Vec<Question>>, AppError> {
    Ok(Json(
        question_service::generate_questions(&state, payload).await?,
    ))
}

/// Configure the question generation route.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/questions", post(generate_questions))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}
