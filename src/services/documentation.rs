use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for QuestNest Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sessions::create_session,
        crate::routes::sessions::list_sessions,
        crate::routes::sessions::get_session_by_code,
        crate::routes::sessions::update_session,
        crate::routes::sessions::delete_session,
        crate::routes::results::create_result,
        crate::routes::results::list_results,
        crate::routes::results::get_result,
        crate::routes::results::update_result,
        crate::routes::results::delete_result,
        crate::routes::results::leaderboard,
        crate::routes::questions::generate_questions,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::session::CreateSessionRequest,
            crate::dto::session::UpdateSessionRequest,
            crate::dto::session::SessionResponse,
            crate::dto::session::QuizSettingsDto,
            crate::dto::session::ParticipantDto,
            crate::dto::session::MessageResponse,
            crate::dto::result::CreateResultRequest,
            crate::dto::result::UpdateResultRequest,
            crate::dto::result::ResultResponse,
            crate::dto::result::AnswerDto,
            crate::dto::result::LeaderboardEntry,
            crate::dto::result::LeaderboardUser,
            crate::dto::question::QuestionRequest,
            crate::dto::question::Question,
            crate::dto::ws::ChatEnvelope,
            crate::dao::models::SessionMode,
            crate::dao::models::SessionStatus,
            crate::dao::models::Difficulty,
            crate::dao::models::Visibility,
            crate::dao::models::ResultStatus,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sessions", description = "Game sessions owned by their host"),
        (name = "results", description = "Quiz results and leaderboard"),
        (name = "questions", description = "Generated quiz questions"),
        (name = "chat", description = "Realtime chat relay"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` JWT scheme referenced by protected routes.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();
        for expected in [
            "/healthcheck",
            "/sessions",
            "/sessions/{code}",
            "/sessions/{id}",
            "/results",
            "/results/{id}",
            "/leaderboard",
            "/questions",
            "/ws",
        ] {
            assert!(paths.contains(&expected), "missing {expected}");
        }
    }
}
