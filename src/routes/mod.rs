use axum::Router;

use crate::state::SharedState;

/// Swagger UI and OpenAPI document.
pub mod docs;
/// Extractors and the authentication middleware.
pub mod extract;
/// Health check route.
pub mod health;
/// Question generation route.
pub mod questions;
/// Quiz result and leaderboard routes.
pub mod results;
/// Game session routes.
pub mod sessions;
/// Chat relay upgrade route.
pub mod websocket;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(websocket::router())
        .merge(sessions::router(state.clone()))
        .merge(results::router(state.clone()))
        .merge(questions::router(state.clone()));

    api_router.merge(docs::router()).with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::{
        services::auth_service::issue_test_token,
        state::test_support::{ScriptedCompletion, TEST_SECRET, memory_state},
    };

    async fn app() -> Router<()> {
        let (state, _store) = memory_state(ScriptedCompletion::replying(
            r#"[{"question": "q", "options": ["a", "b", "c", "d"], "answer_index": 1}]"#,
        ))
        .await;
        router(state)
    }

    fn request(method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(
                header::AUTHORIZATION,
                format!("Bearer {}", issue_test_token(TEST_SECRET, user)),
            );
        }
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router<()>, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn protected_routes_require_a_token() {
        let app = app().await;
        for (method, uri) in [
            ("GET", "/sessions"),
            ("POST", "/results"),
            ("GET", "/results/abc"),
            ("POST", "/questions"),
        ] {
            let (status, body) = send(&app, request(method, uri, None, None)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
            assert!(body["message"].is_string());
        }

        let (status, _) = send(&app, request("GET", "/leaderboard", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = send(&app, request("GET", "/healthcheck", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn session_lifecycle_over_http() {
        let app = app().await;

        let (status, created) = send(
            &app,
            request("POST", "/sessions", Some("host"), Some(json!({"mode": "co-op"}))),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["mode"], "co-op");
        assert_eq!(created["status"], "lobby");
        let id = created["id"].as_str().unwrap().to_owned();
        let code = created["code"].as_str().unwrap().to_lowercase();

        let (status, found) =
            send(&app, request("GET", &format!("/sessions/{code}"), Some("guest"), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(found["id"], id.as_str());

        let (status, body) = send(
            &app,
            request(
                "PUT",
                &format!("/sessions/{id}"),
                Some("guest"),
                Some(json!({"status": "finished"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Only the host can update this session.");

        let (status, body) = send(
            &app,
            request("PUT", &format!("/sessions/{id}"), Some("host"), Some(json!({"code": "X"}))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "No valid fields provided for update.");

        let (status, body) =
            send(&app, request("DELETE", &format!("/sessions/{id}"), Some("host"), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Session deleted.");

        let (status, body) =
            send(&app, request("GET", "/sessions/NOPE00", Some("host"), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Session not found.");
    }

    #[tokio::test]
    async fn session_create_accepts_a_missing_body() {
        let app = app().await;

        let (status, created) = send(&app, request("POST", "/sessions", Some("host"), None)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["mode"], "solo");
        assert_eq!(created["status"], "lobby");
        assert_eq!(created["host"], "host");

        let (status, body) = send(
            &app,
            request("POST", "/sessions", Some("host"), Some(json!({"mode": 7}))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn results_and_leaderboard_over_http() {
        let app = app().await;

        let (status, body) = send(
            &app,
            request(
                "POST",
                "/results",
                Some("u1"),
                Some(json!({"numberOfQuestions": 9, "correctCount": 7, "visibility": "public"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["accuracy"], 0.7778);

        let (status, body) = send(
            &app,
            request(
                "POST",
                "/results",
                Some("u1"),
                Some(json!({"numberOfQuestions": 3, "correctCount": 1, "answers": "oops"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].is_string());

        let (status, body) = send(
            &app,
            request("POST", "/results", Some("u1"), Some(json!({"correctCount": 1}))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "numberOfQuestions must be a positive number.");

        let (status, body) =
            send(&app, request("GET", "/leaderboard?limit=abc", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        let entries = body.as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0]["user"].is_null());
        assert_eq!(entries[0]["correctCount"], 7);
    }

    #[tokio::test]
    async fn questions_pass_through_valid_batches() {
        let app = app().await;
        let (status, body) = send(
            &app,
            request(
                "POST",
                "/questions",
                Some("u1"),
                Some(json!({"topics": ["art"], "difficulty": "Hard", "numberOfQuestions": 1})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["answer_index"], 1);
        assert_eq!(body[0]["options"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn upstream_errors_map_to_distinct_statuses() {
        let garbage = memory_state(ScriptedCompletion::replying("no json here")).await.0;
        let offline = memory_state(ScriptedCompletion::failing()).await.0;
        let payload = json!({"topics": ["art"], "numberOfQuestions": 2});

        let (status, body) = send(
            &router(garbage),
            request("POST", "/questions", Some("u1"), Some(payload.clone())),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["message"], "Invalid format from upstream.");

        let (status, body) = send(
            &router(offline),
            request("POST", "/questions", Some("u1"), Some(payload)),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Failed to fetch questions.");
    }
}
