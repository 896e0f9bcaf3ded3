/// Bearer token verification.
pub mod auth_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Question generation through the completion service.
pub mod question_service;
/// Quiz results, access rules and leaderboard.
pub mod result_service;
/// Shareable session code allocation.
pub mod session_code;
/// Game session lifecycle and host-only access.
pub mod session_service;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
/// WebSocket chat relay handling.
pub mod websocket_service;
