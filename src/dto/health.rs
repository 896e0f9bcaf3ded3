use serde::Serialize;
use utoipa::ToSchema;

/// Body of `GET /healthcheck`.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `ok`, or `degraded` while the store is unreachable.
    #[schema(value_type = String)]
    pub status: &'static str,
}

impl HealthResponse {
    /// Storage is reachable.
    pub fn ok() -> Self {
        Self { status: "ok" }
    }

    /// Storage is missing or failing.
    pub fn degraded() -> Self {
        Self { status: "degraded" }
    }
}
