use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use validator::ValidationErrors;

use crate::{adapters::CompletionError, dao::storage::StorageError};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend failed while performing the named operation.
    #[error("{context}")]
    Storage {
        context: &'static str,
        #[source]
        source: StorageError,
    },
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Caller did not present a valid bearer token.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    /// Caller is authenticated but is not the host or owner of the record.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// The completion service answered with content that is not a valid question batch.
    #[error("invalid format from upstream: {0}")]
    UpstreamFormat(String),
    /// The completion service could not be reached or refused the request.
    #[error("upstream failure")]
    Upstream(#[source] CompletionError),
}

impl ServiceError {
    /// Build a `map_err` adapter tagging storage failures with a caller-facing message.
    pub fn storage(context: &'static str) -> impl FnOnce(StorageError) -> ServiceError {
        move |source| ServiceError::Storage { context, source }
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(err: ValidationErrors) -> Self {
        ServiceError::InvalidInput(format!("validation failed: {err}"))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Missing or invalid credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Caller lacks rights on the resource.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Upstream service returned unusable content.
    #[error("bad gateway: {0}")]
    BadGateway(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn into_message(self) -> String {
        match self {
            AppError::BadRequest(message)
            | AppError::Unauthorized(message)
            | AppError::Forbidden(message)
            | AppError::NotFound(message)
            | AppError::BadGateway(message)
            | AppError::Internal(message) => message,
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Storage { context, source } => {
                error!(error = %source, context, "storage operation failed");
                AppError::Internal(context.to_owned())
            }
            ServiceError::Degraded => AppError::Internal("Storage unavailable.".into()),
            ServiceError::Unauthenticated(message) => AppError::Unauthorized(message),
            ServiceError::Forbidden(message) => AppError::Forbidden(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::UpstreamFormat(detail) => {
                error!(detail = %detail, "upstream returned invalid content");
                AppError::BadGateway("Invalid format from upstream.".into())
            }
            // Logged where the call failed, with the upstream body.
            ServiceError::Upstream(_) => AppError::Internal("Failed to fetch questions.".into()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(format!("invalid request body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(format!("invalid query string: {}", rejection.body_text()))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let payload = Json(ErrorBody {
            message: self.into_message(),
        });

        (status, payload).into_response()
    }
}
