use axum::{
    Json,
    body::{Body, Bytes},
    extract::{FromRequest, FromRequestParts, Query, State},
    http::{Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use serde::de::DeserializeOwned;

use crate::{error::AppError, state::SharedState};

/// JSON body extractor answering malformed bodies with a 400 `{message}`.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// JSON body extractor for payloads whose fields are all optional.
///
/// A missing or blank body yields `T::default()`; anything else must parse as JSON.
#[derive(Debug)]
pub struct ApiJsonOrDefault<T>(pub T);

impl<T, S> FromRequest<S> for ApiJsonOrDefault<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request<Body>, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state).await.map_err(|rejection| {
            AppError::BadRequest(format!("invalid request body: {}", rejection.body_text()))
        })?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(T::default()));
        }
        let Json(value) = Json::<T>::from_bytes(&bytes)?;
        Ok(Self(value))
    }
}

/// Query string extractor answering malformed parameters with a 400 `{message}`.
#[derive(Debug, FromRequestParts)]
#[from_request(via(Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// Verify the bearer token and expose the caller as an `AuthUser` extension.
pub async fn require_auth(
    State(state): State<SharedState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let caller = state.tokens().verify_header(header)?;
    req.extensions_mut().insert(caller);
    Ok(next.run(req).await)
}
