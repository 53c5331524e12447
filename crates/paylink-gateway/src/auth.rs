use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use paylink_core::SecurityError;
use subtle::ConstantTimeEq;
use tracing::warn;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Rejects requests without the configured `x-api-key`. A no-op when no key
/// is configured.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.api_key() else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
        warn!(path = %request.uri().path(), "rejected request without a valid api key");
        let err = paylink_core::Error::from(SecurityError::InvalidApiKey);
        return ApiError::from(err).into_response();
    }

    next.run(request).await
}
