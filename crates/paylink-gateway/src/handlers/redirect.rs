use crate::error::{ApiError, Result};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use paylink_core::ShortToken;
use tracing::{debug, warn};

/// `GET /p/{token}`: 302 to the stored checkout URL.
pub async fn redirect_handler(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Response> {
    let Ok(token) = ShortToken::new(token) else {
        return Err(ApiError::NotFound);
    };

    let target = state
        .links()
        .shortener()
        .resolve(&token)
        .await
        .inspect_err(|err| warn!(token = %token, error = %err, "short link lookup failed"))?;

    match target {
        Some(target) => {
            debug!(token = %token, "redirecting short link");
            Ok((StatusCode::FOUND, [(header::LOCATION, target)]).into_response())
        }
        None => Err(ApiError::NotFound),
    }
}
