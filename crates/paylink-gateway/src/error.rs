use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use paylink_core::{Error, SecurityError, UpstreamError};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    BadRequest { code: &'static str, message: String },
    #[error("not found")]
    NotFound,
    #[error(transparent)]
    Core(#[from] Error),
    /// A verified webhook could not be applied; the provider should retry.
    #[error("webhook processing failed: {0}")]
    Webhook(Error),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub ok: bool,
    pub error: &'static str,
    pub message: String,
}

fn core_status(err: &Error) -> StatusCode {
    match err {
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        Error::Upstream(UpstreamError::Transport { .. }) => StatusCode::BAD_GATEWAY,
        Error::Upstream(_) => StatusCode::BAD_REQUEST,
        Error::Security(SecurityError::InvalidApiKey) => StatusCode::UNAUTHORIZED,
        Error::Security(SecurityError::TokenCollision { .. }) => StatusCode::SERVICE_UNAVAILABLE,
        Error::Security(_) => StatusCode::BAD_REQUEST,
        Error::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Core(err) => core_status(err),
            ApiError::Webhook(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest { code, .. } => *code,
            ApiError::NotFound => "NOT_FOUND",
            ApiError::Core(err) | ApiError::Webhook(err) => err.code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), code = self.code(), error = %self, "request failed");
        }

        let body = ErrorBody {
            ok: false,
            error: self.code(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
