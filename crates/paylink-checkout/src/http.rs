//! Shared reqwest plumbing for the provider clients.

use paylink_core::{ConfigError, Provider, UpstreamError};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Default timeout for outbound provider calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Longest slice of an error body kept in error messages.
const ERROR_BODY_LIMIT: usize = 200;

/// Builds the HTTP client shared by all provider clients.
///
/// Redirects are not followed: every provider answers API calls directly.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, ConfigError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::none())
        .user_agent(concat!("paylink/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ConfigError::Invalid {
            name: "HTTP_TIMEOUT_SECS",
            reason: format!("failed to build HTTP client: {e}"),
        })
}

pub(crate) fn transport_error(provider: Provider, err: reqwest::Error) -> UpstreamError {
    UpstreamError::Transport {
        provider,
        message: err.to_string(),
    }
}

pub(crate) fn truncate_body(body: &str) -> String {
    body.chars().take(ERROR_BODY_LIMIT).collect()
}

/// Decodes a successful JSON response.
pub(crate) async fn read_json<T: DeserializeOwned>(
    provider: Provider,
    response: reqwest::Response,
) -> Result<T, UpstreamError> {
    let body = response
        .text()
        .await
        .map_err(|e| transport_error(provider, e))?;
    serde_json::from_str(&body).map_err(|e| UpstreamError::InvalidResponse {
        provider,
        message: format!("{e}: {}", truncate_body(&body)),
    })
}
