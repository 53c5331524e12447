use crate::redis::DEFAULT_KEY_PREFIX;
use async_trait::async_trait;
use paylink_core::{InsertOutcome, LinkStore, ShortToken, StoreError};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, trace, warn};
use typed_builder::TypedBuilder;

/// Connection settings for the Upstash Redis REST API.
#[derive(Debug, Clone, TypedBuilder)]
pub struct UpstashConfig {
    /// Database REST endpoint, e.g. `https://eu1-sharp-cat-12345.upstash.io`.
    #[builder(setter(into))]
    pub rest_url: String,
    #[builder(setter(into))]
    pub rest_token: String,
    #[builder(default = DEFAULT_KEY_PREFIX.to_string(), setter(into))]
    pub key_prefix: String,
}

/// A [`LinkStore`] speaking the Upstash REST protocol.
///
/// Every command is a JSON array posted to the database endpoint; the reply
/// is `{"result": ...}` on success and `{"error": "..."}` otherwise.
#[derive(Debug, Clone)]
pub struct UpstashLinkStore {
    http: reqwest::Client,
    config: UpstashConfig,
}

#[derive(Debug, Deserialize)]
struct UpstashReply {
    #[serde(default)]
    result: Value,
    error: Option<String>,
}

fn map_reqwest_error(operation: &str, err: reqwest::Error) -> StoreError {
    let message = format!("{operation}: {err}");
    if err.is_timeout() {
        StoreError::Timeout(message)
    } else if err.is_connect() {
        StoreError::Unavailable(message)
    } else {
        StoreError::Operation(message)
    }
}

impl UpstashLinkStore {
    pub fn new(http: reqwest::Client, config: UpstashConfig) -> Self {
        Self { http, config }
    }

    async fn command(&self, operation: &str, command: Value) -> Result<Value, StoreError> {
        let response = self
            .http
            .post(self.config.rest_url.trim_end_matches('/'))
            .bearer_auth(&self.config.rest_token)
            .json(&command)
            .send()
            .await
            .map_err(|e| map_reqwest_error(operation, e))?;

        let status = response.status();
        let reply = response
            .json::<UpstashReply>()
            .await
            .map_err(|e| StoreError::InvalidData(format!("{operation}: {e}")))?;

        if let Some(error) = reply.error {
            return Err(StoreError::Operation(format!("{operation}: {error}")));
        }
        if !status.is_success() {
            return Err(StoreError::Operation(format!(
                "{operation}: unexpected status {status}"
            )));
        }

        Ok(reply.result)
    }
}

#[async_trait]
impl LinkStore for UpstashLinkStore {
    async fn insert_if_absent(
        &self,
        token: &ShortToken,
        target: &str,
        ttl: Duration,
    ) -> Result<InsertOutcome, StoreError> {
        let key = token.store_key(&self.config.key_prefix);
        trace!(token = %token, ttl_secs = ttl.as_secs(), "Storing short link in Upstash");

        let result = self
            .command(
                "failed to write value to Upstash",
                json!(["SET", key, target, "EX", ttl.as_secs(), "NX"]),
            )
            .await
            .inspect_err(|e| warn!(token = %token, error = %e, "Upstash error on SET NX"))?;

        match result {
            Value::String(ref ok) if ok == "OK" => {
                debug!(token = %token, "Stored short link in Upstash");
                Ok(InsertOutcome::Stored)
            }
            Value::Null => {
                debug!(token = %token, "Short token already present in Upstash");
                Ok(InsertOutcome::AlreadyExists)
            }
            other => Err(StoreError::InvalidData(format!(
                "unexpected SET reply: {other}"
            ))),
        }
    }

    async fn get(&self, token: &ShortToken) -> Result<Option<String>, StoreError> {
        let key = token.store_key(&self.config.key_prefix);
        trace!(token = %token, "Fetching short link from Upstash");

        let result = self
            .command("failed to fetch value from Upstash", json!(["GET", key]))
            .await
            .inspect_err(|e| warn!(token = %token, error = %e, "Upstash error on get"))?;

        match result {
            Value::String(target) => Ok(Some(target)),
            Value::Null => Ok(None),
            other => Err(StoreError::InvalidData(format!(
                "unexpected GET reply: {other}"
            ))),
        }
    }
}
