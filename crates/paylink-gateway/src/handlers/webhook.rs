use crate::error::{ApiError, Result};
use crate::model::WebhookAck;
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use tracing::{info, warn};

const SIGNATURE_HEADER: &str = "stripe-signature";

/// Receives the raw body so the signature is checked over the exact bytes
/// the provider signed.
pub async fn stripe_webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>> {
    let Some(webhooks) = state.webhooks() else {
        return Err(ApiError::NotFound);
    };

    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    let event = webhooks
        .verifier
        .construct_event(&body, signature)
        .inspect_err(|err| warn!(error = %err, "rejected webhook"))?;

    let outcome = webhooks
        .processor
        .process(&event)
        .await
        .map_err(ApiError::Webhook)?;
    info!(
        event_id = %event.id,
        event_type = %event.event_type(),
        outcome = ?outcome,
        "webhook handled"
    );

    Ok(Json(WebhookAck { received: true }))
}
