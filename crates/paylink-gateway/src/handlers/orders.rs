use crate::error::{ApiError, Result};
use crate::model::{
    CheckoutUrlRequest, CheckoutUrlResponse, SendPaymentRequest, SendPaymentResponse,
};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use paylink_checkout::CheckoutRequest;
use paylink_core::{Amount, OrderId, PhoneNumber, ValidationError};
use serde_json::Value;
use std::time::Duration;
use tracing::info;

fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(inner)| inner)
        .map_err(|rejection| ApiError::BadRequest {
            code: "INVALID_JSON",
            message: rejection.body_text(),
        })
}

fn checkout_request(
    order_id: &str,
    amount: &Value,
    expires_in_sec: Option<u64>,
) -> Result<CheckoutRequest> {
    let order_id: OrderId = order_id.parse().map_err(paylink_core::Error::from)?;
    let amount = Amount::from_json(amount).map_err(paylink_core::Error::from)?;
    Ok(CheckoutRequest {
        order_id,
        amount,
        expires_in: expires_in_sec
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs),
    })
}

pub async fn send_payment_handler(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    payload: std::result::Result<Json<SendPaymentRequest>, JsonRejection>,
) -> Result<Json<SendPaymentResponse>> {
    let request = body(payload)?;
    let checkout = checkout_request(&order_id, &request.final_total_jpy, request.expires_in_sec)?;
    let phone: PhoneNumber = request
        .phone_e164
        .as_deref()
        .unwrap_or_default()
        .parse()
        .map_err(|e: ValidationError| paylink_core::Error::from(e))?;

    let link = state.links().send_payment(&checkout, &phone).await?;
    info!(order_id = %checkout.order_id, session_id = %link.session_id, "payment link sent by sms");

    Ok(Json(SendPaymentResponse {
        ok: true,
        url: link.preferred_url().to_string(),
    }))
}

pub async fn checkout_url_handler(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    payload: std::result::Result<Json<CheckoutUrlRequest>, JsonRejection>,
) -> Result<Json<CheckoutUrlResponse>> {
    let request = body(payload)?;
    let checkout = checkout_request(&order_id, &request.final_total_jpy, request.expires_in_sec)?;

    let link = state.links().create_link(&checkout).await?;
    info!(
        order_id = %checkout.order_id,
        session_id = %link.session_id,
        shortened = link.short_url.is_some(),
        "checkout url created"
    );

    Ok(Json(CheckoutUrlResponse {
        ok: true,
        url: link.preferred_url().to_string(),
        checkout_url: link.checkout_url,
        short_url: link.short_url,
        session_id: link.session_id,
        expires_at: link.expires_at,
    }))
}
