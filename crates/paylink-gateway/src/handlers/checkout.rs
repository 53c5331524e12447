use crate::error::{ApiError, Result};
use crate::model::{CheckoutStatusQuery, CheckoutStatusResponse};
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::Json;
use paylink_checkout::validate_session_id;
use tracing::debug;

pub async fn checkout_status_handler(
    State(state): State<AppState>,
    Query(query): Query<CheckoutStatusQuery>,
) -> Result<Json<CheckoutStatusResponse>> {
    let Some(session_id) = query.cs.filter(|cs| !cs.trim().is_empty()) else {
        return Err(ApiError::BadRequest {
            code: "MISSING_CS",
            message: "query parameter 'cs' is required".to_string(),
        });
    };

    let session_id = session_id.trim();
    validate_session_id(session_id).map_err(paylink_core::Error::from)?;

    let session = state
        .links()
        .payments()
        .retrieve_checkout_session(session_id)
        .await?;
    debug!(session_id = %session.id, payment_status = ?session.payment_status, "checkout status");

    Ok(Json(CheckoutStatusResponse {
        ok: true,
        order_id: session.client_reference_id,
        amount: session.amount_total,
        currency: session.currency,
        payment_status: session.payment_status,
        status: session.status,
    }))
}
