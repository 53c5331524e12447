use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutStatusQuery {
    pub cs: Option<String>,
}

/// Field names follow what the storefront success page reads.
#[derive(Debug, Serialize)]
pub struct CheckoutStatusResponse {
    pub ok: bool,
    #[serde(rename = "orderId")]
    pub order_id: Option<String>,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub payment_status: Option<String>,
    pub status: Option<String>,
}

/// The amount is kept as raw JSON so `59.8` or `"5980"` are reported as an
/// invalid amount instead of a body rejection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendPaymentRequest {
    #[serde(default)]
    pub final_total_jpy: Value,
    #[serde(default)]
    pub phone_e164: Option<String>,
    #[serde(default)]
    pub expires_in_sec: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct SendPaymentResponse {
    pub ok: bool,
    pub url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutUrlRequest {
    #[serde(default)]
    pub final_total_jpy: Value,
    #[serde(default)]
    pub expires_in_sec: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutUrlResponse {
    pub ok: bool,
    /// Short URL when one was issued, else the checkout URL.
    pub url: String,
    pub checkout_url: String,
    pub short_url: Option<String>,
    pub session_id: String,
    pub expires_at: Option<Timestamp>,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}
