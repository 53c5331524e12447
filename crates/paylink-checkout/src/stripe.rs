pub mod webhook;

use crate::http::{read_json, transport_error, truncate_body};
use async_trait::async_trait;
use jiff::Timestamp;
use paylink_core::{
    Amount, ConfigError, IdempotencyKey, OrderId, Provider, Result, UpstreamError, ValidationError,
};
use serde::Deserialize;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;
use url::Url;

pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";

const SESSION_ID_PREFIX: &str = "cs_";

/// Accepts only `cs_` followed by ASCII letters, digits and underscores.
pub fn validate_session_id(session_id: &str) -> std::result::Result<(), ValidationError> {
    let valid = session_id
        .strip_prefix(SESSION_ID_PREFIX)
        .is_some_and(|rest| {
            !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
        });
    if valid {
        Ok(())
    } else {
        Err(ValidationError::InvalidSessionId(session_id.to_string()))
    }
}

/// What to charge for in a hosted checkout session.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSessionRequest {
    pub order_id: OrderId,
    pub amount: Amount,
    /// ISO currency code in lowercase, e.g. `jpy`.
    pub currency: String,
    pub product_name: String,
    pub success_url: String,
    pub cancel_url: String,
    /// Absolute expiry; `None` leaves the provider default (24h).
    pub expires_at: Option<Timestamp>,
}

/// The subset of a Stripe checkout session the service reads.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    /// `paid`, `unpaid` or `no_payment_required`.
    #[serde(default)]
    pub payment_status: Option<String>,
    /// `open`, `complete` or `expired`.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    /// Unix seconds.
    #[serde(default)]
    pub expires_at: Option<i64>,
}

impl CheckoutSession {
    pub fn expires_at(&self) -> Option<Timestamp> {
        self.expires_at
            .and_then(|secs| Timestamp::from_second(secs).ok())
    }

    /// The order this session pays for, if it carries a numeric reference.
    pub fn order_id(&self) -> Option<OrderId> {
        self.client_reference_id
            .as_deref()
            .and_then(|id| id.parse().ok())
    }
}

/// Hosted-checkout operations of a payment provider.
#[async_trait]
pub trait PaymentProvider: Send + Sync + 'static {
    /// Creates a checkout session. Repeating the call with the same
    /// idempotency key returns the original session.
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
        idempotency_key: &IdempotencyKey,
    ) -> Result<CheckoutSession>;

    /// Fetches a session by id with its payment intent expanded.
    async fn retrieve_checkout_session(&self, session_id: &str) -> Result<CheckoutSession>;
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct StripeConfig {
    #[builder(setter(into))]
    pub secret_key: String,
    #[builder(default = DEFAULT_API_BASE.to_string(), setter(into))]
    pub api_base: String,
}

/// Stripe REST client for checkout sessions.
#[derive(Debug, Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    config: StripeConfig,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

impl StripeClient {
    pub fn new(http: reqwest::Client, config: StripeConfig) -> Self {
        Self { http, config }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v1{}", self.config.api_base.trim_end_matches('/'), path)
    }

    /// `{api_base}/v1/checkout/sessions/{id}` with the id as a single encoded segment.
    fn session_endpoint(&self, session_id: &str) -> Result<Url> {
        let invalid_base = |reason: String| ConfigError::Invalid {
            name: "STRIPE_API_BASE",
            reason,
        };
        let mut url =
            Url::parse(&self.config.api_base).map_err(|e| invalid_base(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid_base("cannot be a base url".to_string()))?
            .pop_if_empty()
            .extend(["v1", "checkout", "sessions"])
            .push(session_id);
        Ok(url)
    }

    fn session_form(request: &CheckoutSessionRequest) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("mode", "payment".to_string()),
            ("line_items[0][price_data][currency]", request.currency.clone()),
            (
                "line_items[0][price_data][product_data][name]",
                request.product_name.clone(),
            ),
            (
                "line_items[0][price_data][unit_amount]",
                request.amount.to_string(),
            ),
            ("line_items[0][quantity]", "1".to_string()),
            ("success_url", request.success_url.clone()),
            ("cancel_url", request.cancel_url.clone()),
            ("client_reference_id", request.order_id.to_string()),
        ];
        if let Some(expires_at) = request.expires_at {
            form.push(("expires_at", expires_at.as_second().to_string()));
        }
        form
    }

    async fn into_session(response: reqwest::Response) -> Result<CheckoutSession> {
        let status = response.status();
        if status.is_success() {
            return Ok(read_json(Provider::Stripe, response).await?);
        }

        let body = response
            .text()
            .await
            .map_err(|e| transport_error(Provider::Stripe, e))?;
        let (code, message) = match serde_json::from_str::<StripeErrorBody>(&body) {
            Ok(StripeErrorBody { error }) => (
                error.code.or(error.kind),
                error.message.unwrap_or_else(|| truncate_body(&body)),
            ),
            Err(_) => (None, truncate_body(&body)),
        };
        warn!(status = status.as_u16(), code = ?code, "stripe request failed");
        Err(UpstreamError::Provider {
            provider: Provider::Stripe,
            status: Some(status.as_u16()),
            code,
            message,
        }
        .into())
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
        idempotency_key: &IdempotencyKey,
    ) -> Result<CheckoutSession> {
        debug!(
            order_id = %request.order_id,
            idempotency_key = %idempotency_key,
            "creating checkout session"
        );

        let response = self
            .http
            .post(self.endpoint("/checkout/sessions"))
            .bearer_auth(&self.config.secret_key)
            .header("Idempotency-Key", idempotency_key.as_str())
            .form(&Self::session_form(request))
            .send()
            .await
            .map_err(|e| transport_error(Provider::Stripe, e))?;

        let session = Self::into_session(response).await?;
        info!(order_id = %request.order_id, session_id = %session.id, "checkout session ready");
        Ok(session)
    }

    async fn retrieve_checkout_session(&self, session_id: &str) -> Result<CheckoutSession> {
        validate_session_id(session_id)?;
        let url = self.session_endpoint(session_id)?;

        let response = self
            .http
            .get(url)
            .bearer_auth(&self.config.secret_key)
            .query(&[("expand[]", "payment_intent")])
            .send()
            .await
            .map_err(|e| transport_error(Provider::Stripe, e))?;

        Self::into_session(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use paylink_core::Error;
    use serde_json::json;

    fn client(server: &MockServer) -> StripeClient {
        let config = StripeConfig::builder()
            .secret_key("sk_test_123")
            .api_base(server.base_url())
            .build();
        StripeClient::new(reqwest::Client::new(), config)
    }

    fn request() -> CheckoutSessionRequest {
        CheckoutSessionRequest {
            order_id: OrderId::new(1001).unwrap(),
            amount: Amount::new(5980).unwrap(),
            currency: "jpy".to_string(),
            product_name: "Order #1001".to_string(),
            success_url: "https://shop.example.com/payment/success?order=1001".to_string(),
            cancel_url: "https://shop.example.com/payment/cancel?order=1001".to_string(),
            expires_at: Some(Timestamp::from_second(1_760_000_000).unwrap()),
        }
    }

    #[tokio::test]
    async fn create_session_sends_form_and_idempotency_key() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/checkout/sessions")
                    .header("authorization", "Bearer sk_test_123")
                    .header("idempotency-key", "order-1001-5980")
                    .form_urlencoded_tuple("mode", "payment")
                    .form_urlencoded_tuple("line_items[0][price_data][currency]", "jpy")
                    .form_urlencoded_tuple("line_items[0][price_data][unit_amount]", "5980")
                    .form_urlencoded_tuple(
                        "line_items[0][price_data][product_data][name]",
                        "Order #1001",
                    )
                    .form_urlencoded_tuple("client_reference_id", "1001")
                    .form_urlencoded_tuple("expires_at", "1760000000");
                then.status(200).json_body(json!({
                    "id": "cs_test_abc",
                    "url": "https://checkout.stripe.com/c/pay/cs_test_abc",
                    "client_reference_id": "1001",
                    "mode": "payment",
                    "payment_status": "unpaid",
                    "status": "open",
                    "amount_total": 5980,
                    "currency": "jpy",
                    "expires_at": 1760000000
                }));
            })
            .await;

        let key =
            IdempotencyKey::for_order(OrderId::new(1001).unwrap(), Amount::new(5980).unwrap());
        let session = client(&server)
            .create_checkout_session(&request(), &key)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(session.id, "cs_test_abc");
        assert_eq!(
            session.url.as_deref(),
            Some("https://checkout.stripe.com/c/pay/cs_test_abc")
        );
        assert_eq!(session.order_id(), Some(OrderId::new(1001).unwrap()));
        assert_eq!(session.expires_at().unwrap().as_second(), 1_760_000_000);
    }

    #[tokio::test]
    async fn retrieve_session_expands_payment_intent() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v1/checkout/sessions/cs_test_abc")
                    .query_param("expand[]", "payment_intent");
                then.status(200).json_body(json!({
                    "id": "cs_test_abc",
                    "client_reference_id": "1001",
                    "payment_status": "paid",
                    "status": "complete",
                    "amount_total": 5980,
                    "currency": "jpy",
                    "payment_intent": { "id": "pi_123" }
                }));
            })
            .await;

        let session = client(&server)
            .retrieve_checkout_session("cs_test_abc")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(session.payment_status.as_deref(), Some("paid"));
        assert_eq!(session.status.as_deref(), Some("complete"));
        assert_eq!(session.amount_total, Some(5980));
    }

    #[tokio::test]
    async fn provider_errors_keep_status_and_code() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/checkout/sessions/cs_missing");
                then.status(404).json_body(json!({
                    "error": {
                        "code": "resource_missing",
                        "message": "No such checkout.session: 'cs_missing'",
                        "type": "invalid_request_error"
                    }
                }));
            })
            .await;

        let err = client(&server)
            .retrieve_checkout_session("cs_missing")
            .await
            .unwrap_err();

        match err {
            Error::Upstream(UpstreamError::Provider {
                provider,
                status,
                code,
                message,
            }) => {
                assert_eq!(provider, Provider::Stripe);
                assert_eq!(status, Some(404));
                assert_eq!(code.as_deref(), Some("resource_missing"));
                assert!(message.contains("cs_missing"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn retrieve_rejects_ids_that_escape_the_sessions_path() {
        let server = MockServer::start_async().await;
        let charges = server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/charges/ch_secret");
                then.status(200).json_body(json!({
                    "id": "ch_secret",
                    "amount_total": 123,
                    "currency": "usd"
                }));
            })
            .await;

        for session_id in [
            "../../charges/ch_secret",
            "cs_test/../../charges",
            "cs_",
            "ch_secret",
        ] {
            let err = client(&server)
                .retrieve_checkout_session(session_id)
                .await
                .unwrap_err();
            assert!(
                matches!(err, Error::Validation(ValidationError::InvalidSessionId(_))),
                "{session_id}: {err:?}"
            );
        }
        assert_eq!(charges.hits_async().await, 0);
    }

    #[test]
    fn session_endpoint_keeps_id_in_one_segment() {
        let config = StripeConfig::builder()
            .secret_key("sk_test_123")
            .api_base("https://api.stripe.com/")
            .build();
        let client = StripeClient::new(reqwest::Client::new(), config);

        let url = client.session_endpoint("cs_test_abc").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.stripe.com/v1/checkout/sessions/cs_test_abc"
        );

        let url = client.session_endpoint("../charges").unwrap();
        assert_eq!(url.path(), "/v1/checkout/sessions/..%2Fcharges");
    }

    #[test]
    fn session_ids_must_be_checkout_sessions() {
        assert!(validate_session_id("cs_test_a1B2c3").is_ok());
        assert!(validate_session_id("cs_live_abc_123").is_ok());
        assert!(validate_session_id("").is_err());
        assert!(validate_session_id("cs_").is_err());
        assert!(validate_session_id("pi_123").is_err());
        assert!(validate_session_id("cs_test abc").is_err());
        assert!(validate_session_id("cs_test%2F..").is_err());
    }

    #[test]
    fn non_numeric_reference_has_no_order_id() {
        let session = CheckoutSession {
            id: "cs_1".to_string(),
            url: None,
            client_reference_id: Some("guest".to_string()),
            mode: None,
            payment_status: None,
            status: None,
            amount_total: None,
            currency: None,
            expires_at: None,
        };
        assert!(session.order_id().is_none());
    }
}
