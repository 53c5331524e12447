//! Checkout-link creation and delivery.

use crate::sms::SmsSender;
use crate::stripe::{CheckoutSessionRequest, PaymentProvider};
use jiff::{SignedDuration, Timestamp};
use paylink_core::{
    Amount, ConfigError, IdempotencyKey, OrderId, PhoneNumber, Provider, Result, UpstreamError,
    ValidationError,
};
use paylink_shortener::{IssueOutcome, ShortLinkService};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use typed_builder::TypedBuilder;
use url::Url;

/// Longest lifetime a checkout session may be given.
pub const MAX_SESSION_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, TypedBuilder)]
pub struct CheckoutLinksConfig {
    /// Storefront base used for the success and cancel pages.
    #[builder(setter(into))]
    pub app_base_url: String,
    /// Public base of this service, used to build `/p/{token}` URLs.
    #[builder(setter(into))]
    pub public_base_url: String,
    #[builder(default = "jpy".to_string(), setter(into))]
    pub currency: String,
    /// Shown at the top of payment messages.
    #[builder(default, setter(into))]
    pub shop_name: String,
}

/// Input of [`CheckoutLinks::create_link`].
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    pub order_id: OrderId,
    pub amount: Amount,
    /// Requested session lifetime; capped at 24 hours.
    pub expires_in: Option<Duration>,
}

/// A created checkout session plus its shortened form, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutLink {
    pub session_id: String,
    pub checkout_url: String,
    pub short_url: Option<String>,
    pub expires_at: Option<Timestamp>,
}

impl CheckoutLink {
    /// The URL to hand to the customer.
    pub fn preferred_url(&self) -> &str {
        self.short_url.as_deref().unwrap_or(&self.checkout_url)
    }
}

/// Creates checkout sessions, shortens their URLs and relays them by SMS.
#[derive(Clone)]
pub struct CheckoutLinks {
    payments: Arc<dyn PaymentProvider>,
    shortener: ShortLinkService,
    sms: Option<Arc<dyn SmsSender>>,
    config: CheckoutLinksConfig,
}

impl CheckoutLinks {
    pub fn new(
        payments: Arc<dyn PaymentProvider>,
        shortener: ShortLinkService,
        sms: Option<Arc<dyn SmsSender>>,
        config: CheckoutLinksConfig,
    ) -> Self {
        Self {
            payments,
            shortener,
            sms,
            config,
        }
    }

    pub fn sms_enabled(&self) -> bool {
        self.sms.is_some()
    }

    pub fn payments(&self) -> &Arc<dyn PaymentProvider> {
        &self.payments
    }

    pub fn shortener(&self) -> &ShortLinkService {
        &self.shortener
    }

    /// Creates (or, for the same order and amount, reuses) a checkout
    /// session and tries to shorten its URL.
    pub async fn create_link(&self, request: &CheckoutRequest) -> Result<CheckoutLink> {
        let now = Timestamp::now();
        let session_request = self.session_request(request, now)?;
        let key = IdempotencyKey::for_order(request.order_id, request.amount);

        let session = self
            .payments
            .create_checkout_session(&session_request, &key)
            .await?;
        let checkout_url = session
            .url
            .clone()
            .ok_or_else(|| UpstreamError::InvalidResponse {
                provider: Provider::Stripe,
                message: format!("checkout session {} has no url", session.id),
            })?;

        let expires_at = session.expires_at();
        let ttl = expires_at
            .and_then(|at| Duration::try_from(at.duration_since(now)).ok())
            .filter(|ttl| ttl.as_secs() > 0)
            .unwrap_or(MAX_SESSION_LIFETIME);
        let short_url = self.shorten(&checkout_url, ttl).await;

        Ok(CheckoutLink {
            session_id: session.id,
            checkout_url,
            short_url,
            expires_at,
        })
    }

    /// Creates a link for the order and texts it to `phone`.
    ///
    /// Returns the link that was sent.
    pub async fn send_payment(
        &self,
        request: &CheckoutRequest,
        phone: &PhoneNumber,
    ) -> Result<CheckoutLink> {
        let sms = self
            .sms
            .as_ref()
            .ok_or(ConfigError::Missing("TWILIO_ACCOUNT_SID"))?;

        let link = self.create_link(request).await?;
        let body = self.message_body(request, link.preferred_url());
        sms.send(phone, &body).await?;

        info!(order_id = %request.order_id, to = %phone, "payment link sent");
        Ok(link)
    }

    /// Text of the payment SMS.
    pub fn message_body(&self, request: &CheckoutRequest, url: &str) -> String {
        let mut lines = Vec::with_capacity(4);
        let headline = format!("Payment link for order #{}", request.order_id);
        if self.config.shop_name.is_empty() {
            lines.push(headline);
        } else {
            lines.push(format!("[{}] {headline}", self.config.shop_name));
        }
        lines.push(format!(
            "Total: {} (tax incl.)",
            format_amount(&self.config.currency, request.amount)
        ));
        lines.push(url.to_string());
        lines.push("This link is valid for 24 hours.".to_string());
        lines.join("\n")
    }

    fn session_request(
        &self,
        request: &CheckoutRequest,
        now: Timestamp,
    ) -> Result<CheckoutSessionRequest> {
        let expires_at = match request.expires_in {
            Some(expires_in) => {
                let capped = expires_in.min(MAX_SESSION_LIFETIME);
                let span =
                    SignedDuration::try_from(capped).map_err(|_| ValidationError::InvalidTtl)?;
                Some(now + span)
            }
            None => None,
        };

        Ok(CheckoutSessionRequest {
            order_id: request.order_id,
            amount: request.amount,
            currency: self.config.currency.clone(),
            product_name: format!("Order #{}", request.order_id),
            success_url: self.return_url("success", request.order_id)?,
            cancel_url: self.return_url("cancel", request.order_id)?,
            expires_at,
        })
    }

    fn return_url(&self, page: &str, order_id: OrderId) -> Result<String> {
        let raw = format!(
            "{}/payment/{page}",
            self.config.app_base_url.trim_end_matches('/')
        );
        let mut url = Url::parse(&raw).map_err(|e| ConfigError::Invalid {
            name: "APP_BASE_URL",
            reason: e.to_string(),
        })?;
        url.query_pairs_mut()
            .append_pair("order", &order_id.to_string());
        Ok(url.into())
    }

    /// Best effort: any failure leaves the caller with the long URL.
    async fn shorten(&self, checkout_url: &str, ttl: Duration) -> Option<String> {
        match self.shortener.issue(checkout_url, ttl).await {
            Ok(IssueOutcome::Issued(link)) => {
                Some(link.token.to_url(&self.config.public_base_url))
            }
            Ok(IssueOutcome::Unavailable) => None,
            Err(err) => {
                warn!(error = %err, code = err.code(), "short link failed, using checkout url");
                None
            }
        }
    }
}

fn format_amount(currency: &str, amount: Amount) -> String {
    match currency {
        "jpy" => format!("¥{amount}"),
        other => format!("{amount} {}", other.to_ascii_uppercase()),
    }
}
