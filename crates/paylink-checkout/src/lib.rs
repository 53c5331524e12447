//! Provider clients and the checkout flows built on them.
//!
//! - [`stripe`]: checkout sessions and webhook signatures
//! - [`sms`]: Twilio message delivery
//! - [`orders`]: WooCommerce order lookups and status updates
//! - [`links`]: create, shorten and send checkout links
//! - [`reconcile`]: apply payment webhooks to orders

pub mod http;
pub mod links;
pub mod orders;
pub mod reconcile;
pub mod sms;
pub mod stripe;

pub use http::{build_client, DEFAULT_TIMEOUT};
pub use links::{CheckoutLink, CheckoutLinks, CheckoutLinksConfig, CheckoutRequest};
pub use orders::{Order, OrderApi, WooCommerceClient, WooCommerceConfig};
pub use reconcile::{ReconcileOutcome, WebhookProcessor};
pub use sms::{SenderIdentity, SmsReceipt, SmsSender, TwilioClient, TwilioConfig};
pub use stripe::webhook::{WebhookEvent, WebhookEventKind, WebhookVerifier};
pub use stripe::{
    validate_session_id, CheckoutSession, CheckoutSessionRequest, PaymentProvider, StripeClient,
    StripeConfig,
};
