//! Stripe webhook signature verification and event decoding.
//!
//! Stripe signs `"{timestamp}.{raw body}"` with HMAC-SHA256 and sends the
//! result in the `Stripe-Signature` header as `t=<unix>,v1=<hex>[,v1=<hex>]`.
//! The body must be verified byte-for-byte before it is parsed.

use crate::stripe::CheckoutSession;
use hmac::{Hmac, Mac};
use jiff::Timestamp;
use paylink_core::{Provider, Result, SecurityError, UpstreamError};
use serde::Deserialize;
use sha2::Sha256;
use std::time::Duration;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Name of the header carrying the signature.
pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

/// Default tolerance between the signed timestamp and now.
pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(300);

pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";
pub const CHECKOUT_SESSION_EXPIRED: &str = "checkout.session.expired";

/// A verified webhook event.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookEvent {
    pub id: String,
    pub kind: WebhookEventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEventKind {
    CheckoutSessionCompleted(CheckoutSession),
    CheckoutSessionExpired(CheckoutSession),
    /// Any event type the service does not act on.
    Other(String),
}

impl WebhookEvent {
    pub fn event_type(&self) -> &str {
        match &self.kind {
            WebhookEventKind::CheckoutSessionCompleted(_) => CHECKOUT_SESSION_COMPLETED,
            WebhookEventKind::CheckoutSessionExpired(_) => CHECKOUT_SESSION_EXPIRED,
            WebhookEventKind::Other(kind) => kind,
        }
    }
}

#[derive(Deserialize)]
struct RawEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: RawEventData,
}

#[derive(Deserialize)]
struct RawEventData {
    object: serde_json::Value,
}

/// Verifies signatures with the endpoint's signing secret (`whsec_...`).
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance: Duration,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("secret", &"<redacted>")
            .field("tolerance", &self.tolerance)
            .finish()
    }
}

struct SignatureHeader<'a> {
    timestamp: i64,
    signatures: Vec<&'a str>,
}

fn parse_header(header: &str) -> std::result::Result<SignatureHeader<'_>, SecurityError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        SecurityError::InvalidSignature("unable to extract timestamp from header".to_string())
    })?;
    if signatures.is_empty() {
        return Err(SecurityError::InvalidSignature(
            "no v1 signatures found in header".to_string(),
        ));
    }

    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self::with_tolerance(secret, DEFAULT_TOLERANCE)
    }

    pub fn with_tolerance(secret: impl Into<String>, tolerance: Duration) -> Self {
        Self {
            secret: secret.into(),
            tolerance,
        }
    }

    /// Checks `header` against `payload` at the current time.
    pub fn verify(
        &self,
        payload: &[u8],
        header: Option<&str>,
    ) -> std::result::Result<(), SecurityError> {
        self.verify_at(payload, header, Timestamp::now())
    }

    pub fn verify_at(
        &self,
        payload: &[u8],
        header: Option<&str>,
        now: Timestamp,
    ) -> std::result::Result<(), SecurityError> {
        let header = header.ok_or_else(|| {
            SecurityError::InvalidSignature(format!("missing {SIGNATURE_HEADER} header"))
        })?;
        let parsed = parse_header(header)?;

        let mac = self.mac_for(parsed.timestamp, payload)?;
        let matched = parsed.signatures.iter().any(|candidate| {
            hex::decode(candidate)
                .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
                .unwrap_or(false)
        });
        if !matched {
            return Err(SecurityError::InvalidSignature(
                "no signature matches the expected value for the payload".to_string(),
            ));
        }

        let age = now.as_second() - parsed.timestamp;
        if age > self.tolerance.as_secs() as i64 {
            return Err(SecurityError::InvalidSignature(format!(
                "timestamp outside the tolerance zone ({age}s old)"
            )));
        }

        Ok(())
    }

    /// Computes the header value Stripe would send for `payload` at `timestamp`.
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> String {
        let signature = self
            .mac_for(timestamp, payload)
            .map(|mac| hex::encode(mac.finalize().into_bytes()))
            .unwrap_or_default();
        format!("t={timestamp},v1={signature}")
    }

    /// Verifies the payload, then decodes it into a [`WebhookEvent`].
    pub fn construct_event(&self, payload: &[u8], header: Option<&str>) -> Result<WebhookEvent> {
        self.verify(payload, header)?;
        let event = parse_event(payload)?;
        debug!(event_id = %event.id, event_type = %event.event_type(), "verified webhook event");
        Ok(event)
    }

    fn mac_for(
        &self,
        timestamp: i64,
        payload: &[u8],
    ) -> std::result::Result<HmacSha256, SecurityError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| SecurityError::InvalidSignature(format!("unusable signing secret: {e}")))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac)
    }
}

fn malformed(message: String) -> UpstreamError {
    UpstreamError::InvalidResponse {
        provider: Provider::Stripe,
        message,
    }
}

/// Decodes an already verified payload.
pub fn parse_event(payload: &[u8]) -> Result<WebhookEvent> {
    let raw: RawEvent = serde_json::from_slice(payload)
        .map_err(|e| malformed(format!("malformed webhook payload: {e}")))?;

    let kind = match raw.event_type.as_str() {
        CHECKOUT_SESSION_COMPLETED | CHECKOUT_SESSION_EXPIRED => {
            let session: CheckoutSession = serde_json::from_value(raw.data.object)
                .map_err(|e| malformed(format!("malformed checkout session in webhook: {e}")))?;
            if raw.event_type == CHECKOUT_SESSION_COMPLETED {
                WebhookEventKind::CheckoutSessionCompleted(session)
            } else {
                WebhookEventKind::CheckoutSessionExpired(session)
            }
        }
        _ => WebhookEventKind::Other(raw.event_type),
    };

    Ok(WebhookEvent { id: raw.id, kind })
}

#[cfg(test)]
mod tests {
    use super::*;
    use paylink_core::Error;
    use serde_json::json;

    const SECRET: &str = "whsec_test_secret";

    fn completed_payload() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_test_abc",
                "client_reference_id": "1001",
                "mode": "payment",
                "payment_status": "paid",
                "status": "complete"
            }}
        }))
        .unwrap()
    }

    #[test]
    fn valid_signature_verifies() {
        let verifier = WebhookVerifier::new(SECRET);
        let payload = completed_payload();
        let now = Timestamp::now();
        let header = verifier.sign(&payload, now.as_second());

        verifier.verify_at(&payload, Some(&header), now).unwrap();
    }

    #[test]
    fn any_matching_v1_is_accepted() {
        let verifier = WebhookVerifier::new(SECRET);
        let payload = completed_payload();
        let now = Timestamp::now();
        let good = verifier.sign(&payload, now.as_second());
        let good_sig = good.split_once(",v1=").unwrap().1;
        let header = format!("t={},v1={},v1={}", now.as_second(), "00".repeat(32), good_sig);

        verifier.verify_at(&payload, Some(&header), now).unwrap();
    }

    #[test]
    fn wrong_secret_fails() {
        let payload = completed_payload();
        let now = Timestamp::now();
        let header = WebhookVerifier::new("whsec_other").sign(&payload, now.as_second());

        let err = WebhookVerifier::new(SECRET)
            .verify_at(&payload, Some(&header), now)
            .unwrap_err();
        assert!(matches!(err, SecurityError::InvalidSignature(_)));
    }

    #[test]
    fn modified_payload_fails() {
        let verifier = WebhookVerifier::new(SECRET);
        let now = Timestamp::now();
        let header = verifier.sign(&completed_payload(), now.as_second());

        let tampered = completed_payload()
            .into_iter()
            .map(|b| if b == b'1' { b'2' } else { b })
            .collect::<Vec<_>>();
        assert!(verifier.verify_at(&tampered, Some(&header), now).is_err());
    }

    #[test]
    fn stale_timestamp_fails() {
        let verifier = WebhookVerifier::new(SECRET);
        let payload = completed_payload();
        let now = Timestamp::now();
        let header = verifier.sign(&payload, now.as_second() - 600);

        let err = verifier.verify_at(&payload, Some(&header), now).unwrap_err();
        assert!(err.to_string().contains("tolerance"));
    }

    #[test]
    fn missing_or_garbled_header_fails() {
        let verifier = WebhookVerifier::new(SECRET);
        let payload = completed_payload();

        assert!(verifier.verify(&payload, None).is_err());
        assert!(verifier.verify(&payload, Some("")).is_err());
        assert!(verifier.verify(&payload, Some("t=abc,v1=deadbeef")).is_err());
        assert!(verifier.verify(&payload, Some("t=1700000000")).is_err());
        assert!(verifier.verify(&payload, Some("t=1700000000,v1=not-hex")).is_err());
    }

    #[test]
    fn construct_event_parses_completed_session() {
        let verifier = WebhookVerifier::new(SECRET);
        let payload = completed_payload();
        let header = verifier.sign(&payload, Timestamp::now().as_second());

        let event = verifier.construct_event(&payload, Some(&header)).unwrap();

        assert_eq!(event.id, "evt_1");
        assert_eq!(event.event_type(), CHECKOUT_SESSION_COMPLETED);
        match event.kind {
            WebhookEventKind::CheckoutSessionCompleted(session) => {
                assert_eq!(session.id, "cs_test_abc");
                assert_eq!(session.payment_status.as_deref(), Some("paid"));
            }
            other => panic!("unexpected event kind: {other:?}"),
        }
    }

    #[test]
    fn construct_event_checks_signature_before_parsing() {
        let verifier = WebhookVerifier::new(SECRET);
        let err = verifier
            .construct_event(b"not json", Some("t=1,v1=00"))
            .unwrap_err();
        assert!(matches!(err, Error::Security(SecurityError::InvalidSignature(_))));
    }

    #[test]
    fn unknown_event_types_are_kept_as_other() {
        let payload = serde_json::to_vec(&json!({
            "id": "evt_2",
            "type": "payment_intent.created",
            "data": { "object": { "id": "pi_1" } }
        }))
        .unwrap();

        let event = parse_event(&payload).unwrap();
        assert_eq!(event.kind, WebhookEventKind::Other("payment_intent.created".to_string()));
    }

    #[test]
    fn malformed_payload_is_invalid_response() {
        let err = parse_event(b"{\"id\":1}").unwrap_err();
        assert_eq!(err.code(), "PAYMENT_PROVIDER_ERROR");
    }
}
