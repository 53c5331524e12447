use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Errors produced anywhere in the payment-link glue.
pub type Result<T> = std::result::Result<T, Error>;

/// External systems the service talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Stripe,
    Twilio,
    WooCommerce,
    KeyValueStore,
}

impl Display for Provider {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Stripe => f.write_str("stripe"),
            Provider::Twilio => f.write_str("twilio"),
            Provider::WooCommerce => f.write_str("woocommerce"),
            Provider::KeyValueStore => f.write_str("kv-store"),
        }
    }
}

/// Malformed caller input. Raised before any external call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("order id is required")]
    MissingOrderId,
    #[error("order id must be a positive integer: '{0}'")]
    InvalidOrderId(String),
    #[error("amount must be a positive integer, got {0}")]
    InvalidAmount(String),
    #[error("phone number must be in E.164 format: '{0}'")]
    InvalidPhoneNumber(String),
    #[error("ttl must be at least one second and stay within the timestamp range")]
    InvalidTtl,
    #[error("invalid short token: {0}")]
    InvalidShortToken(String),
    #[error("invalid checkout session id: '{0}'")]
    InvalidSessionId(String),
}

/// Process configuration is incomplete or inconsistent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// A collaborator API rejected a request or could not be reached.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    #[error("{provider} request failed (status {status:?}, code {code:?}): {message}")]
    Provider {
        provider: Provider,
        status: Option<u16>,
        code: Option<String>,
        message: String,
    },
    /// Twilio trial accounts may only message verified numbers (error 21608).
    #[error("SMS recipient {phone} is not verified for this sender account (code 21608)")]
    UnverifiedRecipient { phone: String },
    #[error("{provider} transport failed: {message}")]
    Transport { provider: Provider, message: String },
    #[error("{provider} returned an unexpected response: {message}")]
    InvalidResponse { provider: Provider, message: String },
}

impl UpstreamError {
    pub fn provider(&self) -> Provider {
        match self {
            UpstreamError::Provider { provider, .. }
            | UpstreamError::Transport { provider, .. }
            | UpstreamError::InvalidResponse { provider, .. } => *provider,
            UpstreamError::UnverifiedRecipient { .. } => Provider::Twilio,
        }
    }
}

/// Requests that would weaken the service if allowed through.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecurityError {
    #[error("redirect target is not an allowed payment URL: '{0}'")]
    UnsafeTarget(String),
    #[error("could not allocate a free short token after {attempts} attempts")]
    TokenCollision { attempts: u32 },
    #[error("webhook signature verification failed: {0}")]
    InvalidSignature(String),
    #[error("missing or invalid API key")]
    InvalidApiKey,
}

/// Failures of the key-value store backing short links.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store backend unavailable: {0}")]
    Unavailable(String),
    #[error("store operation timed out: {0}")]
    Timeout(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("store operation failed: {0}")]
    Operation(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error(transparent)]
    Security(#[from] SecurityError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    /// Stable machine-readable code reported to API clients.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(e) => match e {
                ValidationError::MissingOrderId => "MISSING_ORDER_ID",
                ValidationError::InvalidOrderId(_) => "INVALID_ORDER_ID",
                ValidationError::InvalidAmount(_) => "INVALID_AMOUNT",
                ValidationError::InvalidPhoneNumber(_) => "INVALID_E164_PHONE",
                ValidationError::InvalidTtl => "INVALID_TTL",
                ValidationError::InvalidShortToken(_) => "INVALID_SHORT_TOKEN",
                ValidationError::InvalidSessionId(_) => "INVALID_SESSION_ID",
            },
            Error::Config(_) => "CONFIG_ERROR",
            Error::Upstream(e) => match e {
                UpstreamError::UnverifiedRecipient { .. } => "SMS_RECIPIENT_UNVERIFIED",
                other => match other.provider() {
                    Provider::Stripe => "PAYMENT_PROVIDER_ERROR",
                    Provider::Twilio => "SMS_PROVIDER_ERROR",
                    Provider::WooCommerce => "ORDER_API_ERROR",
                    Provider::KeyValueStore => "STORE_ERROR",
                },
            },
            Error::Security(e) => match e {
                SecurityError::UnsafeTarget(_) => "UNSAFE_TARGET_URL",
                SecurityError::TokenCollision { .. } => "SHORTENER_TOKEN_COLLISION",
                SecurityError::InvalidSignature(_) => "INVALID_SIGNATURE",
                SecurityError::InvalidApiKey => "INVALID_API_KEY",
            },
            Error::Store(_) => "STORE_ERROR",
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_distinguish_unverified_recipient() {
        let unverified: Error = UpstreamError::UnverifiedRecipient {
            phone: "+819012345678".to_string(),
        }
        .into();
        let generic: Error = UpstreamError::Provider {
            provider: Provider::Twilio,
            status: Some(400),
            code: Some("21211".to_string()),
            message: "invalid 'To' number".to_string(),
        }
        .into();

        assert_eq!(unverified.code(), "SMS_RECIPIENT_UNVERIFIED");
        assert_eq!(generic.code(), "SMS_PROVIDER_ERROR");
    }

    #[test]
    fn security_codes() {
        let err: Error = SecurityError::TokenCollision { attempts: 5 }.into();
        assert_eq!(err.code(), "SHORTENER_TOKEN_COLLISION");
        assert_eq!(
            err.to_string(),
            "could not allocate a free short token after 5 attempts"
        );
    }

    #[test]
    fn validation_errors_are_flagged() {
        let err: Error = ValidationError::MissingOrderId.into();
        assert!(err.is_validation());
        assert_eq!(err.code(), "MISSING_ORDER_ID");
    }
}
