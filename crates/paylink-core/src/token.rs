use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// A validated short-link token.
///
/// Tokens must be 3-32 characters long and use only the URL-safe base64
/// alphabet (`[A-Za-z0-9_-]`), so they can be embedded in a path segment
/// without escaping.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShortToken(String);

const MIN_LENGTH: usize = 3;
const MAX_LENGTH: usize = 32;

impl ShortToken {
    /// Creates a new `ShortToken` after validating the input.
    pub fn new(token: impl Into<String>) -> Result<Self, ValidationError> {
        let token = token.into();
        Self::validate(&token)?;
        Ok(Self(token))
    }

    /// Creates a `ShortToken` without validation.
    ///
    /// Use this only for tokens produced by trusted internal sources
    /// (e.g. generators that are guaranteed to produce valid output).
    pub fn new_unchecked(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Builds the public short URL, e.g. `https://pay.example.com/p/{token}`.
    pub fn to_url(&self, base_url: &str) -> String {
        format!("{}/p/{}", base_url.trim_end_matches('/'), self.0)
    }

    /// Key under which the token is kept in a key-value store.
    pub fn store_key(&self, prefix: &str) -> String {
        format!("{prefix}{}", self.0)
    }

    /// Returns the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(token: &str) -> Result<(), ValidationError> {
        if token.len() < MIN_LENGTH || token.len() > MAX_LENGTH {
            return Err(ValidationError::InvalidShortToken(format!(
                "length must be between {} and {}, got {}",
                MIN_LENGTH,
                MAX_LENGTH,
                token.len()
            )));
        }

        if !token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ValidationError::InvalidShortToken(format!(
                "must contain only URL-safe base64 characters: '{}'",
                token
            )));
        }

        Ok(())
    }
}

impl TryFrom<String> for ShortToken {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ShortToken> for String {
    fn from(value: ShortToken) -> Self {
        value.0
    }
}

impl Display for ShortToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
