//! Validated inputs for the checkout flows.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// Identifier of an order in the order-management system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(u64);

impl OrderId {
    pub fn new(id: u64) -> Result<Self, ValidationError> {
        if id == 0 {
            return Err(ValidationError::InvalidOrderId(id.to_string()));
        }
        Ok(Self(id))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl FromStr for OrderId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::MissingOrderId);
        }
        let id = trimmed
            .parse::<u64>()
            .map_err(|_| ValidationError::InvalidOrderId(trimmed.to_string()))?;
        Self::new(id)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A strictly positive amount in the smallest unit of the charge currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Amount(u64);

impl Amount {
    pub fn new(minor_units: i64) -> Result<Self, ValidationError> {
        if minor_units <= 0 {
            return Err(ValidationError::InvalidAmount(minor_units.to_string()));
        }
        Ok(Self(minor_units as u64))
    }

    /// Accepts only JSON integers; `59.8`, `"5980"` and `null` are rejected.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, ValidationError> {
        match value.as_i64() {
            Some(minor_units) => Self::new(minor_units),
            None => Err(ValidationError::InvalidAmount(value.to_string())),
        }
    }

    pub fn minor_units(&self) -> u64 {
        self.0
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A phone number in E.164 form: `+` followed by 8 to 15 digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PhoneNumber(String);

const PHONE_MIN_DIGITS: usize = 8;
const PHONE_MAX_DIGITS: usize = 15;

impl PhoneNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for PhoneNumber {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(digits) = s.strip_prefix('+') else {
            return Err(ValidationError::InvalidPhoneNumber(s.to_string()));
        };
        if digits.len() < PHONE_MIN_DIGITS
            || digits.len() > PHONE_MAX_DIGITS
            || !digits.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(ValidationError::InvalidPhoneNumber(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl Display for PhoneNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Idempotency key for checkout-session creation.
///
/// Derived from order id and amount: repeating a request for the same order
/// and total reuses the provider-side session, while a changed total creates
/// a new one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn for_order(order_id: OrderId, amount: Amount) -> Self {
        Self(format!("order-{}-{}", order_id, amount))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for IdempotencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
