//! Core types and traits for the Paylink payment-link service.
//!
//! This crate provides the types shared by the short-link service, the
//! checkout glue and the HTTP gateway.

pub mod error;
pub mod link;
pub mod order;
pub mod token;

pub use error::{
    ConfigError, Error, Provider, Result, SecurityError, StoreError, UpstreamError,
    ValidationError,
};
pub use link::{InsertOutcome, LinkStore, ShortLink};
pub use order::{Amount, IdempotencyKey, OrderId, PhoneNumber};
pub use token::ShortToken;
