//! Short-link service for checkout URLs.
//!
//! Issues collision-safe, time-limited tokens for provider-hosted checkout
//! pages and resolves them back. Storage backends live in `paylink_store`;
//! shared types come from `paylink_core`.

pub mod generator;
pub mod policy;
pub mod service;

pub use generator::random::RandomTokenGenerator;
pub use generator::TokenGenerator;
pub use policy::TargetPolicy;
pub use service::{IssueOutcome, ShortLinkService, MAX_ISSUE_ATTEMPTS};
