use crate::error::StoreError;
use crate::token::ShortToken;
use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// An issued short link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortLink {
    /// The opaque token clients use in `/p/{token}`.
    pub token: ShortToken,
    /// The checkout URL the token redirects to.
    pub target: String,
    /// After this instant the backing store no longer resolves the token.
    pub expires_at: Timestamp,
}

/// Result of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The key was absent and now holds the new value.
    Stored,
    /// A live entry already owns the key; nothing was written.
    AlreadyExists,
}

/// Key-value storage for short-link mappings.
///
/// Implementations are responsible for expiring entries once their ttl has
/// elapsed; callers never delete links explicitly.
#[async_trait]
pub trait LinkStore: Send + Sync + 'static {
    /// Stores `token -> target` for `ttl` only if no live entry exists for `token`.
    ///
    /// Must be atomic with respect to concurrent callers: two writers racing
    /// on the same token must see exactly one `Stored`.
    async fn insert_if_absent(
        &self,
        token: &ShortToken,
        target: &str,
        ttl: Duration,
    ) -> Result<InsertOutcome, StoreError>;

    /// Returns the target for `token`, or `None` if it is unknown or expired.
    async fn get(&self, token: &ShortToken) -> Result<Option<String>, StoreError>;
}
