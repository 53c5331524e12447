pub mod random;

use paylink_core::ShortToken;

/// Trait for generating short tokens.
///
/// Implementations are pure generators that don't interact with storage;
/// uniqueness among live links is enforced by the store's conditional write.
pub trait TokenGenerator: Send + Sync + 'static {
    /// Draws a fresh candidate token.
    fn generate(&self) -> ShortToken;
}
