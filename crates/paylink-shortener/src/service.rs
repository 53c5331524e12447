use crate::generator::random::RandomTokenGenerator;
use crate::generator::TokenGenerator;
use crate::policy::TargetPolicy;
use jiff::{SignedDuration, Timestamp};
use paylink_core::{
    InsertOutcome, LinkStore, Result, SecurityError, ShortLink, ShortToken, ValidationError,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Maximum number of tokens drawn for one `issue` call.
pub const MAX_ISSUE_ATTEMPTS: u32 = 5;

/// Result of [`ShortLinkService::issue`].
#[derive(Debug, Clone, PartialEq)]
pub enum IssueOutcome {
    /// The link was stored under a fresh token.
    Issued(ShortLink),
    /// No store is configured; callers should hand out the long URL instead.
    Unavailable,
}

impl IssueOutcome {
    pub fn into_link(self) -> Option<ShortLink> {
        match self {
            IssueOutcome::Issued(link) => Some(link),
            IssueOutcome::Unavailable => None,
        }
    }
}

/// Issues and resolves short links for checkout URLs.
///
/// This service wraps an optional [`LinkStore`] and a [`TokenGenerator`] and
/// handles:
/// - target allow-listing
/// - collision retry on the store's set-if-absent
/// - the "no store configured" fallback
pub struct ShortLinkService<G = RandomTokenGenerator> {
    store: Option<Arc<dyn LinkStore>>,
    generator: Arc<G>,
    policy: TargetPolicy,
}

impl<G> Clone for ShortLinkService<G> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            generator: Arc::clone(&self.generator),
            policy: self.policy.clone(),
        }
    }
}

impl ShortLinkService<RandomTokenGenerator> {
    /// Creates a service with the default 7-character random generator and
    /// the Stripe host allow-list.
    pub fn new(store: Option<Arc<dyn LinkStore>>) -> Self {
        Self::with_generator(store, RandomTokenGenerator::default(), TargetPolicy::default())
    }

    /// A service without a backing store: `issue` always reports `Unavailable`.
    pub fn disabled() -> Self {
        Self::new(None)
    }
}

impl<G: TokenGenerator> ShortLinkService<G> {
    /// Creates a service with a custom generator and target policy.
    pub fn with_generator(
        store: Option<Arc<dyn LinkStore>>,
        generator: G,
        policy: TargetPolicy,
    ) -> Self {
        Self {
            store,
            generator: Arc::new(generator),
            policy,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub fn policy(&self) -> &TargetPolicy {
        &self.policy
    }

    /// Stores `target` under a new random token for `ttl`.
    ///
    /// The allow-list is checked before anything else, so an unsafe target
    /// never reaches the store even when short links are disabled.
    pub async fn issue(&self, target: &str, ttl: Duration) -> Result<IssueOutcome> {
        if !self.policy.is_allowed(target) {
            warn!(target = %target, "refusing to shorten untrusted target");
            return Err(SecurityError::UnsafeTarget(target.to_owned()).into());
        }
        if ttl.as_secs() == 0 {
            return Err(ValidationError::InvalidTtl.into());
        }
        let expires_at = SignedDuration::try_from(ttl)
            .ok()
            .and_then(|ttl| Timestamp::now().checked_add(ttl).ok())
            .ok_or(ValidationError::InvalidTtl)?;

        let Some(store) = &self.store else {
            debug!("no link store configured, short link unavailable");
            return Ok(IssueOutcome::Unavailable);
        };

        for attempt in 1..=MAX_ISSUE_ATTEMPTS {
            let token = self.generator.generate();
            trace!(token = %token, attempt, "trying short token");

            match store.insert_if_absent(&token, target, ttl).await? {
                InsertOutcome::Stored => {
                    info!(token = %token, ttl_secs = ttl.as_secs(), "issued short link");
                    return Ok(IssueOutcome::Issued(ShortLink {
                        token,
                        target: target.to_owned(),
                        expires_at,
                    }));
                }
                InsertOutcome::AlreadyExists => {
                    debug!(token = %token, attempt, "short token collision, retrying");
                }
            }
        }

        warn!(attempts = MAX_ISSUE_ATTEMPTS, "short token space exhausted");
        Err(SecurityError::TokenCollision {
            attempts: MAX_ISSUE_ATTEMPTS,
        }
        .into())
    }

    /// Looks up the target for `token`.
    ///
    /// Returns `Ok(None)` if the token is unknown, expired, or no store is
    /// configured.
    pub async fn resolve(&self, token: &ShortToken) -> Result<Option<String>> {
        let Some(store) = &self.store else {
            return Ok(None);
        };

        trace!(token = %token, "resolving short token");
        let target = store.get(token).await?;
        match &target {
            Some(url) => debug!(token = %token, target = %url, "resolved short token"),
            None => trace!(token = %token, "short token not found"),
        }
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use paylink_core::{Error, StoreError};
    use paylink_store::InMemoryLinkStore;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    const TARGET: &str = "https://checkout.stripe.com/c/pay/cs_test_abc";
    const HOUR: Duration = Duration::from_secs(3600);

    fn memory_service() -> (ShortLinkService, Arc<InMemoryLinkStore>) {
        let store = Arc::new(InMemoryLinkStore::new());
        let service = ShortLinkService::new(Some(store.clone() as Arc<dyn LinkStore>));
        (service, store)
    }

    /// A store that counts calls and answers with a fixed outcome.
    #[derive(Default)]
    struct CountingStore {
        inserts: AtomicUsize,
        collide: bool,
    }

    #[async_trait]
    impl LinkStore for CountingStore {
        async fn insert_if_absent(
            &self,
            _token: &ShortToken,
            _target: &str,
            _ttl: Duration,
        ) -> std::result::Result<InsertOutcome, StoreError> {
            self.inserts.fetch_add(1, Ordering::SeqCst);
            if self.collide {
                Ok(InsertOutcome::AlreadyExists)
            } else {
                Ok(InsertOutcome::Stored)
            }
        }

        async fn get(
            &self,
            _token: &ShortToken,
        ) -> std::result::Result<Option<String>, StoreError> {
            Ok(None)
        }
    }

    struct FailingStore;

    #[async_trait]
    impl LinkStore for FailingStore {
        async fn insert_if_absent(
            &self,
            _token: &ShortToken,
            _target: &str,
            _ttl: Duration,
        ) -> std::result::Result<InsertOutcome, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn get(
            &self,
            _token: &ShortToken,
        ) -> std::result::Result<Option<String>, StoreError> {
            Err(StoreError::Timeout("read timed out".to_string()))
        }
    }

    /// Hands out "tok0000", "tok0001", ... so collisions can be staged.
    struct SequenceGenerator(AtomicU32);

    impl TokenGenerator for SequenceGenerator {
        fn generate(&self) -> ShortToken {
            let n = self.0.fetch_add(1, Ordering::SeqCst);
            ShortToken::new_unchecked(format!("tok{n:04}"))
        }
    }

    #[tokio::test]
    async fn issue_then_resolve_returns_target() {
        let (service, _) = memory_service();

        let link = service.issue(TARGET, HOUR).await.unwrap().into_link().unwrap();
        assert_eq!(link.token.as_str().len(), 7);
        assert_eq!(link.target, TARGET);
        assert!(link.expires_at > Timestamp::now());

        let resolved = service.resolve(&link.token).await.unwrap();
        assert_eq!(resolved.as_deref(), Some(TARGET));
    }

    #[tokio::test]
    async fn unsafe_target_is_rejected_without_store_write() {
        let store = Arc::new(CountingStore::default());
        let service = ShortLinkService::new(Some(store.clone() as Arc<dyn LinkStore>));

        let err = service
            .issue("https://evil.example.com/phish", HOUR)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Security(SecurityError::UnsafeTarget(_))));
        assert_eq!(store.inserts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unsafe_target_is_rejected_even_without_store() {
        let service = ShortLinkService::disabled();
        let err = service
            .issue("https://evil.example.com/phish", HOUR)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "UNSAFE_TARGET_URL");
    }

    #[tokio::test]
    async fn persistent_collisions_fail_after_five_attempts() {
        let store = Arc::new(CountingStore {
            collide: true,
            ..Default::default()
        });
        let service = ShortLinkService::new(Some(store.clone() as Arc<dyn LinkStore>));

        let err = service.issue(TARGET, HOUR).await.unwrap_err();

        assert!(matches!(
            err,
            Error::Security(SecurityError::TokenCollision { attempts: 5 })
        ));
        assert_eq!(store.inserts.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn collision_retries_with_a_new_token() {
        let store = Arc::new(InMemoryLinkStore::new());
        store
            .insert_if_absent(
                &ShortToken::new_unchecked("tok0000"),
                "https://checkout.stripe.com/c/pay/old",
                HOUR,
            )
            .await
            .unwrap();
        let service = ShortLinkService::with_generator(
            Some(store.clone() as Arc<dyn LinkStore>),
            SequenceGenerator(AtomicU32::new(0)),
            TargetPolicy::default(),
        );

        let link = service.issue(TARGET, HOUR).await.unwrap().into_link().unwrap();

        assert_eq!(link.token.as_str(), "tok0001");
        let old = service.resolve(&ShortToken::new_unchecked("tok0000")).await.unwrap();
        assert_eq!(old.as_deref(), Some("https://checkout.stripe.com/c/pay/old"));
    }

    #[tokio::test]
    async fn no_store_means_unavailable() {
        let service = ShortLinkService::disabled();

        assert!(!service.is_enabled());
        assert_eq!(service.issue(TARGET, HOUR).await.unwrap(), IssueOutcome::Unavailable);
        assert!(service
            .resolve(&ShortToken::new_unchecked("abc1234"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn zero_ttl_is_invalid() {
        let (service, store) = memory_service();
        let err = service.issue(TARGET, Duration::from_millis(500)).await.unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::InvalidTtl)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn ttl_past_the_timestamp_range_is_invalid() {
        let (service, store) = memory_service();
        for secs in [400_000_000_000, u64::MAX] {
            let err = service
                .issue(TARGET, Duration::from_secs(secs))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Validation(ValidationError::InvalidTtl)));
        }
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn store_failures_propagate() {
        let service = ShortLinkService::new(Some(Arc::new(FailingStore) as Arc<dyn LinkStore>));

        let err = service.issue(TARGET, HOUR).await.unwrap_err();
        assert!(matches!(err, Error::Store(StoreError::Unavailable(_))));

        let err = service
            .resolve(&ShortToken::new_unchecked("abc1234"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Store(StoreError::Timeout(_))));
    }

    #[tokio::test]
    async fn resolve_unknown_token_is_none() {
        let (service, _) = memory_service();
        let resolved = service
            .resolve(&ShortToken::new_unchecked("missing"))
            .await
            .unwrap();
        assert!(resolved.is_none());
    }
}
