use std::time::Duration;

use paylink_core::{InsertOutcome, LinkStore, ShortToken};
use paylink_store::RedisLinkStore;
use paylink_test_infra::redis::RedisServer;
use redis::AsyncCommands;

/// Test fixture that manages a Redis container using test-infra.
struct Fixture {
    redis: RedisServer,
    store: RedisLinkStore,
}

impl Fixture {
    async fn start() -> Self {
        let redis = RedisServer::start()
            .await
            .expect("Failed to start Redis container");
        let url = redis.url().await.expect("Failed to get Redis URL");
        let store = RedisLinkStore::connect(&url)
            .await
            .expect("Failed to connect to Redis");
        Self { redis, store }
    }
}

fn token(s: &str) -> ShortToken {
    ShortToken::new_unchecked(s)
}

const TARGET: &str = "https://checkout.stripe.com/c/pay/cs_test_abc";

#[tokio::test]
async fn insert_then_get() {
    let fixture = Fixture::start().await;

    let outcome = fixture
        .store
        .insert_if_absent(&token("abc1234"), TARGET, Duration::from_secs(3600))
        .await
        .unwrap();
    assert_eq!(outcome, InsertOutcome::Stored);

    let target = fixture.store.get(&token("abc1234")).await.unwrap();
    assert_eq!(target.as_deref(), Some(TARGET));
}

#[tokio::test]
async fn insert_uses_prefixed_key_with_ttl() {
    let fixture = Fixture::start().await;

    fixture
        .store
        .insert_if_absent(&token("ttl1234"), TARGET, Duration::from_secs(600))
        .await
        .unwrap();

    let mut conn = fixture.redis.connection().await.unwrap();
    let raw: Option<String> = conn.get("s:ttl1234").await.unwrap();
    let ttl: i64 = conn.ttl("s:ttl1234").await.unwrap();

    assert_eq!(raw.as_deref(), Some(TARGET));
    assert!(ttl > 0 && ttl <= 600, "unexpected ttl {ttl}");
}

#[tokio::test]
async fn second_insert_reports_existing_and_keeps_value() {
    let fixture = Fixture::start().await;

    fixture
        .store
        .insert_if_absent(&token("dup1234"), TARGET, Duration::from_secs(3600))
        .await
        .unwrap();
    let outcome = fixture
        .store
        .insert_if_absent(
            &token("dup1234"),
            "https://checkout.stripe.com/c/pay/cs_other",
            Duration::from_secs(3600),
        )
        .await
        .unwrap();

    assert_eq!(outcome, InsertOutcome::AlreadyExists);
    let target = fixture.store.get(&token("dup1234")).await.unwrap();
    assert_eq!(target.as_deref(), Some(TARGET));
}

#[tokio::test]
async fn entry_expires_after_ttl() {
    let fixture = Fixture::start().await;

    fixture
        .store
        .insert_if_absent(&token("exp1234"), TARGET, Duration::from_secs(1))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(2100)).await;

    assert!(fixture.store.get(&token("exp1234")).await.unwrap().is_none());
}

#[tokio::test]
async fn get_unknown_returns_none() {
    let fixture = Fixture::start().await;
    assert!(fixture.store.get(&token("missing")).await.unwrap().is_none());
}
