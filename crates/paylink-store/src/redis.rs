use async_trait::async_trait;
use paylink_core::{InsertOutcome, LinkStore, ShortToken, StoreError};
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Default key prefix for short-link entries.
pub const DEFAULT_KEY_PREFIX: &str = "s:";

/// A Redis-backed [`LinkStore`].
///
/// Entries are plain strings written with `SET key value NX EX ttl`, so
/// expiry is enforced by Redis and concurrent issuers can never overwrite
/// each other.
#[derive(Clone)]
pub struct RedisLinkStore {
    conn: redis::aio::MultiplexedConnection,
    key_prefix: String,
}

fn map_redis_error(operation: &str, err: redis::RedisError) -> StoreError {
    let message = format!("{operation}: {err}");
    if err.is_timeout() {
        StoreError::Timeout(message)
    } else if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
        StoreError::Unavailable(message)
    } else {
        StoreError::Operation(message)
    }
}

impl RedisLinkStore {
    /// Creates a new Redis link store using the default `s:` key prefix.
    pub fn new(conn: redis::aio::MultiplexedConnection) -> Self {
        Self::with_prefix(conn, DEFAULT_KEY_PREFIX)
    }

    /// Creates a new Redis link store with a custom key prefix.
    pub fn with_prefix(
        conn: redis::aio::MultiplexedConnection,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            conn,
            key_prefix: key_prefix.into(),
        }
    }

    /// Opens a multiplexed connection to `redis_url`.
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| map_redis_error("failed to parse Redis URL", e))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| map_redis_error("failed to connect to Redis", e))?;
        Ok(Self::new(conn))
    }
}

#[async_trait]
impl LinkStore for RedisLinkStore {
    async fn insert_if_absent(
        &self,
        token: &ShortToken,
        target: &str,
        ttl: Duration,
    ) -> Result<InsertOutcome, StoreError> {
        let key = token.store_key(&self.key_prefix);
        trace!(token = %token, ttl_secs = ttl.as_secs(), "Storing short link in Redis");

        let mut conn = self.conn.clone();
        // SET ... NX replies OK on write and nil when the key already exists.
        let reply: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(target)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs())
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                warn!(token = %token, error = %e, "Redis error on SET NX");
                map_redis_error("failed to write value to Redis", e)
            })?;

        match reply {
            Some(_) => {
                debug!(token = %token, "Stored short link in Redis");
                Ok(InsertOutcome::Stored)
            }
            None => {
                debug!(token = %token, "Short token already present in Redis");
                Ok(InsertOutcome::AlreadyExists)
            }
        }
    }

    async fn get(&self, token: &ShortToken) -> Result<Option<String>, StoreError> {
        let key = token.store_key(&self.key_prefix);
        trace!(token = %token, "Fetching short link from Redis");

        let mut conn = self.conn.clone();
        match conn.get::<_, Option<String>>(&key).await {
            Ok(Some(target)) => {
                debug!(token = %token, "Short link hit in Redis");
                Ok(Some(target))
            }
            Ok(None) => {
                trace!(token = %token, "Short link miss in Redis");
                Ok(None)
            }
            Err(e) => {
                warn!(token = %token, error = %e, "Redis error on get");
                Err(map_redis_error("failed to fetch value from Redis", e))
            }
        }
    }
}
