//! [`LinkStore`](paylink_core::LinkStore) backends for short links.

pub mod memory;
pub mod redis;
pub mod upstash;

pub use memory::InMemoryLinkStore;
pub use redis::RedisLinkStore;
pub use upstash::{UpstashConfig, UpstashLinkStore};
