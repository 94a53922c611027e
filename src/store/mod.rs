//! Counter storage backends.

mod memory;
mod redis;

pub use memory::MemoryStore;
pub use redis::RedisStore;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

/// Trait for shared counter storage.
///
/// This trait abstracts over the in-process `MemoryStore` and the networked
/// `RedisStore` to allow the quota logic to work with either. The five
/// operations are the entire surface the quota logic depends on; any store
/// providing them is substitutable.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Get the current count for a key, or `None` if the key has never been
    /// set or has expired.
    async fn get(&self, key: &str) -> Result<Option<i64>>;

    /// Unconditionally set the count for a key.
    async fn set(&self, key: &str, value: i64) -> Result<()>;

    /// Atomically increment the count for a key and return the new count.
    ///
    /// Creates the key with count 1 if it does not exist. Must not lose
    /// updates under concurrent callers for the same key.
    async fn incr(&self, key: &str) -> Result<i64>;

    /// Set or refresh the time-to-live for a key, in seconds.
    async fn expire(&self, key: &str, seconds: i64) -> Result<()>;

    /// Seconds remaining before the key expires.
    ///
    /// Returns `-1` if the key exists but has no expiry, `-2` if the key
    /// does not exist (Redis TTL sentinels).
    async fn ttl(&self, key: &str) -> Result<i64>;
}

/// Shared handle to a counter store, constructed once at startup and passed
/// by reference into the middleware.
pub type SharedStore = Arc<dyn CounterStore>;
