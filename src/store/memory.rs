//! In-process counter store.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::CounterStore;
use crate::error::Result;

/// A counter entry with an optional expiry deadline.
#[derive(Debug, Clone, Copy)]
struct CounterEntry {
    count: i64,
    expires_at: Option<Instant>,
}

impl CounterEntry {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(deadline) if deadline <= now)
    }
}

/// An in-process counter store backed by a concurrent map.
///
/// Expiry is enforced lazily: any operation that observes an expired entry
/// removes it before proceeding, so an expired key behaves exactly like one
/// that was never set. Per-key atomicity comes from the map's entry locking.
///
/// Counters in this store are local to the process; multi-instance
/// deployments share quota state through [`RedisStore`](super::RedisStore)
/// instead.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, CounterEntry>,
}

impl MemoryStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop an entry if its deadline has passed.
    fn evict_if_expired(&self, key: &str, now: Instant) {
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<i64>> {
        let now = Instant::now();
        self.evict_if_expired(key, now);
        Ok(self.entries.get(key).map(|entry| entry.count))
    }

    async fn set(&self, key: &str, value: i64) -> Result<()> {
        // As in Redis, a plain SET discards any existing expiry.
        self.entries.insert(
            key.to_string(),
            CounterEntry {
                count: value,
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        let now = Instant::now();
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert(CounterEntry {
                count: 0,
                expires_at: None,
            });
        if entry.is_expired(now) {
            *entry = CounterEntry {
                count: 0,
                expires_at: None,
            };
        }
        entry.count += 1;
        Ok(entry.count)
    }

    async fn expire(&self, key: &str, seconds: i64) -> Result<()> {
        let now = Instant::now();
        self.evict_if_expired(key, now);
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.expires_at = Some(now + Duration::from_secs(seconds.max(0) as u64));
        }
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<i64> {
        let now = Instant::now();
        self.evict_if_expired(key, now);
        match self.entries.get(key) {
            None => Ok(-2),
            Some(entry) => match entry.expires_at {
                None => Ok(-1),
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(now);
                    Ok(remaining.as_secs_f64().ceil() as i64)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_missing_key() {
        let store = MemoryStore::new();
        assert_eq!(store.get("nope").await.unwrap(), None);
        assert_eq!(store.ttl("nope").await.unwrap(), -2);
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let store = MemoryStore::new();
        store.set("k", 0).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(0));
        assert_eq!(store.ttl("k").await.unwrap(), -1);
    }

    #[tokio::test]
    async fn test_incr_creates_and_advances() {
        let store = MemoryStore::new();
        assert_eq!(store.incr("k").await.unwrap(), 1);
        assert_eq!(store.incr("k").await.unwrap(), 2);
        assert_eq!(store.get("k").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_expire_sets_ttl() {
        let store = MemoryStore::new();
        store.set("k", 0).await.unwrap();
        store.expire("k", 3600).await.unwrap();
        let ttl = store.ttl("k").await.unwrap();
        assert!(ttl > 3590 && ttl <= 3600, "ttl was {ttl}");
    }

    #[tokio::test]
    async fn test_expired_entry_reads_as_absent() {
        let store = MemoryStore::new();
        store.set("k", 5).await.unwrap();
        store.expire("k", 0).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
        assert_eq!(store.ttl("k").await.unwrap(), -2);
    }

    #[tokio::test]
    async fn test_incr_after_expiry_restarts_at_one() {
        let store = MemoryStore::new();
        store.set("k", 99).await.unwrap();
        store.expire("k", 0).await.unwrap();
        assert_eq!(store.incr("k").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_set_clears_expiry() {
        let store = MemoryStore::new();
        store.set("k", 1).await.unwrap();
        store.expire("k", 3600).await.unwrap();
        store.set("k", 1).await.unwrap();
        assert_eq!(store.ttl("k").await.unwrap(), -1);
    }

    #[tokio::test]
    async fn test_concurrent_incr_loses_no_updates() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..100 {
                    store.incr("shared").await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.get("shared").await.unwrap(), Some(800));
    }
}
