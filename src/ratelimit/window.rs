//! Fixed-window counter implementation.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{Result, TurnstileError};
use crate::http::Headers;
use crate::store::SharedStore;

/// Response header carrying the configured ceiling.
pub const HEADER_LIMIT: &str = "X-Rate-Limit-Limit";
/// Response header carrying the remaining quota (signed, unclamped).
pub const HEADER_REMAINING: &str = "X-Rate-Limit-Remaining";
/// Response header carrying the window reset time as absolute epoch seconds.
pub const HEADER_RESET: &str = "X-Rate-Limit-Reset";

/// Prefix applied to client keys before they reach the store.
const KEY_PREFIX: &str = "count:";

/// Rejection body returned alongside a 429.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitExceededMessage {
    pub message: String,
}

/// A per-request view of one key's quota usage in the current window.
///
/// Recording a counter is itself the accounting side effect: if the key has
/// no counter yet, one is created at zero with the window's TTL, and the
/// count is then atomically advanced by one for this request. All reads
/// afterwards re-derive from current store state; nothing is cached across
/// requests and nothing is ever incremented twice.
pub struct WindowCounter {
    store: SharedStore,
    key: String,
    max_requests: i64,
}

impl WindowCounter {
    /// Record one request against `key` and return a handle for deriving the
    /// admit/reject decision and accounting headers.
    ///
    /// Initialization and increment are two separate store round-trips. Two
    /// concurrent first requests for a brand-new key may both observe the key
    /// as absent and both initialize it, so one in-flight increment can be
    /// clobbered by the other caller's `set(key, 0)`. The worst case is a
    /// small undercount in that narrow startup window, never an overcount.
    pub async fn record(
        store: SharedStore,
        key: &str,
        max_requests: i64,
        window_secs: i64,
    ) -> Result<Self> {
        if key.is_empty() {
            return Err(TurnstileError::Config(
                "rate limit key must not be empty".to_string(),
            ));
        }

        let counter = Self {
            store,
            key: format!("{KEY_PREFIX}{key}"),
            max_requests,
        };

        if counter.store.get(&counter.key).await?.is_none() {
            debug!(key = %counter.key, window_secs, "Starting new quota window");
            counter.store.set(&counter.key, 0).await?;
            counter.store.expire(&counter.key, window_secs).await?;
        }

        let count = counter.store.incr(&counter.key).await?;
        trace!(key = %counter.key, count, "Recorded request");

        Ok(counter)
    }

    /// Whether the key has used up its quota for the current window.
    pub async fn reached(&self) -> Result<bool> {
        Ok(self.count().await? >= self.max_requests)
    }

    /// The three accounting headers reflecting current store state.
    ///
    /// `X-Rate-Limit-Remaining` is intentionally unclamped and goes negative
    /// once usage exceeds the ceiling.
    pub async fn headers(&self) -> Result<Headers> {
        let remaining = self.max_requests - self.count().await?;
        let reset_at = self.store.ttl(&self.key).await? + chrono::Utc::now().timestamp();

        let mut headers = Headers::new();
        headers.insert(HEADER_LIMIT, self.max_requests.to_string());
        headers.insert(HEADER_REMAINING, remaining.to_string());
        headers.insert(HEADER_RESET, reset_at.to_string());
        Ok(headers)
    }

    /// The rejection payload for a limited request.
    pub async fn limit_message(&self) -> Result<LimitExceededMessage> {
        let ttl = self.store.ttl(&self.key).await?;
        Ok(LimitExceededMessage {
            message: format!("Rate limit exceeded. Try again in {ttl} seconds"),
        })
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.store.get(&self.key).await?.unwrap_or(0))
    }
}
