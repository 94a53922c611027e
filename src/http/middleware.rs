//! Request quota middleware.

use async_trait::async_trait;
use tracing::debug;

use super::{Handler, Request, Response};
use crate::config::QuotaConfig;
use crate::error::Result;
use crate::ratelimit::WindowCounter;
use crate::store::SharedStore;

/// Middleware enforcing a per-client fixed-window request quota.
///
/// Every request is recorded against its client key before the decision is
/// made, so the request that trips the limit is itself counted. Limited
/// requests are answered with `429` and a JSON body without ever invoking
/// the wrapped handler; admitted requests pass through and have the quota
/// accounting headers merged into the handler's response, overriding the
/// handler on header name collisions.
///
/// A store failure at any step surfaces as `Err` to the caller: the request
/// is neither admitted nor answered, and the hosting adapter decides how to
/// report it.
pub struct RateLimitMiddleware<H> {
    next: H,
    store: SharedStore,
    quota: QuotaConfig,
}

impl<H: Handler> RateLimitMiddleware<H> {
    /// Wrap `next` with quota enforcement backed by `store`.
    pub fn new(next: H, store: SharedStore, quota: QuotaConfig) -> Self {
        Self { next, store, quota }
    }
}

#[async_trait]
impl<H: Handler> Handler for RateLimitMiddleware<H> {
    async fn call(&self, request: Request) -> Result<Response> {
        let counter = WindowCounter::record(
            self.store.clone(),
            &request.remote_addr,
            self.quota.max_requests,
            self.quota.window_secs,
        )
        .await?;

        if counter.reached().await? {
            debug!(
                client = %request.remote_addr,
                method = %request.method,
                path = %request.path,
                "Rate limit exceeded, rejecting request"
            );
            let mut response = Response::new(429);
            response.headers = counter.headers().await?;
            response
                .body
                .push(serde_json::to_vec(&counter.limit_message().await?)?);
            return Ok(response);
        }

        let mut response = self.next.call(request).await?;
        response.headers.merge(counter.headers().await?);
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Headers;
    use crate::store::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Next handler that counts invocations and returns a fixed response.
    struct RecordingHandler {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Handler for RecordingHandler {
        async fn call(&self, _request: Request) -> Result<Response> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut response = Response::new(200);
            response.headers.insert("Content-Type", "text/plain");
            response.headers.insert("X-Rate-Limit-Remaining", "bogus");
            response.body.push(b"hello".to_vec());
            Ok(response)
        }
    }

    fn middleware(
        max_requests: i64,
    ) -> (RateLimitMiddleware<RecordingHandler>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let next = RecordingHandler {
            calls: calls.clone(),
        };
        let quota = QuotaConfig {
            max_requests,
            window_secs: 3600,
        };
        let store = Arc::new(MemoryStore::new());
        (RateLimitMiddleware::new(next, store, quota), calls)
    }

    fn request(remote_addr: &str) -> Request {
        Request {
            remote_addr: remote_addr.to_string(),
            method: "GET".to_string(),
            path: "/".to_string(),
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_admitted_request_passes_through() {
        let (middleware, calls) = middleware(100);
        let response = middleware.call(request("1.2.3.4")).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body_bytes(), b"hello");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_admitted_response_gains_quota_headers() {
        let (middleware, _) = middleware(100);
        let response = middleware.call(request("1.2.3.4")).await.unwrap();

        // Handler headers survive, quota headers are added on top and win
        // any collision.
        assert_eq!(response.headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(response.headers.get("X-Rate-Limit-Limit"), Some("100"));
        assert_eq!(response.headers.get("X-Rate-Limit-Remaining"), Some("99"));
        assert!(response.headers.contains("X-Rate-Limit-Reset"));
    }

    #[tokio::test]
    async fn test_limited_request_short_circuits() {
        let (middleware, calls) = middleware(2);
        let first = middleware.call(request("1.2.3.4")).await.unwrap();
        assert_eq!(first.status, 200);

        // The second request reaches the ceiling: it is still counted, but
        // the wrapped handler must not run again.
        let response = middleware.call(request("1.2.3.4")).await.unwrap();
        assert_eq!(response.status, 429);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let body = String::from_utf8(response.body_bytes()).unwrap();
        assert!(body.contains("Rate limit exceeded."));
        assert_eq!(response.headers.get("X-Rate-Limit-Remaining"), Some("0"));
    }

    #[tokio::test]
    async fn test_keys_do_not_interfere() {
        let (middleware, _) = middleware(3);
        middleware.call(request("10.0.0.1")).await.unwrap();
        middleware.call(request("10.0.0.1")).await.unwrap();

        let limited = middleware.call(request("10.0.0.1")).await.unwrap();
        assert_eq!(limited.status, 429);

        let other = middleware.call(request("10.0.0.2")).await.unwrap();
        assert_eq!(other.status, 200);
        assert_eq!(other.headers.get("X-Rate-Limit-Remaining"), Some("2"));
    }

    #[tokio::test]
    async fn test_quota_progression_over_many_requests() {
        let (middleware, _) = middleware(100);

        let mut last_remaining = String::new();
        let mut last_status = 0;
        for n in 1..=500u32 {
            let response = middleware.call(request("1.2.3.4")).await.unwrap();
            last_remaining = response
                .headers
                .get("X-Rate-Limit-Remaining")
                .unwrap()
                .to_string();
            last_status = response.status;
            match n {
                1 => assert_eq!((last_status, last_remaining.as_str()), (200, "99")),
                10 => assert_eq!((last_status, last_remaining.as_str()), (200, "90")),
                100 => assert_eq!((last_status, last_remaining.as_str()), (429, "0")),
                _ => {}
            }
        }
        assert_eq!((last_status, last_remaining.as_str()), (429, "-400"));
    }
}
