//! HTTP pipeline types and middleware.

mod middleware;
mod server;

pub use middleware::RateLimitMiddleware;
pub use server::HttpServer;

use async_trait::async_trait;

use crate::error::Result;

/// A normalized request as seen by the pipeline.
#[derive(Debug, Clone)]
pub struct Request {
    /// Remote client address, the default quota key
    pub remote_addr: String,
    /// HTTP method
    pub method: String,
    /// Request path
    pub path: String,
    /// Request headers
    pub headers: Headers,
    /// Request body
    pub body: Vec<u8>,
}

/// A response produced by the pipeline: status, headers, and a body made of
/// byte chunks.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub headers: Headers,
    pub body: Vec<Vec<u8>>,
}

impl Response {
    /// Create an empty response with the given status.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    /// The body chunks flattened into one buffer.
    pub fn body_bytes(&self) -> Vec<u8> {
        self.body.concat()
    }
}

/// Trait for request handlers.
///
/// Both the innermost application handler and every middleware wrapping it
/// implement this trait, so pipelines compose by construction and the
/// hosting server only ever sees the outermost `Handler`.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Process one request.
    async fn call(&self, request: Request) -> Result<Response>;
}

/// An insertion-ordered header map.
///
/// Names compare case-insensitively; `insert` replaces an existing header in
/// place so the original position is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Create an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header, replacing any existing value for the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(index) => self.entries[index].1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Get a header value by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name)
            .map(|index| self.entries[index].1.as_str())
    }

    /// Whether a header with this name is present.
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Overlay another header map onto this one.
    ///
    /// On a name collision the overlay's value wins; this is what lets quota
    /// headers override anything the wrapped handler set.
    pub fn merge(&mut self, overlay: Headers) {
        for (name, value) in overlay.entries {
            self.insert(name, value);
        }
    }

    /// Iterate over headers in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Number of headers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(existing, _)| existing.eq_ignore_ascii_case(name))
    }
}

impl FromIterator<(String, String)> for Headers {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get_case_insensitive() {
        let mut headers = Headers::new();
        headers.insert("Content-Type", "application/json");
        assert_eq!(headers.get("content-type"), Some("application/json"));
        assert!(headers.contains("CONTENT-TYPE"));
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut headers = Headers::new();
        headers.insert("A", "1");
        headers.insert("B", "2");
        headers.insert("a", "3");
        let collected: Vec<_> = headers.iter().collect();
        assert_eq!(collected, vec![("A", "3"), ("B", "2")]);
    }

    #[test]
    fn test_merge_overlay_wins() {
        let mut base = Headers::new();
        base.insert("X-Rate-Limit-Remaining", "stale");
        base.insert("Content-Type", "text/plain");

        let mut overlay = Headers::new();
        overlay.insert("X-Rate-Limit-Remaining", "42");

        base.merge(overlay);
        assert_eq!(base.get("X-Rate-Limit-Remaining"), Some("42"));
        assert_eq!(base.get("Content-Type"), Some("text/plain"));
        assert_eq!(base.len(), 2);
    }

    #[test]
    fn test_merge_appends_new_names() {
        let mut base = Headers::new();
        base.insert("Content-Type", "text/plain");

        let mut overlay = Headers::new();
        overlay.insert("X-Rate-Limit-Limit", "100");

        base.merge(overlay);
        assert_eq!(base.len(), 2);
        assert_eq!(base.get("X-Rate-Limit-Limit"), Some("100"));
    }
}
