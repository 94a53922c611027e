//! Configuration management for Turnstile.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Main configuration for the Turnstile service.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TurnstileConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Quota configuration
    #[serde(default)]
    pub quota: QuotaConfig,

    /// Counter store configuration
    #[serde(default)]
    pub store: StoreConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    "127.0.0.1:8080".parse().unwrap()
}

/// Quota configuration for the fixed window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Maximum requests allowed per key within one window
    #[serde(default = "default_max_requests")]
    pub max_requests: i64,

    /// Window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: i64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
        }
    }
}

fn default_max_requests() -> i64 {
    100
}

fn default_window_secs() -> i64 {
    3600
}

/// Counter store configuration.
///
/// When `redis_url` is set the shared Redis store is used; otherwise counters
/// live in an in-process store, which is only suitable for single-instance
/// deployments.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreConfig {
    /// Redis connection URL, e.g. `redis://127.0.0.1:6379`
    pub redis_url: Option<String>,
}

impl TurnstileConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: &str) -> crate::error::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: TurnstileConfig = serde_yaml::from_str(&contents)
            .map_err(|e| crate::error::TurnstileError::Config(e.to_string()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TurnstileConfig::default();
        assert_eq!(config.quota.max_requests, 100);
        assert_eq!(config.quota.window_secs, 3600);
        assert!(config.store.redis_url.is_none());
    }

    #[test]
    fn test_partial_yaml_uses_field_defaults() {
        let config: TurnstileConfig = serde_yaml::from_str("quota:\n  max_requests: 10\n").unwrap();
        assert_eq!(config.quota.max_requests, 10);
        assert_eq!(config.quota.window_secs, 3600);
    }
}
