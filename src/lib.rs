//! Turnstile - HTTP Request Quota Service
//!
//! This crate implements a fixed-window request quota for HTTP pipelines.
//! Requests are counted per client key in a shared counter store; once the
//! configured ceiling for the current window is exceeded, requests are
//! rejected with `429 Too Many Requests` until the window expires. Admitted
//! and rejected responses alike carry `X-Rate-Limit-*` accounting headers.

pub mod http;
pub mod ratelimit;
pub mod store;
pub mod config;
pub mod error;
