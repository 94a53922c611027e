use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use tokio::signal;
use tracing::{info, Level};

use turnstile::config::TurnstileConfig;
use turnstile::error::Result;
use turnstile::http::{Handler, HttpServer, RateLimitMiddleware, Request, Response};
use turnstile::store::{MemoryStore, RedisStore, SharedStore};

/// Command-line options, each overriding its configuration-file counterpart.
#[derive(Parser, Debug)]
#[command(name = "turnstile")]
#[command(about = "Fixed-window HTTP request quota service")]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// HTTP listen address
    #[arg(short, long)]
    listen_addr: Option<SocketAddr>,

    /// Redis URL for the shared counter store
    #[arg(long)]
    redis_url: Option<String>,

    /// Maximum requests allowed per key within one window
    #[arg(long)]
    max_requests: Option<i64>,

    /// Window length in seconds
    #[arg(long)]
    window_secs: Option<i64>,
}

/// Placeholder application handler for standalone deployments.
///
/// Real deployments wrap their own [`Handler`] with the middleware; running
/// the binary as-is serves this minimal upstream behind the quota.
struct StatusHandler;

#[async_trait]
impl Handler for StatusHandler {
    async fn call(&self, _request: Request) -> Result<Response> {
        let mut response = Response::new(200);
        response.headers.insert("Content-Type", "application/json");
        response
            .body
            .push(serde_json::to_vec(&serde_json::json!({"status": "ok"}))?);
        Ok(response)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .init();

    info!("Starting Turnstile Request Quota Service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    // Load configuration and apply CLI overrides
    let mut config = match &args.config {
        Some(path) => TurnstileConfig::from_file(path)?,
        None => TurnstileConfig::default(),
    };
    if let Some(listen_addr) = args.listen_addr {
        config.server.listen_addr = listen_addr;
    }
    if let Some(redis_url) = args.redis_url {
        config.store.redis_url = Some(redis_url);
    }
    if let Some(max_requests) = args.max_requests {
        config.quota.max_requests = max_requests;
    }
    if let Some(window_secs) = args.window_secs {
        config.quota.window_secs = window_secs;
    }
    info!(
        listen_addr = %config.server.listen_addr,
        max_requests = config.quota.max_requests,
        window_secs = config.quota.window_secs,
        "Configuration loaded"
    );

    // Construct the counter store once at startup; the middleware receives
    // a shared handle rather than reaching for ambient state.
    let store: SharedStore = match &config.store.redis_url {
        Some(url) => Arc::new(RedisStore::connect(url).await?),
        None => {
            info!("No Redis URL configured, using in-process counter store");
            Arc::new(MemoryStore::new())
        }
    };

    let pipeline = RateLimitMiddleware::new(StatusHandler, store, config.quota);
    let server = HttpServer::new(config.server.listen_addr, Arc::new(pipeline));

    // Run the server with graceful shutdown on Ctrl+C
    server.serve_with_shutdown(shutdown_signal()).await?;

    info!("Turnstile Request Quota Service stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
