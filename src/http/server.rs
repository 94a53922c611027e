//! HTTP server hosting a handler pipeline.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::Response as AxumResponse;
use axum::Router;
use tracing::{error, info, warn};

use super::{Handler, Headers, Request};
use crate::error::Result;

/// HTTP server that drives a [`Handler`] pipeline.
///
/// Every incoming request, regardless of method or path, is normalized into
/// a [`Request`] and dispatched to the outermost handler; the handler's
/// [`Response`](super::Response) is translated back onto the wire.
pub struct HttpServer {
    /// Address to bind to
    addr: SocketAddr,
    /// The outermost pipeline handler
    handler: Arc<dyn Handler>,
}

impl HttpServer {
    /// Create a new HTTP server for the given pipeline.
    pub fn new(addr: SocketAddr, handler: Arc<dyn Handler>) -> Self {
        Self { addr, handler }
    }

    /// Start the HTTP server.
    ///
    /// This method will block until the server is shut down.
    pub async fn serve(self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        info!(addr = %self.addr, "Starting HTTP server");
        axum::serve(
            listener,
            Self::router(self.handler)
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .map_err(|e| {
            error!(error = %e, "HTTP server failed");
            e.into()
        })
    }

    /// Start the HTTP server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        info!(addr = %self.addr, "Starting HTTP server with graceful shutdown");
        axum::serve(
            listener,
            Self::router(self.handler)
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .await
        .map_err(|e| {
            error!(error = %e, "HTTP server failed");
            e.into()
        })
    }

    fn router(handler: Arc<dyn Handler>) -> Router {
        Router::new().fallback(dispatch).with_state(handler)
    }
}

/// Bridge one wire request through the pipeline and back.
async fn dispatch(
    State(handler): State<Arc<dyn Handler>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: axum::extract::Request,
) -> AxumResponse {
    let (parts, body) = request.into_parts();

    let body = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes.to_vec(),
        Err(e) => {
            warn!(error = %e, "Failed to read request body");
            return status_only(StatusCode::BAD_REQUEST);
        }
    };

    let headers = parts
        .headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.to_string(), value.to_string()))
        })
        .collect::<Headers>();

    let normalized = Request {
        remote_addr: peer.ip().to_string(),
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        headers,
        body,
    };

    match handler.call(normalized).await {
        Ok(response) => into_wire(response),
        Err(e) => {
            // Fail closed: an unaccountable request is answered with an
            // error, never silently admitted.
            error!(error = %e, client = %peer, "Pipeline failed to process request");
            status_only(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn into_wire(response: super::Response) -> AxumResponse {
    let status =
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut wire = AxumResponse::new(Body::from(response.body_bytes()));
    *wire.status_mut() = status;
    for (name, value) in response.headers.iter() {
        match (HeaderName::try_from(name), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                wire.headers_mut().insert(name, value);
            }
            _ => warn!(header = %name, "Dropping invalid response header"),
        }
    }
    wire
}

fn status_only(status: StatusCode) -> AxumResponse {
    let mut wire = AxumResponse::new(Body::empty());
    *wire.status_mut() = status;
    wire
}
