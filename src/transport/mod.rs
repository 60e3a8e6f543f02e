//! # Transport Adapter
//!
//! JSON over HTTP in front of the backend's request channel. The host sends
//! one request per `POST /v1/request`; the body is a backend request and the
//! reply body is always a backend response. The HTTP status mirrors the
//! response's error code so ordinary HTTP tooling can tell failures apart.
//!
//! Once the listener is bound, a handshake line is written to stdout:
//!
//! ```text
//! 1|1|tcp|127.0.0.1:41873|http
//! ```

use std::future::Future;
use std::io::Write;
use std::net::SocketAddr;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response as HttpResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::backend::BackendClient;
use crate::config::TransportConfig;
use crate::domain::Response;
use crate::errors::{BackendError, Error, ErrorCode, Result};

/// Core protocol version announced in the handshake
pub const CORE_PROTOCOL_VERSION: u32 = 1;

/// Application protocol version announced in the handshake
pub const APP_PROTOCOL_VERSION: u32 = 1;

#[derive(Debug, Clone)]
pub struct TransportState {
    pub client: BackendClient,
}

/// Build the HTTP router
pub fn router(client: BackendClient, max_body_size: usize) -> Router {
    let state = TransportState { client };

    Router::new()
        .route("/v1/request", post(dispatch_handler))
        .route("/health", get(health_handler))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(DefaultBodyLimit::max(max_body_size)))
        .with_state(state)
}

async fn dispatch_handler(State(state): State<TransportState>, body: Bytes) -> HttpResponse {
    let raw: Value = match serde_json::from_slice(&body) {
        Ok(raw) => raw,
        Err(e) => {
            let err = BackendError::malformed(format!("body is not valid JSON: {}", e));
            return reply(Response::from_error(&err, Vec::new()));
        }
    };

    match state.client.call(raw).await {
        Ok(response) => reply(response),
        Err(e) => {
            warn!(error = %e, "Backend unavailable");
            let body = json!({
                "data": {},
                "warnings": [],
                "error": { "code": ErrorCode::Internal, "message": e.to_string(), "retryable": true }
            });
            (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
        }
    }
}

async fn health_handler(State(state): State<TransportState>) -> HttpResponse {
    if state.client.is_closed() {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "status": "stopped" }))).into_response();
    }
    Json(json!({ "status": "ok", "version": crate::VERSION })).into_response()
}

fn reply(response: Response) -> HttpResponse {
    let status = match response.error_code() {
        Some(code) => StatusCode::from_u16(code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        None => StatusCode::OK,
    };
    (status, Json(response)).into_response()
}

/// The line a host reads from stdout to find the plugin
pub fn handshake_line(addr: SocketAddr) -> String {
    format!("{}|{}|tcp|{}|http", CORE_PROTOCOL_VERSION, APP_PROTOCOL_VERSION, addr)
}

/// Bind, announce the address, and serve until `shutdown` resolves
pub async fn start_transport<F>(config: &TransportConfig, client: BackendClient, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let bind_address = config.bind_address();
    let listener = TcpListener::bind(&bind_address)
        .await
        .map_err(|e| Error::transport(format!("Failed to bind transport to {}: {}", bind_address, e)))?;
    let local_addr = listener.local_addr()?;

    announce(local_addr)?;
    info!(address = %local_addr, "Transport listening");

    axum::serve(listener, router(client, config.max_body_size))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::transport(format!("Transport server error: {}", e)))?;

    info!("Transport stopped");
    Ok(())
}

fn announce(addr: SocketAddr) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", handshake_line(addr))?;
    stdout.flush()?;
    Ok(())
}
