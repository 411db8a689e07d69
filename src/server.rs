//! # HTTP Server
//!
//! Metrics and Kubernetes probes for the sync loop.
//!
//! - `/metrics` - Prometheus metrics in text format
//! - `/healthz` - Liveness probe (always returns 200)
//! - `/readyz` - `200` once a pass has synced Vault into the cluster, `503`
//!   before that. Both carry a JSON [`PassSnapshot`] so operators can see the
//!   pass count, failures, and the time of the last good pass.
//!
//! The server runs on port 5000 by default (configurable via `METRICS_PORT`).

use crate::runtime::{PassSnapshot, PassState};
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[derive(Debug, Default)]
pub struct ServerState {
    pub passes: Arc<PassState>,
}

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve probes and metrics until the process exits
///
/// # Errors
/// Returns an error if the port cannot be bound or the server fails
pub async fn start_server(port: u16, state: Arc<ServerState>) -> Result<(), anyhow::Error> {
    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await?;

    info!("HTTP server listening on {}", addr);

    axum::serve(listener, router(state)).await?;

    Ok(())
}

async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = crate::observability::metrics::REGISTRY.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        buffer,
    )
}

async fn healthz_handler() -> impl IntoResponse {
    StatusCode::OK
}

async fn readyz_handler(
    State(state): State<Arc<ServerState>>,
) -> (StatusCode, Json<PassSnapshot>) {
    let snapshot = state.passes.snapshot();
    let status = if snapshot.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(snapshot))
}
