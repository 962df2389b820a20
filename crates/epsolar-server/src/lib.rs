//! HTTP exposition endpoint for the EPSolar exporter.
//!
//! Serves the injected Prometheus registry in the text exposition format. Every
//! `GET /metrics` gathers the registry once, which scrapes each registered
//! collector exactly once.

use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::get,
};
use prometheus::{Encoder, Registry, TextEncoder};
use serde::Serialize;
use std::sync::Arc;

/// Default bind address.
pub const DEFAULT_HOST: &str = "0.0.0.0";
/// Default listen port.
pub const DEFAULT_PORT: u16 = 6969;

/// Where and what to serve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Reported on the index page only.
    pub device_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            device_path: epsolar_core::DEFAULT_DEVICE_PATH.to_string(),
        }
    }
}

/// Shared server state.
struct AppState {
    registry: Registry,
    device_path: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn handle_metrics(State(state): State<Arc<AppState>>) -> Response {
    // Gathering runs the scrape, which blocks on serial I/O.
    let registry = state.registry.clone();
    let families = match tokio::task::spawn_blocking(move || registry.gather()).await {
        Ok(families) => families,
        Err(err) => {
            log::error!("metrics gather task failed: {err}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "metrics gather failed\n").into_response();
        }
    };

    let encoder = TextEncoder::new();
    let mut body = Vec::new();
    if let Err(err) = encoder.encode(&families, &mut body) {
        log::error!("metrics encoding failed: {err}");
        return (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed\n").into_response();
    }

    (
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        body,
    )
        .into_response()
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn handle_index(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "EPSolar Exporter",
        "version": epsolar_core::VERSION,
        "device": state.device_path,
        "endpoints": {
            "/": "This API index",
            "/metrics": "Prometheus metrics; each request reads the charge controller once",
            "/health": "Liveness check (does not touch the device)",
        },
    }))
}

/// Build the axum router over `registry`.
pub fn build_router(registry: Registry, device_path: impl Into<String>) -> Router {
    let state = Arc::new(AppState {
        registry,
        device_path: device_path.into(),
    });

    Router::new()
        .route("/", get(handle_index))
        .route("/metrics", get(handle_metrics))
        .route("/health", get(handle_health))
        .with_state(state)
}

/// Run the exposition server until Ctrl-C.
pub async fn run_server(registry: Registry, config: &ServerConfig) -> std::io::Result<()> {
    let app = build_router(registry, config.device_path.clone());
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::error!("cannot listen for Ctrl-C: {err}");
        std::future::pending::<()>().await;
    }
    log::info!("shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_classic_exporter() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 6969);
        assert_eq!(config.device_path, "/dev/ttyXRUSB0");
    }
}
