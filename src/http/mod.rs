//! HTTP + WebSocket surface for the request layer.

mod routes;
mod ws;

use std::sync::Arc;

use axum::{
    Router,
    http::{HeaderValue, Method},
    routing::{delete, get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::config::{ServerConfig, UploadConfig};
use crate::orchestrator::ProgressOrchestrator;
use crate::pipeline::JobDriver;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub driver: Arc<JobDriver>,
    pub uploads: Arc<UploadConfig>,
    pub api_key_configured: bool,
}

impl AppState {
    pub fn orchestrator(&self) -> &Arc<ProgressOrchestrator> {
        self.driver.orchestrator()
    }
}

/// Build the Axum router with session REST routes and the progress socket.
pub fn router(
    driver: Arc<JobDriver>,
    uploads: UploadConfig,
    api_key_configured: bool,
) -> Router {
    let state = AppState {
        driver,
        uploads: Arc::new(uploads),
        api_key_configured,
    };

    Router::new()
        .route("/health", get(routes::health))
        .route("/api/sessions", post(routes::create_session))
        .route("/api/sessions/{id}", delete(routes::cleanup_session))
        .route("/api/process/{id}", post(routes::process_session))
        .route("/api/result/{id}", get(routes::get_result))
        .route("/api/export", post(routes::export_note))
        .route("/ws/{id}", get(ws::ws_handler))
        .with_state(state)
}

/// CORS layer allowing the configured browser origin.
pub fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any);

    match HeaderValue::from_str(&server.cors_origin) {
        Ok(origin) => layer.allow_origin(origin),
        Err(e) => {
            warn!(origin = %server.cors_origin, error = %e, "Ignoring invalid CORS origin");
            layer
        }
    }
}
