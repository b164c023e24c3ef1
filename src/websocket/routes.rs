use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use crate::config::SecurityConfig;
use crate::server::TriviaServer;

use super::handler::websocket_handler;

/// Build the router: the WebSocket endpoint plus the health probe.
pub fn create_router(security: &SecurityConfig) -> axum::Router<Arc<TriviaServer>> {
    use tower_http::cors::{Any, CorsLayer};
    use tower_http::trace::TraceLayer;

    let origins: Vec<_> = security
        .allowed_origins()
        .iter()
        .filter_map(|origin| origin.parse::<axum::http::HeaderValue>().ok())
        .collect();

    let cors = if origins.is_empty() {
        tracing::warn!("Every configured origin failed to parse; CORS falls back to permissive");
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    axum::Router::new()
        .route("/ws", get(websocket_handler))
        .route("/api/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: chrono::DateTime<chrono::Utc>,
    message: &'static str,
}

/// Liveness probe backed by the store's health check.
async fn health_check(
    State(server): State<Arc<TriviaServer>>,
) -> Result<Json<HealthResponse>, StatusCode> {
    if server.health_check().await {
        Ok(Json(HealthResponse {
            status: "UP",
            timestamp: chrono::Utc::now(),
            message: "Quiz Rally server is running",
        }))
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}
