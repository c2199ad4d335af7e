//! Health check and status endpoints

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::api::server::AppState;

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "proxy-switcher"
        })),
    )
}

/// Engine status summary
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let proxies = state.engine.proxies();
    Json(json!({
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "default_policy": state.engine.default_policy(),
        "proxies": proxies.len(),
        "enabled_proxies": proxies.enabled_configs().len(),
        "rules": state.engine.rules().len(),
        "connections": state.connections.stats(),
        "store": state.store.describe(),
    }))
}
