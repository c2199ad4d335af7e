//! Proxy config management handlers

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::api::server::AppState;
use crate::error::SwitcherError;
use crate::models::{ProxyConfig, ProxyConfigPayload};

/// List all proxy configs
pub async fn list_proxies(State(state): State<AppState>) -> Json<Vec<ProxyConfig>> {
    let configs = state
        .engine
        .proxies()
        .list()
        .iter()
        .map(ProxyConfig::redacted)
        .collect();
    Json(configs)
}

/// Get a single proxy config
pub async fn get_proxy(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, SwitcherError> {
    let config = state
        .engine
        .proxies()
        .get(&id)
        .ok_or_else(|| SwitcherError::proxy_not_found(&id))?;
    Ok(Json(config.redacted()))
}

/// Create a new proxy config
pub async fn create_proxy(
    State(state): State<AppState>,
    Json(payload): Json<ProxyConfigPayload>,
) -> Result<impl IntoResponse, SwitcherError> {
    let id = payload
        .id
        .clone()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let config = payload.into_config(id)?;
    let config = state.apply(|engine| engine.proxies().add(config)).await?;

    Ok((StatusCode::CREATED, Json(config.redacted())))
}

/// Replace a proxy config
///
/// Responses never carry the password, so an update that omits it keeps
/// the stored one as long as the username is unchanged.
pub async fn update_proxy(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ProxyConfigPayload>,
) -> Result<impl IntoResponse, SwitcherError> {
    let mut config = payload.into_config(id)?;
    let config = state
        .apply(|engine| {
            let current = engine
                .proxies()
                .get(&config.id)
                .ok_or_else(|| SwitcherError::proxy_not_found(config.id.clone()))?;
            if config.password.is_none()
                && config.username.is_some()
                && config.username == current.username
            {
                config.password = current.password;
            }
            engine.proxies().update(config)
        })
        .await?;

    Ok(Json(config.redacted()))
}

/// Delete a proxy config
///
/// Live connections using it are flagged for the transport layer to tear
/// down; they are not failed here.
pub async fn delete_proxy(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, SwitcherError> {
    state.apply(|engine| engine.proxies().delete(&id)).await?;
    let flagged = state.connections.flag_proxy_removed(&id);

    info!(id = %id, flagged = flagged.len(), "Deleted proxy config");
    Ok(Json(json!({
        "deleted": id,
        "connections_to_reconcile": flagged,
    })))
}

/// Flip the enabled flag
pub async fn toggle_proxy(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, SwitcherError> {
    let updated = state.apply(|engine| engine.proxies().toggle(&id)).await?;

    Ok(Json(updated.redacted()))
}
