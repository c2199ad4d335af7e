//! Connection lifecycle handlers
//!
//! Called by the transport layer to admit connections and report their
//! state; the list and stats endpoints back the UI's polling views.

use std::net::IpAddr;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::api::server::AppState;
use crate::error::SwitcherError;
use crate::models::{
    parse_preferred_protocol, Connection, ConnectionStats, ConnectionTarget, EvictRequest,
    Retention, StateReport,
};

/// Request to route and open a connection
#[derive(Debug, Deserialize)]
pub struct OpenConnectionRequest {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub ip: Option<IpAddr>,
    #[serde(default)]
    pub protocol: Option<String>,
}

/// Request to route an existing record again
#[derive(Debug, Default, Deserialize)]
pub struct ReopenRequest {
    #[serde(default)]
    pub ip: Option<IpAddr>,
    #[serde(default)]
    pub protocol: Option<String>,
}

pub async fn list_connections(State(state): State<AppState>) -> Json<Vec<Connection>> {
    Json(state.connections.list())
}

pub async fn get_connection(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, SwitcherError> {
    let connection = state
        .connections
        .get(&id)
        .ok_or_else(|| SwitcherError::connection_not_found(&id))?;
    Ok(Json(connection))
}

/// Decide a route for the target and open a record if allowed
pub async fn open_connection(
    State(state): State<AppState>,
    Json(req): Json<OpenConnectionRequest>,
) -> Result<impl IntoResponse, SwitcherError> {
    if req.host.trim().is_empty() {
        return Err(SwitcherError::validation("Host is required"));
    }
    if req.port == 0 {
        return Err(SwitcherError::validation("Port must be between 1 and 65535"));
    }
    let protocol = parse_preferred_protocol(req.protocol.as_deref())?;

    let verdict = state.engine.decide(&req.host, req.ip, protocol);
    let target = ConnectionTarget {
        host: req.host.trim().to_string(),
        port: req.port,
        ip: req.ip,
    };
    let id = state.connections.open(&verdict, target)?;
    let connection = state
        .connections
        .get(&id)
        .ok_or_else(|| SwitcherError::Internal(format!("Connection {} vanished after open", id)))?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "connection": connection,
            "verdict": verdict,
        })),
    ))
}

/// Re-decide the stored target and move the record back to connecting
pub async fn reopen_connection(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ReopenRequest>,
) -> Result<impl IntoResponse, SwitcherError> {
    let existing = state
        .connections
        .get(&id)
        .ok_or_else(|| SwitcherError::connection_not_found(&id))?;
    let protocol = parse_preferred_protocol(req.protocol.as_deref())?;
    let ip = req.ip.or(existing.target.ip);

    let verdict = state.engine.decide(&existing.target.host, ip, protocol);
    let connection = state.connections.reopen(&id, &verdict)?;

    Ok(Json(json!({
        "connection": connection,
        "verdict": verdict,
    })))
}

pub async fn report_state(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(report): Json<StateReport>,
) -> Result<impl IntoResponse, SwitcherError> {
    let connection = state.connections.report_state(&id, &report)?;
    Ok(Json(connection))
}

pub async fn connection_stats(State(state): State<AppState>) -> Json<ConnectionStats> {
    Json(state.connections.stats())
}

/// Evict history; a missing body or one without bounds uses the
/// configured retention
pub async fn evict_connections(
    State(state): State<AppState>,
    body: Option<Json<EvictRequest>>,
) -> Json<serde_json::Value> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let retention = if req.max_age_secs.is_none() && req.max_records.is_none() {
        state.retention
    } else {
        Retention::from(req)
    };
    let evicted = state.connections.evict(&retention);
    Json(json!({
        "evicted": evicted,
        "remaining": state.connections.len(),
    }))
}
