//! Routing decision handler

use axum::extract::State;
use axum::Json;

use crate::api::server::AppState;
use crate::error::{Result, SwitcherError};
use crate::models::{RouteRequest, Verdict};

/// Evaluate the rule table for a target without side effects
pub async fn decide_route(
    State(state): State<AppState>,
    Json(req): Json<RouteRequest>,
) -> Result<Json<Verdict>> {
    if req.host.trim().is_empty() {
        return Err(SwitcherError::validation("Host is required"));
    }
    let protocol = req.preferred_protocol()?;
    Ok(Json(state.engine.decide(&req.host, req.ip, protocol)))
}
