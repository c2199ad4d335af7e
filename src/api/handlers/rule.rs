//! Proxy rule management handlers

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::api::server::AppState;
use crate::error::SwitcherError;
use crate::models::{parse_priority, ProxyRule, ProxyRulePayload, RulePriorityUpdate};

/// List rules in evaluation order
pub async fn list_rules(State(state): State<AppState>) -> Json<Vec<ProxyRule>> {
    Json(state.engine.rules().snapshot().rules())
}

pub async fn get_rule(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, SwitcherError> {
    let rule = state
        .engine
        .rules()
        .get(&id)
        .ok_or_else(|| SwitcherError::rule_not_found(&id))?;
    Ok(Json(rule))
}

pub async fn create_rule(
    State(state): State<AppState>,
    Json(payload): Json<ProxyRulePayload>,
) -> Result<impl IntoResponse, SwitcherError> {
    let id = payload
        .id
        .clone()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let rule = payload.into_rule(id)?;
    let rule = state.apply(|engine| engine.rules().insert(rule)).await?;

    info!(id = %rule.id, rule_type = %rule.rule_type, priority = rule.priority, "Created proxy rule");
    Ok((StatusCode::CREATED, Json(rule)))
}

pub async fn update_rule(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ProxyRulePayload>,
) -> Result<impl IntoResponse, SwitcherError> {
    let rule = payload.into_rule(id)?;
    let rule = state.apply(|engine| engine.rules().update(rule)).await?;

    info!(id = %rule.id, priority = rule.priority, "Updated proxy rule");
    Ok(Json(rule))
}

pub async fn update_rule_priority(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<RulePriorityUpdate>,
) -> Result<impl IntoResponse, SwitcherError> {
    let priority = parse_priority(update.priority)?;
    let rule = state
        .apply(|engine| engine.rules().set_priority(&id, priority))
        .await?;

    info!(id = %rule.id, priority, "Changed proxy rule priority");
    Ok(Json(rule))
}

pub async fn delete_rule(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, SwitcherError> {
    state.apply(|engine| engine.rules().remove(&id)).await?;

    info!(id = %id, "Deleted proxy rule");
    Ok(Json(json!({ "deleted": id })))
}
