use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::ConnectionStatus;

/// Unified error type for the proxy switcher
#[derive(Error, Debug)]
pub enum SwitcherError {
    // Write-side validation
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    // Routing errors
    #[error("Connection to {target} denied")]
    Denied {
        target: String,
        rule: Option<String>,
    },

    #[error("Invalid transition for connection {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: ConnectionStatus,
        to: ConnectionStatus,
    },

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Persistence errors
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for proxy switcher operations
pub type Result<T> = std::result::Result<T, SwitcherError>;

impl SwitcherError {
    pub fn validation(msg: impl Into<String>) -> Self {
        SwitcherError::Validation(msg.into())
    }

    pub fn proxy_not_found(id: impl Into<String>) -> Self {
        SwitcherError::NotFound {
            kind: "Proxy config",
            id: id.into(),
        }
    }

    pub fn rule_not_found(id: impl Into<String>) -> Self {
        SwitcherError::NotFound {
            kind: "Proxy rule",
            id: id.into(),
        }
    }

    pub fn connection_not_found(id: impl Into<String>) -> Self {
        SwitcherError::NotFound {
            kind: "Connection",
            id: id.into(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            SwitcherError::Validation(_) => StatusCode::BAD_REQUEST,

            // 403 Forbidden
            SwitcherError::Denied { .. } => StatusCode::FORBIDDEN,

            // 404 Not Found
            SwitcherError::NotFound { .. } => StatusCode::NOT_FOUND,

            // 409 Conflict
            SwitcherError::InvalidTransition { .. } => StatusCode::CONFLICT,

            // 500 Internal Server Error
            SwitcherError::InvalidConfig(_)
            | SwitcherError::Storage(_)
            | SwitcherError::Io(_)
            | SwitcherError::Serialization(_)
            | SwitcherError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

// Implement IntoResponse for API error responses
impl IntoResponse for SwitcherError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            SwitcherError::Denied {
                rule: Some(rule), ..
            } => json!({
                "error": self.to_string(),
                "matched_rule": rule,
            }),
            _ => json!({
                "error": self.to_string(),
            }),
        };

        (status, Json(body)).into_response()
    }
}
