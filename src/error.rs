use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Unified error type for the connector.
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    // ── Authorization ───────────────────────────────────────────────────
    #[error("No active session for this organization")]
    Unauthorized,

    #[error("Session expired — reconnect the integration")]
    SessionExpired,

    // ── Request / resource ──────────────────────────────────────────────
    #[error("{0} not found")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    // ── Service configuration ───────────────────────────────────────────
    #[error("Configuration error: {0}")]
    Config(String),

    // ── Outbound calls ──────────────────────────────────────────────────
    #[error("OAuth flow error: {0}")]
    FlowError(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for ConnectorError {
    fn from(e: anyhow::Error) -> Self {
        ConnectorError::Internal(e.to_string())
    }
}

impl IntoResponse for ConnectorError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ConnectorError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ConnectorError::SessionExpired => (StatusCode::UNAUTHORIZED, "session_expired"),
            ConnectorError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ConnectorError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ConnectorError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            ConnectorError::FlowError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "flow_error"),
            ConnectorError::Upstream(_) => (StatusCode::INTERNAL_SERVER_ERROR, "upstream_error"),
            ConnectorError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        });

        (status, axum::Json(body)).into_response()
    }
}
