//! Error taxonomy shared by the gateway and the upstream client.
//!
//! Configuration and validation problems are raised before any network I/O
//! and always carry a specific, user-visible message. Everything else is
//! collapsed into `Proxy`, whose detail is logged but never surfaced to the
//! caller.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Missing or empty server-side secrets. Reported with its specific cause.
    #[error("{0}")]
    Configuration(String),
    /// Missing or malformed required request fields.
    #[error("{0}")]
    Validation(String),
    /// Inbound body that could not be parsed as JSON.
    #[error("{0}")]
    BadRequest(String),
    /// Unmatched route.
    #[error("Not Found")]
    NotFound,
    /// Network failure, unexpected upstream shape, or any other failure
    /// while proxying. The message is for logs and library callers; the
    /// HTTP response stays generic.
    #[error("{0}")]
    Proxy(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound => StatusCode::NOT_FOUND,
            GatewayError::Proxy(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            GatewayError::Proxy(detail) => {
                error!("proxy failure: {}", detail);
                "Upstream request failed".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
