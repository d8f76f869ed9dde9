use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use crate::error::GatewayError;
use crate::upstream::UpstreamResponse;

use super::state::AppState;

pub(super) async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

#[derive(Debug, Deserialize)]
pub(super) struct TokenParams {
    user_id: Option<String>,
}

/// `GET /api/rollout/token` — mint a short-lived token for the requested
/// subject, defaulting to the configured demo subject. Configuration errors
/// keep their specific message; anything else is reported generically.
pub(super) async fn issue_token(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TokenParams>,
) -> impl IntoResponse {
    let user_id = params
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(&state.config.default_user_id)
        .to_string();

    match state.issuer.issue(&user_id) {
        Ok(token) => (
            StatusCode::OK,
            Json(json!({ "token": token, "user_id": user_id })),
        ),
        Err(GatewayError::Configuration(message)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": message })),
        ),
        Err(err) => {
            error!("token generation failed: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to generate token" })),
            )
        }
    }
}

/// `POST /api/smart-lists` — validate then proxy a smart-list creation,
/// relaying the upstream status and body verbatim.
pub(super) async fn create_smart_list(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), GatewayError> {
    let payload = parse_json_body(&body)?;
    let credential_id = required_string(&payload, "credentialId")?;
    let name = required_string(&payload, "name")?;
    let tag_name = required_string(&payload, "tagName")?;

    let response = state
        .upstream
        .create_smart_list(&credential_id, &name, &tag_name)
        .await?;
    Ok(relay(response))
}

/// `POST /api/people` — validate then proxy a person creation.
pub(super) async fn create_person(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), GatewayError> {
    let payload = parse_json_body(&body)?;
    let credential_id = required_string(&payload, "credentialId")?;
    let person = payload
        .get("person")
        .filter(|value| value.is_object())
        .ok_or_else(|| {
            GatewayError::Validation("person must be an object".to_string())
        })?;

    let response = state.upstream.create_person(&credential_id, person).await?;
    Ok(relay(response))
}

pub(super) async fn not_found() -> GatewayError {
    GatewayError::NotFound
}

fn relay(response: UpstreamResponse) -> (StatusCode, Json<Value>) {
    let status =
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(response.body))
}

fn parse_json_body(body: &Bytes) -> Result<Value, GatewayError> {
    serde_json::from_slice(body)
        .map_err(|err| GatewayError::BadRequest(format!("invalid JSON body: {err}")))
}

fn required_string(payload: &Value, key: &str) -> Result<String, GatewayError> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| GatewayError::Validation(format!("{key} is required")))
}
