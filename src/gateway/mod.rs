//! Externally-reachable HTTP boundary: token issuance plus validated
//! pass-through proxying to the connector platform.

mod handlers;
mod state;

pub use state::AppState;

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use handlers::{create_person, create_smart_list, health, issue_token, not_found};

/// Build the gateway router. Preflight requests are answered by the CORS
/// layer; unmatched routes fall through to a JSON 404.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.cors_allow_origin);
    Router::new()
        .route("/api/health", get(health))
        .route("/api/rollout/token", get(issue_token))
        .route("/api/smart-lists", post(create_smart_list))
        .route("/api/people", post(create_person))
        .fallback(not_found)
        .with_state(state)
        .layer(cors)
}

fn cors_layer(allow_origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let allow_origin = allow_origin.trim();
    if allow_origin == "*" || allow_origin.is_empty() {
        return layer.allow_origin(Any);
    }
    match allow_origin.parse::<HeaderValue>() {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            warn!(
                "invalid CORS_ALLOW_ORIGIN '{}', falling back to allow-all",
                allow_origin
            );
            layer.allow_origin(Any)
        }
    }
}
