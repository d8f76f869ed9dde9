use std::net::SocketAddr;
use std::time::Duration;

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use mockito::Matcher;
use serde_json::{json, Value};

use mailbridge::config::ServiceConfig;
use mailbridge::gateway::{self, AppState};
use mailbridge::token::{Claims, TOKEN_TTL_SECS};

fn test_config(base_url: &str) -> ServiceConfig {
    ServiceConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        client_id: Some("test-client".to_string()),
        client_secret: Some("test-secret".to_string()),
        default_user_id: "demo-email-user".to_string(),
        email_api_base_url: base_url.trim_end_matches('/').to_string(),
        cors_allow_origin: "*".to_string(),
        upstream_timeout: Duration::from_secs(5),
    }
}

async fn spawn_gateway(config: ServiceConfig) -> SocketAddr {
    let state = AppState::new(config).expect("state");
    let app = gateway::router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    addr
}

#[tokio::test]
async fn health_reports_ok() {
    let addr = spawn_gateway(test_config("http://127.0.0.1:9")).await;

    let response = reqwest::get(format!("http://{addr}/api/health"))
        .await
        .expect("request");
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.expect("json");
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn token_endpoint_issues_a_scoped_token() {
    let addr = spawn_gateway(test_config("http://127.0.0.1:9")).await;

    let response = reqwest::get(format!("http://{addr}/api/rollout/token?user_id=alice"))
        .await
        .expect("request");
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.expect("json");
    assert_eq!(body["user_id"], "alice");

    let token = body["token"].as_str().expect("token field");
    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(b"test-secret"),
        &Validation::new(Algorithm::HS512),
    )
    .expect("decode")
    .claims;
    assert_eq!(claims.sub, "alice");
    assert_eq!(claims.iss, "test-client");
    assert_eq!(claims.exp - claims.iat, TOKEN_TTL_SECS);
}

#[tokio::test]
async fn token_endpoint_defaults_the_subject() {
    let addr = spawn_gateway(test_config("http://127.0.0.1:9")).await;

    let response = reqwest::get(format!("http://{addr}/api/rollout/token?user_id=%20"))
        .await
        .expect("request");
    let body: Value = response.json().await.expect("json");
    assert_eq!(body["user_id"], "demo-email-user");
}

#[tokio::test]
async fn missing_secret_is_a_distinct_visible_error() {
    let mut config = test_config("http://127.0.0.1:9");
    config.client_secret = None;
    let addr = spawn_gateway(config).await;

    let response = reqwest::get(format!("http://{addr}/api/rollout/token"))
        .await
        .expect("request");
    assert_eq!(response.status().as_u16(), 500);
    let body: Value = response.json().await.expect("json");
    assert_eq!(body["error"], "ROLLOUT_CLIENT_SECRET not configured");
}

#[tokio::test]
async fn smart_list_creation_validates_then_relays() {
    let mut server = mockito::Server::new_async().await;
    let upstream = server
        .mock("POST", "/smart-lists")
        .match_header("authorization", Matcher::Regex("^Bearer ".to_string()))
        .match_header("x-rollout-credential-id", "cred-1")
        .match_body(Matcher::PartialJson(json!({ "name": "VIP", "tagName": "vip" })))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(json!({ "id": "list-1" }).to_string())
        .expect(1)
        .create_async()
        .await;

    let addr = spawn_gateway(test_config(&server.url())).await;
    let client = reqwest::Client::new();

    // Missing tagName fails before any upstream call.
    let response = client
        .post(format!("http://{addr}/api/smart-lists"))
        .json(&json!({ "credentialId": "cred-1", "name": "VIP" }))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status().as_u16(), 422);
    let body: Value = response.json().await.expect("json");
    assert_eq!(body["error"], "tagName is required");

    let response = client
        .post(format!("http://{addr}/api/smart-lists"))
        .json(&json!({ "credentialId": "cred-1", "name": "VIP", "tagName": "vip" }))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.expect("json");
    assert_eq!(body["id"], "list-1");
    upstream.assert_async().await;
}

#[tokio::test]
async fn person_creation_requires_an_object() {
    let mut server = mockito::Server::new_async().await;
    let upstream = server
        .mock("POST", "/people")
        .match_body(Matcher::PartialJson(json!({ "name": "Jane" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "id": "person-1" }).to_string())
        .expect(1)
        .create_async()
        .await;

    let addr = spawn_gateway(test_config(&server.url())).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/api/people"))
        .json(&json!({ "credentialId": "cred-1", "person": "not an object" }))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status().as_u16(), 422);

    let response = client
        .post(format!("http://{addr}/api/people"))
        .json(&json!({ "credentialId": "cred-1", "person": { "name": "Jane" } }))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.expect("json");
    assert_eq!(body["id"], "person-1");
    upstream.assert_async().await;
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let addr = spawn_gateway(test_config("http://127.0.0.1:9")).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/api/smart-lists"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .expect("request");
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.expect("json");
    assert!(body["error"].as_str().unwrap_or_default().contains("invalid JSON body"));
}

#[tokio::test]
async fn unknown_routes_return_json_not_found() {
    let addr = spawn_gateway(test_config("http://127.0.0.1:9")).await;

    let response = reqwest::get(format!("http://{addr}/api/nope"))
        .await
        .expect("request");
    assert_eq!(response.status().as_u16(), 404);
    let body: Value = response.json().await.expect("json");
    assert_eq!(body, json!({ "error": "Not Found" }));
}

#[tokio::test]
async fn preflight_requests_are_answered_permissively() {
    let addr = spawn_gateway(test_config("http://127.0.0.1:9")).await;
    let client = reqwest::Client::new();

    let response = client
        .request(
            reqwest::Method::OPTIONS,
            format!("http://{addr}/api/smart-lists"),
        )
        .header("origin", "http://localhost:5173")
        .header("access-control-request-method", "POST")
        .send()
        .await
        .expect("request");
    assert!(response.status().is_success());
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|value| value.to_str().ok()),
        Some("*")
    );
}
