//! Authenticated HTTP calls to the connector platform's email API.
//!
//! Every call mints a fresh bearer token for the configured default subject
//! and attaches the mailbox credential reference as a separate header. The
//! upstream status is always passed through unmodified; bodies are parsed
//! defensively so a malformed upstream response stays observable instead of
//! being discarded.

use reqwest::{Client, Method};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::config::ServiceConfig;
use crate::error::GatewayError;
use crate::token::TokenIssuer;

/// Header naming the linked mailbox a call operates on.
pub const CREDENTIAL_HEADER: &str = "x-rollout-credential-id";

/// Upstream status plus a JSON view of the body. An empty body is `{}`; a
/// non-JSON body is wrapped as `{"raw": <text>}`.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: Value,
}

impl UpstreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: Client,
    base_url: String,
    issuer: TokenIssuer,
    default_subject: String,
}

impl UpstreamClient {
    pub fn new(config: &ServiceConfig) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(config.upstream_timeout)
            .build()
            .map_err(|err| GatewayError::Proxy(format!("http client init failed: {err}")))?;
        Ok(Self {
            http,
            base_url: config.email_api_base_url.trim_end_matches('/').to_string(),
            issuer: TokenIssuer::from_config(config),
            default_subject: config.default_user_id.clone(),
        })
    }

    /// Create a smart list on the linked mailbox.
    pub async fn create_smart_list(
        &self,
        credential_id: &str,
        name: &str,
        tag_name: &str,
    ) -> Result<UpstreamResponse, GatewayError> {
        let payload = json!({ "name": name, "tagName": tag_name });
        self.request(Method::POST, "smart-lists", credential_id, &[], Some(&payload))
            .await
    }

    /// Create a person record on the linked mailbox.
    pub async fn create_person(
        &self,
        credential_id: &str,
        person: &Value,
    ) -> Result<UpstreamResponse, GatewayError> {
        self.request(Method::POST, "people", credential_id, &[], Some(person))
            .await
    }

    /// One page of messages. `cursor` is the opaque continuation token from
    /// the previous page.
    pub async fn list_messages(
        &self,
        credential_id: &str,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<UpstreamResponse, GatewayError> {
        let mut query = vec![("limit".to_string(), limit.to_string())];
        if let Some(cursor) = cursor {
            query.push(("next".to_string(), cursor.to_string()));
        }
        self.request(Method::GET, "emailMessages", credential_id, &query, None)
            .await
    }

    /// Full message detail by id.
    pub async fn get_message(
        &self,
        credential_id: &str,
        message_id: &str,
    ) -> Result<UpstreamResponse, GatewayError> {
        let path = format!("emailMessages/{}", urlencoding::encode(message_id));
        self.request(Method::GET, &path, credential_id, &[], None)
            .await
    }

    /// Send a composed message.
    pub async fn send_message(
        &self,
        credential_id: &str,
        payload: &Value,
    ) -> Result<UpstreamResponse, GatewayError> {
        self.request(Method::POST, "emailMessages", credential_id, &[], Some(payload))
            .await
    }

    /// Create a conversation thread seeded with a subject.
    pub async fn create_thread(
        &self,
        credential_id: &str,
        subject: &str,
    ) -> Result<UpstreamResponse, GatewayError> {
        let payload = json!({ "subject": subject });
        self.request(Method::POST, "email-threads", credential_id, &[], Some(&payload))
            .await
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        credential_id: &str,
        query: &[(String, String)],
        payload: Option<&Value>,
    ) -> Result<UpstreamResponse, GatewayError> {
        let credential_id = credential_id.trim();
        if credential_id.is_empty() {
            return Err(GatewayError::Validation(
                "credentialId is required".to_string(),
            ));
        }

        let token = self.issuer.issue(&self.default_subject)?;
        let url = format!("{}/{}", self.base_url, path);

        info!(
            "upstream request method={} url={} credential_id={} payload={}",
            method,
            url,
            credential_id,
            payload
                .map(|value| value.to_string())
                .unwrap_or_else(|| "-".to_string())
        );

        let mut request = self
            .http
            .request(method, &url)
            .bearer_auth(token)
            .header(CREDENTIAL_HEADER, credential_id)
            .query(query);
        if let Some(payload) = payload {
            request = request.json(payload);
        }

        let response = request
            .send()
            .await
            .map_err(|err| GatewayError::Proxy(format!("upstream request to {url} failed: {err}")))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let text = response
            .text()
            .await
            .map_err(|err| GatewayError::Proxy(format!("upstream body read failed: {err}")))?;

        info!(
            "upstream response url={} status={} headers={:?} body={}",
            url, status, headers, text
        );
        if status >= 500 {
            warn!("upstream server error url={} status={}", url, status);
        }

        Ok(UpstreamResponse {
            status,
            body: forward_body(&text),
        })
    }
}

/// Defensive body decoding for relayed responses.
pub fn forward_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return json!({});
    }
    serde_json::from_str(text).unwrap_or_else(|_| json!({ "raw": text }))
}
