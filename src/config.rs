use std::env;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 4567;
pub const DEFAULT_USER_ID: &str = "demo-email-user";
pub const DEFAULT_EMAIL_API_BASE_URL: &str = "https://email.universal.rollout.com/api";
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;

/// Process configuration, read once at startup and passed by reference into
/// the token issuer and upstream client. Business logic never reads the
/// environment directly.
///
/// The connector secrets are optional here on purpose: their absence is a
/// per-call configuration error with a specific message, not a startup
/// failure.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    /// Connector platform client id (`iss` claim of minted tokens).
    pub client_id: Option<String>,
    /// Connector platform client secret (HS512 signing key).
    pub client_secret: Option<String>,
    /// Subject used for tokens minted on behalf of proxied calls. All
    /// proxied operations share this subject; the per-mailbox scoping comes
    /// from the credential reference header, not from the token.
    pub default_user_id: String,
    /// Connector email API base URL, without trailing slash.
    pub email_api_base_url: String,
    /// Allowed CORS origin; `*` means allow-all.
    pub cors_allow_origin: String,
    pub upstream_timeout: Duration,
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        let host = env_var_non_empty("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = env::var("PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        let client_id = env_var_non_empty("ROLLOUT_CLIENT_ID");
        let client_secret = env_var_non_empty("ROLLOUT_CLIENT_SECRET");
        let default_user_id = env_var_non_empty("ROLLOUT_DEFAULT_USER_ID")
            .unwrap_or_else(|| DEFAULT_USER_ID.to_string());

        let email_api_base_url = env_var_non_empty("ROLLOUT_EMAIL_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_EMAIL_API_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let cors_allow_origin =
            env_var_non_empty("CORS_ALLOW_ORIGIN").unwrap_or_else(|| "*".to_string());

        let upstream_timeout = env::var("UPSTREAM_TIMEOUT_SECS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|value| *value > 0)
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS));

        Self {
            host,
            port,
            client_id,
            client_secret,
            default_user_id,
            email_api_base_url,
            cors_allow_origin,
            upstream_timeout,
        }
    }
}

fn env_var_non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
