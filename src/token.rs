//! Short-lived bearer token issuance for the connector platform.
//!
//! Every call mints a fresh HS512-signed token scoped to a subject; there is
//! no caching, refresh, or rotation. Expiry is a fixed offset from issuance.

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::config::ServiceConfig;
use crate::error::GatewayError;

/// Fixed token lifetime: 15 minutes.
pub const TOKEN_TTL_SECS: i64 = 900;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Connector client id.
    pub iss: String,
    /// Principal the token is issued for.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Mints connector bearer tokens from the configured client credentials.
///
/// Secrets are checked at issue time, not at construction, so a missing
/// secret surfaces as a distinct configuration error on the first call that
/// needs it.
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    client_id: Option<String>,
    client_secret: Option<String>,
}

impl TokenIssuer {
    pub fn new(client_id: Option<String>, client_secret: Option<String>) -> Self {
        Self {
            client_id,
            client_secret,
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(config.client_id.clone(), config.client_secret.clone())
    }

    /// Sign a fresh token for `subject`.
    pub fn issue(&self, subject: &str) -> Result<String, GatewayError> {
        let client_id = self
            .client_id
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                GatewayError::Configuration("ROLLOUT_CLIENT_ID not configured".to_string())
            })?;
        let client_secret = self
            .client_secret
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                GatewayError::Configuration("ROLLOUT_CLIENT_SECRET not configured".to_string())
            })?;

        let now = Utc::now().timestamp();
        let claims = Claims {
            iss: client_id.to_string(),
            sub: subject.to_string(),
            iat: now,
            exp: now + TOKEN_TTL_SECS,
        };

        encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(client_secret.as_bytes()),
        )
        .map_err(|err| GatewayError::Proxy(format!("token signing failed: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, DecodingKey, Validation};

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(
            Some("client-id".to_string()),
            Some("client-secret".to_string()),
        )
    }

    fn decode_claims(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::new(Algorithm::HS512),
        )
        .map(|data| data.claims)
    }

    #[test]
    fn issued_token_expires_exactly_after_ttl() {
        let token = issuer().issue("user-1").unwrap();
        let claims = decode_claims(&token, "client-secret").unwrap();
        assert_eq!(claims.exp - claims.iat, TOKEN_TTL_SECS);
        assert_eq!(claims.iss, "client-id");
        assert_eq!(claims.sub, "user-1");
    }

    #[test]
    fn verification_fails_with_a_different_secret() {
        let token = issuer().issue("user-1").unwrap();
        assert!(decode_claims(&token, "client-secret").is_ok());
        assert!(decode_claims(&token, "other-secret").is_err());
    }

    #[test]
    fn missing_client_id_is_a_configuration_error() {
        let issuer = TokenIssuer::new(None, Some("secret".to_string()));
        match issuer.issue("user-1") {
            Err(GatewayError::Configuration(message)) => {
                assert_eq!(message, "ROLLOUT_CLIENT_ID not configured");
            }
            other => panic!("expected configuration error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn blank_client_secret_is_a_configuration_error() {
        let issuer = TokenIssuer::new(Some("client-id".to_string()), Some("   ".to_string()));
        match issuer.issue("user-1") {
            Err(GatewayError::Configuration(message)) => {
                assert_eq!(message, "ROLLOUT_CLIENT_SECRET not configured");
            }
            other => panic!("expected configuration error, got {:?}", other.map(|_| ())),
        }
    }
}
