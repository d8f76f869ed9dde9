use std::sync::Arc;

use crate::config::ServiceConfig;
use crate::error::GatewayError;
use crate::token::TokenIssuer;
use crate::upstream::UpstreamClient;

/// Read-only shared state for the gateway. Constructed once at startup;
/// handlers never reach into the environment.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: ServiceConfig,
    pub issuer: TokenIssuer,
    pub upstream: UpstreamClient,
}

impl AppState {
    pub fn new(config: ServiceConfig) -> Result<Arc<Self>, GatewayError> {
        let issuer = TokenIssuer::from_config(&config);
        let upstream = UpstreamClient::new(&config)?;
        Ok(Arc::new(Self {
            config,
            issuer,
            upstream,
        }))
    }
}
