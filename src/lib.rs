pub mod config;
pub mod error;
pub mod gateway;
pub mod inbox;
pub mod normalize;
pub mod reply;
pub mod token;
pub mod upstream;

pub use config::ServiceConfig;
pub use error::GatewayError;
pub use inbox::{InboxAggregator, OutgoingMessage, Recipient, DEFAULT_MESSAGE_LIMIT};
pub use normalize::{CredentialProfile, Message};
pub use reply::{ReplyResolver, ReplyTarget};
pub use token::{TokenIssuer, TOKEN_TTL_SECS};
pub use upstream::{UpstreamClient, UpstreamResponse};
