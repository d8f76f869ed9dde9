//! Reply-target resolution: where a reply goes and which thread it joins.
//!
//! Thread resolution is best-effort. A reply without a thread id still sends
//! (un-threaded), so every fallback step logs and swallows its failure
//! rather than blocking composition.

use serde_json::Value;
use tracing::warn;

use crate::normalize::{as_non_empty_str, extract_email_address, Message};
use crate::upstream::UpstreamClient;

/// Everything the composer needs to prefill a reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyTarget {
    pub to: String,
    pub subject: String,
    pub thread_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReplyResolver {
    upstream: UpstreamClient,
}

impl ReplyResolver {
    pub fn new(upstream: UpstreamClient) -> Self {
        Self { upstream }
    }

    /// Resolve recipient, subject, and thread id for replying to `message`.
    ///
    /// Thread id policy, in order: the message's own thread id; the thread id
    /// of the full message fetched by id; a newly created thread seeded with
    /// the original subject. When every step fails the reply proceeds
    /// without a thread id.
    pub async fn resolve_reply_target(
        &self,
        message: &Message,
        credential_id: &str,
    ) -> ReplyTarget {
        let to = if !message.from_email.is_empty() {
            message.from_email.clone()
        } else {
            extract_email_address(&Value::String(message.from.clone()))
        };
        let subject = reply_subject(&message.subject);

        let mut thread_id = message
            .thread_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);

        if thread_id.is_none() && !message.id.is_empty() {
            thread_id = self.hydrate_thread_id(credential_id, &message.id).await;
        }
        if thread_id.is_none() {
            thread_id = self
                .create_thread(credential_id, &message.subject)
                .await;
        }

        ReplyTarget {
            to,
            subject,
            thread_id,
        }
    }

    async fn hydrate_thread_id(&self, credential_id: &str, message_id: &str) -> Option<String> {
        match self.upstream.get_message(credential_id, message_id).await {
            Ok(response) if response.is_success() => response
                .body
                .get("threadId")
                .and_then(as_non_empty_str)
                .map(str::to_string),
            Ok(response) => {
                warn!(
                    "message detail fetch for {} returned status {}",
                    message_id, response.status
                );
                None
            }
            Err(err) => {
                warn!("failed to hydrate threadId for {}: {}", message_id, err);
                None
            }
        }
    }

    async fn create_thread(&self, credential_id: &str, subject: &str) -> Option<String> {
        let seed = if subject.trim().is_empty() {
            "(no subject)"
        } else {
            subject
        };
        match self.upstream.create_thread(credential_id, seed).await {
            Ok(response) if response.is_success() => response
                .body
                .get("id")
                .and_then(as_non_empty_str)
                .map(str::to_string),
            Ok(response) => {
                warn!("thread create failed with status {}", response.status);
                None
            }
            Err(err) => {
                warn!("failed to create thread: {}", err);
                None
            }
        }
    }
}

/// Prefix a subject with `Re: ` unless it already carries the prefix in any
/// case.
pub fn reply_subject(subject: &str) -> String {
    if subject.trim().to_lowercase().starts_with("re:") {
        subject.to_string()
    } else {
        format!("Re: {subject}")
    }
}
