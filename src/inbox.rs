//! Inbox aggregation and message composition over the upstream client.
//!
//! The aggregator re-derives everything from a fresh upstream fetch on each
//! call; nothing is cached or persisted. Pagination is strictly sequential
//! because each page's cursor comes from the prior response.

use serde_json::{json, Value};
use tracing::info;

use crate::error::GatewayError;
use crate::normalize::{
    emails_match, extract_email_address, extract_message_list, extract_next_cursor,
    normalize_message, Message,
};
use crate::upstream::{UpstreamClient, UpstreamResponse};

/// Messages returned by `load_inbox` when the caller gives no target count.
pub const DEFAULT_MESSAGE_LIMIT: usize = 20;

/// Pagination safety cap. Bounds worst-case latency against an upstream that
/// may paginate indefinitely, so a load may return fewer messages than
/// desired even when more exist.
pub const MAX_INBOX_PAGES: usize = 5;

/// One parsed recipient for an outgoing message.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipient {
    pub name: String,
    pub email: String,
}

/// A composed message ready to send through the connector.
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub subject: String,
    pub body: String,
    pub sender: Recipient,
    pub recipients: Vec<Recipient>,
    pub thread_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct InboxAggregator {
    upstream: UpstreamClient,
}

impl InboxAggregator {
    pub fn new(upstream: UpstreamClient) -> Self {
        Self { upstream }
    }

    /// Fetch, normalize, filter, and order a bounded inbox view.
    ///
    /// Messages whose sender address matches `credential_email` are dropped
    /// (self-sent mail). Accumulation stops at `desired` messages, at
    /// [`MAX_INBOX_PAGES`], or when the upstream stops returning a cursor.
    /// A failed page fetch fails the whole load; already-fetched pages are
    /// discarded.
    pub async fn load_inbox(
        &self,
        credential_id: &str,
        credential_email: &str,
        desired: usize,
    ) -> Result<Vec<Message>, GatewayError> {
        let desired = if desired == 0 { DEFAULT_MESSAGE_LIMIT } else { desired };
        let filter_email = extract_email_address(&Value::String(credential_email.to_string()));

        let mut accumulated: Vec<Message> = Vec::new();
        let mut seen_ids: Vec<String> = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;
        let mut index = 0usize;

        while accumulated.len() < desired && pages < MAX_INBOX_PAGES {
            let response = self
                .upstream
                .list_messages(credential_id, desired, cursor.as_deref())
                .await?;
            if !response.is_success() {
                return Err(GatewayError::Proxy(list_failure_message(&response)));
            }

            for raw in extract_message_list(&response.body) {
                let message = normalize_message(&raw, index);
                index += 1;
                if emails_match(&message.from_email, &filter_email) {
                    continue;
                }
                if seen_ids.contains(&message.id) {
                    continue;
                }
                seen_ids.push(message.id.clone());
                accumulated.push(message);
            }

            cursor = extract_next_cursor(&response.body);
            pages += 1;
            if cursor.is_none() {
                break;
            }
        }

        info!(
            "inbox load credential_id={} pages={} collected={}",
            credential_id,
            pages,
            accumulated.len()
        );
        Ok(order_newest_first(accumulated, desired))
    }

    /// Validate and send a composed message. The upstream response body is
    /// returned so callers can inspect the created record.
    pub async fn send_message(
        &self,
        credential_id: &str,
        outgoing: &OutgoingMessage,
    ) -> Result<Value, GatewayError> {
        if outgoing.sender.email.trim().is_empty() {
            return Err(GatewayError::Validation(
                "Unable to determine sender email for this credential.".to_string(),
            ));
        }
        if outgoing.recipients.is_empty() {
            return Err(GatewayError::Validation(
                "Please provide at least one valid recipient.".to_string(),
            ));
        }
        if outgoing.subject.trim().is_empty() {
            return Err(GatewayError::Validation("Subject is required.".to_string()));
        }
        if outgoing.body.trim().is_empty() {
            return Err(GatewayError::Validation("Body is required.".to_string()));
        }

        let recipients: Vec<Value> = outgoing
            .recipients
            .iter()
            .map(|recipient| json!({ "name": recipient.name, "email": recipient.email }))
            .collect();
        let mut payload = json!({
            "subject": outgoing.subject.trim(),
            "body": outgoing.body,
            "sender": { "name": outgoing.sender.name, "email": outgoing.sender.email },
            "recipients": recipients,
        });
        if let Some(thread_id) = outgoing
            .thread_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
        {
            payload["threadId"] = Value::String(thread_id.to_string());
        }

        let response = self.upstream.send_message(credential_id, &payload).await?;
        if !response.is_success() {
            return Err(GatewayError::Proxy(send_failure_message(&response)));
        }
        Ok(response.body)
    }
}

/// Stable newest-first ordering by parsed timestamp, truncated to `desired`.
/// Unparseable or missing timestamps sort as earliest. Equal timestamps keep
/// their input order.
pub fn order_newest_first(messages: Vec<Message>, desired: usize) -> Vec<Message> {
    let mut keyed: Vec<(i64, Message)> = messages
        .into_iter()
        .map(|message| (parse_received_at(&message.received_at), message))
        .collect();
    keyed.sort_by(|left, right| right.0.cmp(&left.0));
    keyed
        .into_iter()
        .take(desired)
        .map(|(_, message)| message)
        .collect()
}

/// Epoch milliseconds from the loosely-typed `receivedAt` strings the
/// upstream emits: RFC 3339, RFC 2822, a bare datetime, or a numeric epoch
/// (seconds or milliseconds).
fn parse_received_at(value: &str) -> i64 {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return i64::MIN;
    }
    if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        return parsed.timestamp_millis();
    }
    if let Ok(parsed) = chrono::DateTime::parse_from_rfc2822(trimmed) {
        return parsed.timestamp_millis();
    }
    if let Ok(parsed) = chrono::NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return parsed.and_utc().timestamp_millis();
    }
    if let Ok(epoch) = trimmed.parse::<i64>() {
        // Values below ~year 2286 in seconds; anything larger is already ms.
        return if epoch.abs() < 10_000_000_000 {
            epoch * 1000
        } else {
            epoch
        };
    }
    i64::MIN
}

/// Split a free-form recipients field on commas, semicolons, and newlines
/// into named addresses, de-duplicated by address.
pub fn parse_recipients(input: &str) -> Vec<Recipient> {
    let mut recipients: Vec<Recipient> = Vec::new();
    for part in input.split(|ch| matches!(ch, ',' | ';' | '\n')) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let email = extract_email_address(&Value::String(part.to_string()));
        if email.is_empty() {
            continue;
        }
        if recipients.iter().any(|existing| existing.email == email) {
            continue;
        }
        let name = part
            .split('<')
            .next()
            .map(str::trim)
            .filter(|name| !name.is_empty() && part.contains('<') && part.contains('>'))
            .unwrap_or(&email)
            .to_string();
        recipients.push(Recipient { name, email });
    }
    recipients
}

/// Pick the credential to activate from a credentials payload: prefer the
/// entry matching `app_key`, else the first.
pub fn pick_credential(payload: &Value, app_key: &str) -> Option<Value> {
    let credentials = crate::normalize::extract_credential_list(payload);
    credentials
        .iter()
        .find(|credential| {
            credential
                .get("appKey")
                .and_then(Value::as_str)
                .map(|key| key == app_key)
                .unwrap_or(false)
        })
        .or_else(|| credentials.first())
        .cloned()
}

fn list_failure_message(response: &UpstreamResponse) -> String {
    upstream_payload_message(&response.body).unwrap_or_else(|| {
        format!("Failed to load messages (status {}).", response.status)
    })
}

fn send_failure_message(response: &UpstreamResponse) -> String {
    upstream_payload_message(&response.body)
        .or_else(|| {
            response
                .body
                .get("errorMessage")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("Failed to send email (status {}).", response.status))
}

fn upstream_payload_message(body: &Value) -> Option<String> {
    ["error", "message"]
        .iter()
        .filter_map(|key| body.get(*key))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|text| !text.is_empty())
        .map(str::to_string)
}
