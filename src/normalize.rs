//! Pure transforms from arbitrary connector payload shapes into canonical
//! records.
//!
//! The connector platform normalizes many providers, so field names vary per
//! provider and per entity. Every extraction here is an ordered
//! first-match-wins rule list over `serde_json::Value`; a candidate that is
//! missing or malformed degrades to an empty string or a safe default.
//! Nothing in this module can fail.

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::OnceLock;

/// Candidate keys probed, in order, when an object may hold an email address.
pub const EMAIL_CANDIDATE_KEYS: &[&str] = &[
    "email",
    "emailAddress",
    "address",
    "value",
    "primary",
    "username",
    "login",
    "accountEmail",
    "accountName",
];

/// Sub-objects probed after the direct keys miss.
const NESTED_EMAIL_KEYS: &[&str] = &["profile", "data"];

/// Message fields that may carry body text, in preference order.
const BODY_TEXT_KEYS: &[&str] = &["body", "textBody", "plainText", "snippet", "preview", "summary"];

/// Message fields that may carry the sender, in preference order.
const SENDER_KEYS: &[&str] = &["from", "sender", "senderProfile", "fromAddress"];

/// Message fields that may carry a short preview, in preference order.
const SNIPPET_KEYS: &[&str] = &["snippet", "preview", "bodyPreview"];

/// Message fields that may carry the received timestamp, in preference order.
const RECEIVED_AT_KEYS: &[&str] = &[
    "receivedAt",
    "sentAt",
    "internalDate",
    "received",
    "sent",
    "created",
    "updated",
];

/// Message fields that may carry a stable identifier, in preference order.
const MESSAGE_ID_KEYS: &[&str] = &["id", "messageId", "externalId", "threadId"];

/// Keys under which list responses wrap their message array.
const MESSAGE_LIST_KEYS: &[&str] =
    &["emailmessages", "messages", "data", "items", "records", "threads"];

/// Keys under which credential list responses wrap their array.
const CREDENTIAL_LIST_KEYS: &[&str] = &["credentials", "data"];

const SNIPPET_MAX_CHARS: usize = 280;

/// Canonical message record. `id` is always non-empty and `from` never
/// degrades below the `"Unknown sender"` sentinel.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Message {
    pub id: String,
    #[serde(rename = "threadId", skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    pub subject: String,
    pub from: String,
    #[serde(rename = "fromEmail")]
    pub from_email: String,
    pub snippet: String,
    #[serde(rename = "receivedAt")]
    pub received_at: String,
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SenderDetails {
    pub display: String,
    pub email: String,
}

/// Normalized view of one linked credential.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CredentialProfile {
    pub label: String,
    pub email: String,
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}").expect("email pattern")
    })
}

fn br_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<\s*br\s*/?\s*>").expect("br pattern"))
}

fn html_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("tag pattern"))
}

/// Trimmed, lower-cased address, or empty when the input is not usable.
pub fn normalize_email(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        trimmed.to_lowercase()
    }
}

/// Case-insensitive address comparison; blank on either side never matches.
pub fn emails_match(left: &str, right: &str) -> bool {
    let left = normalize_email(left);
    let right = normalize_email(right);
    !left.is_empty() && left == right
}

pub fn as_non_empty_str(value: &Value) -> Option<&str> {
    value
        .as_str()
        .map(str::trim)
        .filter(|text| !text.is_empty())
}

fn field<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value.as_object().and_then(|map| map.get(key))
}

/// Best-effort email address from any payload shape: arrays are scanned in
/// order, objects are probed through [`EMAIL_CANDIDATE_KEYS`] and then the
/// `profile`/`data` sub-objects, strings go through the address pattern.
pub fn extract_email_address(value: &Value) -> String {
    match value {
        Value::Array(entries) => entries
            .iter()
            .map(extract_email_address)
            .find(|email| !email.is_empty())
            .unwrap_or_default(),
        Value::String(text) => email_regex()
            .find(text)
            .map(|found| normalize_email(found.as_str()))
            .unwrap_or_default(),
        Value::Object(map) => {
            for key in EMAIL_CANDIDATE_KEYS {
                if let Some(candidate) = map.get(*key) {
                    let email = extract_email_address(candidate);
                    if !email.is_empty() {
                        return email;
                    }
                }
            }
            for key in NESTED_EMAIL_KEYS {
                if let Some(candidate) = map.get(*key) {
                    let email = extract_email_address(candidate);
                    if !email.is_empty() {
                        return email;
                    }
                }
            }
            String::new()
        }
        _ => String::new(),
    }
}

/// Sender display string and address. Prefers `"Name <email>"` when both are
/// known, then the name alone, then the bare address.
pub fn extract_sender_details(value: &Value) -> SenderDetails {
    match value {
        Value::Array(entries) => entries
            .iter()
            .map(extract_sender_details)
            .find(|details| !details.display.is_empty() || !details.email.is_empty())
            .unwrap_or_default(),
        Value::String(text) => {
            let trimmed = text.trim().to_string();
            let email = extract_email_address(value);
            SenderDetails {
                display: trimmed,
                email,
            }
        }
        Value::Object(map) => {
            let email = ["email", "emailAddress", "address"]
                .iter()
                .filter_map(|key| map.get(*key))
                .map(extract_email_address)
                .find(|email| !email.is_empty())
                .unwrap_or_else(|| extract_email_address(value));

            let name = field(value, "displayName")
                .and_then(as_non_empty_str)
                .or_else(|| field(value, "name").and_then(as_non_empty_str));
            let email_display = ["email", "emailAddress", "address"]
                .iter()
                .filter_map(|key| map.get(*key))
                .find_map(as_non_empty_str);

            let display = match (name, &email) {
                (Some(name), email) if !email.is_empty() => format!("{} <{}>", name, email),
                (Some(name), _) => name.to_string(),
                (None, _) => email_display
                    .map(str::to_string)
                    .filter(|text| !text.is_empty())
                    .unwrap_or_else(|| email.clone()),
            };
            SenderDetails { display, email }
        }
        _ => SenderDetails::default(),
    }
}

/// Strip markup from an HTML fragment: `<br>` becomes a newline, every other
/// tag is removed.
pub fn html_to_plain_text(value: &str) -> String {
    if value.trim().is_empty() {
        return String::new();
    }
    let with_breaks = br_tag_regex().replace_all(value, "\n");
    html_tag_regex().replace_all(&with_breaks, "").into_owned()
}

/// First non-blank body candidate from a message, HTML-stripped and trimmed.
pub fn extract_body_text(message: &Value) -> String {
    if !message.is_object() {
        return String::new();
    }

    let fragments_joined = field(message, "fragments")
        .and_then(Value::as_array)
        .map(|fragments| {
            fragments
                .iter()
                .filter_map(as_non_empty_str)
                .collect::<Vec<_>>()
                .join("\n\n")
        });

    let nested_snippet = field(message, "original")
        .and_then(|original| field(original, "email"))
        .and_then(|email| field(email, "snippet"))
        .and_then(as_non_empty_str)
        .map(str::to_string);

    let candidates = BODY_TEXT_KEYS
        .iter()
        .filter_map(|key| field(message, key))
        .filter_map(as_non_empty_str)
        .map(str::to_string)
        .chain(nested_snippet)
        .chain(fragments_joined);

    for candidate in candidates {
        let plain = html_to_plain_text(&candidate);
        let plain = plain.trim();
        if !plain.is_empty() {
            return plain.to_string();
        }
    }
    String::new()
}

/// Bounded preview of a body, truncated at a character limit with an
/// ellipsis.
pub fn truncate_snippet(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= SNIPPET_MAX_CHARS {
        return trimmed.to_string();
    }
    let mut preview: String = trimmed.chars().take(SNIPPET_MAX_CHARS - 1).collect();
    preview.push('…');
    preview
}

/// Best-effort address for a credential, probing profile fields, the profile
/// and raw data objects, the label, and finally the supplied fallback.
pub fn derive_credential_email(credential: &Value, fallback_label: &str) -> String {
    let profile = field(credential, "profile");
    let data = field(credential, "data");
    let fallback = Value::String(fallback_label.to_string());
    let candidates: [Option<&Value>; 9] = [
        profile.and_then(|p| field(p, "email")),
        profile.and_then(|p| field(p, "emails")),
        profile.and_then(|p| field(p, "accountEmail")),
        profile.and_then(|p| field(p, "accountName")),
        profile,
        field(credential, "label"),
        data.and_then(|d| field(d, "email")),
        data,
        Some(&fallback),
    ];

    let email = candidates
        .into_iter()
        .flatten()
        .map(extract_email_address)
        .find(|email| !email.is_empty())
        .unwrap_or_default();
    email
}

/// Display label for a credential: profile account name, else label, else app
/// key, else id.
pub fn resolve_credential_label(credential: &Value) -> String {
    if !credential.is_object() {
        return String::new();
    }
    field(credential, "profile")
        .and_then(|profile| field(profile, "accountName"))
        .and_then(as_non_empty_str)
        .or_else(|| field(credential, "label").and_then(as_non_empty_str))
        .or_else(|| field(credential, "appKey").and_then(as_non_empty_str))
        .or_else(|| field(credential, "id").and_then(as_non_empty_str))
        .map(str::to_string)
        .unwrap_or_default()
}

/// Normalized label + address view of one credential payload.
pub fn normalize_credential(credential: &Value) -> CredentialProfile {
    let label = resolve_credential_label(credential);
    let email = derive_credential_email(credential, &label);
    CredentialProfile { label, email }
}

/// Canonical message record from one raw list entry. `index` seeds the
/// synthesized id when the payload carries none.
pub fn normalize_message(message: &Value, index: usize) -> Message {
    if !message.is_object() {
        return Message {
            id: format!("message-{index}"),
            thread_id: None,
            subject: message
                .as_str()
                .map(str::to_string)
                .unwrap_or_default(),
            from: "Unknown sender".to_string(),
            from_email: String::new(),
            snippet: String::new(),
            received_at: String::new(),
            body: String::new(),
        };
    }

    let id = MESSAGE_ID_KEYS
        .iter()
        .filter_map(|key| field(message, key))
        .find_map(as_non_empty_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("message-{index}"));

    let subject = field(message, "subject")
        .and_then(as_non_empty_str)
        .or_else(|| field(message, "snippet").and_then(as_non_empty_str))
        .or_else(|| field(message, "preview").and_then(as_non_empty_str))
        .unwrap_or("(No subject)")
        .to_string();

    let mut from_display = String::new();
    let mut from_email = String::new();
    for key in SENDER_KEYS {
        let Some(source) = field(message, key) else {
            continue;
        };
        let details = extract_sender_details(source);
        if from_display.is_empty() && !details.display.is_empty() {
            from_display = details.display;
        }
        if from_email.is_empty() && !details.email.is_empty() {
            from_email = details.email;
        }
        if !from_display.is_empty() && !from_email.is_empty() {
            break;
        }
    }

    let body = extract_body_text(message);

    let snippet = SNIPPET_KEYS
        .iter()
        .filter_map(|key| field(message, key))
        .find_map(as_non_empty_str)
        .map(str::to_string)
        .unwrap_or_else(|| truncate_snippet(&body));

    let received_at = RECEIVED_AT_KEYS
        .iter()
        .filter_map(|key| field(message, key))
        .find_map(as_non_empty_str)
        .map(str::to_string)
        .unwrap_or_default();

    let from = if !from_display.is_empty() {
        from_display
    } else if !from_email.is_empty() {
        from_email.clone()
    } else {
        "Unknown sender".to_string()
    };

    Message {
        id,
        thread_id: field(message, "threadId")
            .and_then(as_non_empty_str)
            .map(str::to_string),
        subject,
        from,
        from_email,
        snippet,
        received_at,
        body,
    }
}

/// Raw message entries from a list payload, whatever wrapper key the
/// provider used.
pub fn extract_message_list(payload: &Value) -> Vec<Value> {
    extract_wrapped_list(payload, MESSAGE_LIST_KEYS)
}

/// Raw credential entries from a credentials payload.
pub fn extract_credential_list(payload: &Value) -> Vec<Value> {
    extract_wrapped_list(payload, CREDENTIAL_LIST_KEYS)
}

fn extract_wrapped_list(payload: &Value, candidate_keys: &[&str]) -> Vec<Value> {
    if let Value::Array(entries) = payload {
        return entries.clone();
    }
    let Some(map) = payload.as_object() else {
        return Vec::new();
    };
    for key in candidate_keys {
        if let Some(Value::Array(entries)) = map.get(*key) {
            return entries.clone();
        }
    }
    // Fall back to the first array-valued field.
    map.values()
        .find_map(|value| value.as_array().cloned())
        .unwrap_or_default()
}

/// Opaque continuation token from a list payload; absence or blank signals
/// the last page.
pub fn extract_next_cursor(payload: &Value) -> Option<String> {
    field(payload, "_metadata")
        .and_then(|metadata| field(metadata, "next"))
        .and_then(as_non_empty_str)
        .map(str::to_string)
}
