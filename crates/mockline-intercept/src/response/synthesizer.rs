//! Turns a matched rule into a concrete response.

use crate::config::MockRule;
use crate::template;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

/// Diagnostic header carrying the id of the rule that produced the response.
pub const RULE_ID_HEADER: &str = "X-Mock-Rule";

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_TEXT: &str = "text/plain";

#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedResponse {
    pub status: u16,
    pub status_text: String,
    /// Ordered `(name, value)` pairs
    pub headers: Vec<(String, String)>,
    pub body: String,
    /// How long the caller should wait before completing; never slept here
    pub delay: Duration,
}

impl SynthesizedResponse {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }
}

/// Fixed status line lookup; unlisted codes map to `Unknown`.
pub fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

pub fn synthesize(rule: &MockRule) -> SynthesizedResponse {
    let resolved = resolve_body(&rule.response);
    let (body, content_type) = serialize_body(resolved);

    SynthesizedResponse {
        status: rule.status,
        status_text: status_text(rule.status).to_string(),
        headers: vec![
            ("Content-Type".to_string(), content_type.to_string()),
            (RULE_ID_HEADER.to_string(), rule.id.clone()),
        ],
        body,
        delay: Duration::from_millis(rule.delay),
    }
}

/// Decode and realize the response template. Any failure yields the
/// response exactly as the rule stores it.
fn resolve_body(response: &Value) -> Value {
    let template = match response {
        Value::String(raw) => {
            serde_json::from_str::<Value>(raw).unwrap_or_else(|_| response.clone())
        }
        other => other.clone(),
    };

    match template::realize(&template) {
        Ok(realized) => realized,
        Err(e) => {
            warn!("Failed to process mock template, using raw response: {}", e);
            response.clone()
        }
    }
}

fn serialize_body(value: Value) -> (String, &'static str) {
    match value {
        Value::Object(_) | Value::Array(_) => (value.to_string(), CONTENT_TYPE_JSON),
        Value::String(text) => {
            let content_type = if serde_json::from_str::<Value>(&text).is_ok() {
                CONTENT_TYPE_JSON
            } else {
                CONTENT_TYPE_TEXT
            };
            (text, content_type)
        }
        primitive => (primitive.to_string(), CONTENT_TYPE_TEXT),
    }
}
