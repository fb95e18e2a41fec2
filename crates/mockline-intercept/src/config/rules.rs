//! Mock rule definitions.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Method value that matches every HTTP verb.
pub const METHOD_WILDCARD: &str = "ALL";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MockRule {
    pub id: String,
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    /// Missing means `Unknown`: a rule must say how its url is compared
    #[serde(default)]
    pub match_type: MatchType,
    #[serde(default = "default_status", deserialize_with = "deserialize_status")]
    pub status: u16,
    /// Milliseconds to wait before completing the mock response
    #[serde(default, deserialize_with = "deserialize_delay")]
    pub delay: u64,
    /// Template value: structured JSON, a JSON-encoded string, or plain text
    #[serde(default)]
    pub response: Value,
    #[serde(default)]
    pub enabled: bool,
}

impl MockRule {
    /// True when the rule accepts any HTTP verb.
    pub fn matches_any_method(&self) -> bool {
        self.method.eq_ignore_ascii_case(METHOD_WILDCARD) || self.method == "*"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Contains,
    Exact,
    Regex,
    /// Absent, or anything else on the wire; such rules never match
    #[default]
    #[serde(other)]
    Unknown,
}

fn default_method() -> String {
    METHOD_WILDCARD.to_string()
}

fn default_status() -> u16 {
    200
}

/// Status `0` (or a missing/garbage status) is served as 200.
fn deserialize_status<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    let status = raw
        .as_u64()
        .or_else(|| raw.as_f64().map(|f| f as u64))
        .or_else(|| raw.as_str().and_then(|s| s.trim().parse::<u64>().ok()))
        .unwrap_or(0);
    match u16::try_from(status) {
        Ok(0) => Ok(default_status()),
        Ok(code) => Ok(code),
        // Out of range for any transport; kept so adapters can reject it
        Err(_) => Ok(u16::MAX),
    }
}

/// Negative delays clamp to zero, fractional delays truncate.
fn deserialize_delay<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    let delay = match &raw {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if delay.is_finite() && delay > 0.0 {
        Ok(delay as u64)
    } else {
        Ok(0)
    }
}
