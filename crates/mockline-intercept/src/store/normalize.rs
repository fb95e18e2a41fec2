//! Payload normalization for rule snapshots.
//!
//! Rule lists cross several boundaries (persistence, relay, push updates) and
//! may arrive as a structured list, as a JSON-encoded string of a list, or not
//! at all. Everything funnels through [`normalize_rules`], which always yields
//! a list and never fails.

use crate::config::MockRule;
use crate::matcher::MockState;
use serde_json::Value;
use tracing::warn;

/// Accepts a structured list, a JSON string holding a list, or anything else.
/// Returns the readable rules in their original order; empty on any failure.
pub fn normalize_rules(raw: Option<&Value>) -> Vec<MockRule> {
    let parsed;
    let items = match raw {
        Some(Value::Array(items)) => items,
        Some(Value::String(encoded)) => match serde_json::from_str::<Value>(encoded) {
            Ok(Value::Array(items)) => {
                parsed = items;
                &parsed
            }
            Ok(other) => {
                warn!("mockRules string does not hold a list: {}", type_name(&other));
                return Vec::new();
            }
            Err(e) => {
                warn!("Failed to parse mockRules string: {}", e);
                return Vec::new();
            }
        },
        Some(Value::Null) | None => return Vec::new(),
        Some(other) => {
            warn!("Unexpected mockRules format: {}", type_name(other));
            return Vec::new();
        }
    };

    items
        .iter()
        .enumerate()
        .filter_map(
            |(idx, item)| match serde_json::from_value::<MockRule>(item.clone()) {
                Ok(rule) => Some(rule),
                Err(e) => {
                    warn!("Skipping unreadable rule at index {}: {}", idx, e);
                    None
                }
            },
        )
        .collect()
}

/// Turn a `{mockRules, isEnabled}` payload into a rule snapshot.
///
/// Anything that is not an object yields the empty, disabled state.
pub fn normalize_payload(payload: &Value) -> MockState {
    match payload.as_object() {
        Some(object) => MockState::new(
            normalize_rules(object.get("mockRules")),
            is_truthy(object.get("isEnabled")),
        ),
        None => {
            warn!("Invalid rule payload received: {}", type_name(payload));
            MockState::disabled()
        }
    }
}

/// Truthiness as the rule editor stores it: `false`, `0`, `""` and null are off.
pub(crate) fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
