//! Extension-side key/value persistence and the rule request handler.

mod memory;
mod rules;

pub use memory::MemoryStore;
pub use rules::{
    delete_mock_rule, export_mock_rules, import_mock_rules, save_mock_rule, toggle_mock_enabled,
    ImportMode,
};

use anyhow::Result;
use serde_json::{json, Map, Value};
use tracing::{debug, error, warn};

pub const MOCK_RULES_KEY: &str = "mockRules";
pub const IS_ENABLED_KEY: &str = "isEnabled";

/// Backend-agnostic storage for extension settings.
///
/// Synchronous so it can be called from the relay loop and the CLI alike.
pub trait KeyValueStore: Send + Sync {
    /// Read the given keys. Missing keys are absent from the result.
    fn get(&self, keys: &[&str]) -> Result<Map<String, Value>>;

    /// Merge `partial` into the stored values.
    fn set(&self, partial: Map<String, Value>) -> Result<()>;
}

/// Answer a rule request from persistence.
///
/// `mockRules` may be stored as a list or as JSON-encoded text; anything else
/// reads as no rules. A missing `isEnabled` means enabled. Store failures
/// answer with an empty, disabled payload.
pub fn get_mock_rules(store: &dyn KeyValueStore) -> Value {
    let stored = match store.get(&[MOCK_RULES_KEY, IS_ENABLED_KEY]) {
        Ok(stored) => stored,
        Err(e) => {
            error!("Failed to read mock rules from storage: {:#}", e);
            return json!({ MOCK_RULES_KEY: [], IS_ENABLED_KEY: false });
        }
    };

    let rules = Value::Array(decode_rules(stored.get(MOCK_RULES_KEY)));

    let enabled = match stored.get(IS_ENABLED_KEY) {
        None | Some(Value::Null) => true,
        Some(value) => crate::store::is_truthy(Some(value)),
    };

    debug!(
        rules = rules.as_array().map_or(0, Vec::len),
        enabled, "Serving mock rules"
    );
    json!({ MOCK_RULES_KEY: rules, IS_ENABLED_KEY: enabled })
}

/// Stored `mockRules` as a list: a list as is, JSON text decoded, anything
/// else empty.
pub(crate) fn decode_rules(stored: Option<&Value>) -> Vec<Value> {
    match stored {
        Some(Value::Array(rules)) => rules.clone(),
        Some(Value::String(text)) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Array(rules)) => rules,
            Ok(other) => {
                warn!("Stored mock rules decode to {}, expected a list", other);
                Vec::new()
            }
            Err(e) => {
                warn!("Stored mock rules are not valid JSON: {}", e);
                Vec::new()
            }
        },
        Some(other) => {
            warn!("Ignoring stored mock rules of unexpected shape: {}", other);
            Vec::new()
        }
        None => Vec::new(),
    }
}
