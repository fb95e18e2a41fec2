//! Rule editing on top of a [`KeyValueStore`].
//!
//! Rules are kept as raw JSON so fields the engine does not know survive a
//! save. Rule ids are unique in storage: saving or importing a rule whose id
//! is already stored replaces it in place, so the last write wins.

use super::{decode_rules, KeyValueStore, IS_ENABLED_KEY, MOCK_RULES_KEY};
use anyhow::{bail, Result};
use serde_json::{Map, Value};
use tracing::{debug, info};

/// How imported rules combine with the stored ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportMode {
    /// Upsert by id, keeping stored rules the import does not mention
    #[default]
    Merge,
    /// Discard every stored rule first
    Replace,
}

fn rule_id(rule: &Value) -> Option<&str> {
    rule.get("id").and_then(Value::as_str)
}

fn stored_rules(store: &dyn KeyValueStore) -> Result<Vec<Value>> {
    let stored = store.get(&[MOCK_RULES_KEY])?;
    Ok(decode_rules(stored.get(MOCK_RULES_KEY)))
}

fn write_rules(store: &dyn KeyValueStore, rules: Vec<Value>) -> Result<()> {
    store.set(Map::from_iter([(
        MOCK_RULES_KEY.to_string(),
        Value::Array(rules),
    )]))
}

/// Replace the rule carrying the same id, or append it.
fn upsert(rules: &mut Vec<Value>, rule: Value) {
    let existing = rule_id(&rule)
        .and_then(|id| rules.iter().position(|stored| rule_id(stored) == Some(id)));
    match existing {
        Some(idx) => rules[idx] = rule,
        None => rules.push(rule),
    }
}

/// Insert a rule, or overwrite the stored rule with the same id.
pub fn save_mock_rule(store: &dyn KeyValueStore, rule: Value) -> Result<()> {
    let Some(id) = rule_id(&rule).filter(|id| !id.is_empty()) else {
        bail!("Mock rule must be an object with a non-empty string id");
    };
    debug!("Saving mock rule {}", id);

    let mut rules = stored_rules(store)?;
    upsert(&mut rules, rule);
    write_rules(store, rules)
}

/// Remove the rule with `id`. Returns false when no such rule was stored.
pub fn delete_mock_rule(store: &dyn KeyValueStore, id: &str) -> Result<bool> {
    let mut rules = stored_rules(store)?;
    let before = rules.len();
    rules.retain(|rule| rule_id(rule) != Some(id));

    let removed = rules.len() != before;
    if removed {
        write_rules(store, rules)?;
    }
    Ok(removed)
}

pub fn toggle_mock_enabled(store: &dyn KeyValueStore, enabled: bool) -> Result<()> {
    info!("Mocking {}", if enabled { "enabled" } else { "disabled" });
    store.set(Map::from_iter([(
        IS_ENABLED_KEY.to_string(),
        Value::Bool(enabled),
    )]))
}

/// The stored rules as a list, ready to be written to a rule file.
pub fn export_mock_rules(store: &dyn KeyValueStore) -> Result<Vec<Value>> {
    stored_rules(store)
}

/// Store `rules` according to `mode`. Returns the number of rules stored
/// afterwards.
pub fn import_mock_rules(
    store: &dyn KeyValueStore,
    rules: Vec<Value>,
    mode: ImportMode,
) -> Result<usize> {
    let mut merged = match mode {
        ImportMode::Replace => Vec::with_capacity(rules.len()),
        ImportMode::Merge => stored_rules(store)?,
    };
    let imported = rules.len();
    for rule in rules {
        upsert(&mut merged, rule);
    }

    let total = merged.len();
    info!("Imported {} rule(s) ({:?}), {} stored", imported, mode, total);
    write_rules(store, merged)?;
    Ok(total)
}
