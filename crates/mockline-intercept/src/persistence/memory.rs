use super::{KeyValueStore, IS_ENABLED_KEY, MOCK_RULES_KEY};
use anyhow::{bail, Context, Result};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::path::Path;

/// In-memory implementation of KeyValueStore
///
/// Useful for testing, the CLI, and single-process setups.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<Map<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store from a rule file: either a bare list of rules, or an
    /// object carrying `mockRules` (list or JSON text) and `isEnabled`.
    pub fn from_rule_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read rule file {}", path.display()))?;
        let value: Value = serde_json::from_str(&contents)
            .with_context(|| format!("Rule file {} is not valid JSON", path.display()))?;

        let mut seed = Map::new();
        match value {
            Value::Array(rules) => {
                seed.insert(MOCK_RULES_KEY.to_string(), Value::Array(rules));
            }
            Value::Object(mut object) => {
                for key in [MOCK_RULES_KEY, IS_ENABLED_KEY] {
                    if let Some(value) = object.remove(key) {
                        seed.insert(key.to_string(), value);
                    }
                }
            }
            other => bail!(
                "Rule file {} must hold a list of rules or an object, found {}",
                path.display(),
                other
            ),
        }

        let store = Self::new();
        store.set(seed)?;
        Ok(store)
    }

    /// Write the stored `mockRules` and `isEnabled` back as a rule file.
    pub fn write_rule_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let document = Value::Object(self.get(&[MOCK_RULES_KEY, IS_ENABLED_KEY])?);
        let contents = serde_json::to_string_pretty(&document)?;
        std::fs::write(path, contents + "\n")
            .with_context(|| format!("Failed to write rule file {}", path.display()))
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, keys: &[&str]) -> Result<Map<String, Value>> {
        let data = self.data.read();
        Ok(keys
            .iter()
            .filter_map(|key| data.get(*key).map(|value| (key.to_string(), value.clone())))
            .collect())
    }

    fn set(&self, partial: Map<String, Value>) -> Result<()> {
        self.data.write().extend(partial);
        Ok(())
    }
}
