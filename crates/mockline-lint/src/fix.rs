//! Mechanical repairs for the issues marked `fixable`.

use crate::validator::KNOWN_METHODS;
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum FixError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Apply every mechanical fix to a parsed rule file. Returns one line per
/// change made.
pub fn fix_value(document: &mut Value) -> Vec<String> {
    let mut applied = Vec::new();

    if let Some(object) = document.as_object_mut() {
        if let Some(Value::String(text)) = object.get("mockRules") {
            if let Ok(rules @ Value::Array(_)) = serde_json::from_str::<Value>(text) {
                object.insert("mockRules".to_string(), rules);
                applied.push("mockRules: JSON text -> list".to_string());
            }
        }
    }

    let (rules, prefix) = match document {
        Value::Array(rules) => (rules, ""),
        Value::Object(object) => match object.get_mut("mockRules") {
            Some(Value::Array(rules)) => (rules, "mockRules"),
            _ => return applied,
        },
        _ => return applied,
    };

    for (idx, rule) in rules.iter_mut().enumerate() {
        let Some(rule) = rule.as_object_mut() else {
            continue;
        };

        if let Some(Value::String(method)) = rule.get_mut("method") {
            let upper = method.to_ascii_uppercase();
            if upper != *method && KNOWN_METHODS.contains(&upper.as_str()) {
                applied.push(format!("{prefix}[{idx}].method: '{method}' -> '{upper}'"));
                *method = upper;
            }
        }

        if let Some(delay) = rule.get_mut("delay") {
            if delay.as_f64().is_some_and(|ms| ms < 0.0) {
                applied.push(format!("{prefix}[{idx}].delay: {delay} -> 0"));
                *delay = Value::from(0);
            }
        }
    }

    applied
}

/// Fix a rule file in place. The file is only rewritten when something changed.
pub fn fix_file(path: &Path) -> Result<Vec<String>, FixError> {
    let io_err = |source| FixError::Io {
        path: path.to_path_buf(),
        source,
    };
    let json_err = |source| FixError::Json {
        path: path.to_path_buf(),
        source,
    };

    let content = std::fs::read_to_string(path).map_err(io_err)?;
    let mut document: Value = serde_json::from_str(&content).map_err(json_err)?;

    let applied = fix_value(&mut document);
    if !applied.is_empty() {
        let fixed = serde_json::to_string_pretty(&document).map_err(json_err)?;
        std::fs::write(path, fixed + "\n").map_err(io_err)?;
    }
    Ok(applied)
}
