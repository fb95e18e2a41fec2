//! Rule file linting library for Mockline.
//!
//! Rule files are either a bare JSON list of mock rules or an object with
//! `mockRules` (a list, or the same list as JSON text) and `isEnabled`. The
//! linter reports problems the interception engine would silently tolerate:
//! rules that are skipped, never match, or are shadowed by earlier ones.
//!
//! | Code | Meaning |
//! |------|---------|
//! | E001 | File or directory cannot be read |
//! | E002 | Invalid JSON |
//! | E003 | Top level is neither a list nor an object |
//! | E004 | `mockRules` text is not a JSON list |
//! | E005 | `mockRules` is neither a list nor text |
//! | E006 | Directory contains no rule files |
//! | E007 | Rule is not an object |
//! | E008 | Rule has no id |
//! | E009 | Duplicate rule id |
//! | E010 | Missing or non-string url |
//! | E011 | Missing or unknown matchType |
//! | E012 | Regex url does not compile |
//! | E013 | Status is not a non-negative integer |
//! | E014 | Status outside 100..=999 |
//! | E015 | Delay is not a number |
//! | E016 | Negative delay (fixable) |
//! | E017 | Method is not a string |
//! | E018 | Invalid template generation rule (bad range, repeat over 10000, overflow) |
//! | W010 | `isEnabled` is not a boolean |
//! | W011 | Empty url matches everything |
//! | W012 | Lower-case method (fixable) |
//! | W013 | Unusual HTTP method |
//! | W014 | Rule is not explicitly enabled |
//! | W015 | Rule is shadowed by an earlier rule |
//! | W016 | Unknown rule field |
//! | I020 | `mockRules` stored as JSON text (fixable) |
//!
//! # Example
//!
//! ```no_run
//! use mockline_lint::{lint_file, LintOptions};
//! use std::path::Path;
//!
//! let result = lint_file(Path::new("rules.json"), &LintOptions::default());
//! if result.has_errors() {
//!     eprintln!("Found {} errors", result.errors);
//! }
//! ```

mod fix;
mod types;
mod validator;

use std::path::Path;

pub use fix::{fix_file, fix_value, FixError};
pub use types::{LintIssue, LintOptions, LintResult, Severity};
pub use validator::{validate_response_template, validate_rule, validate_rule_file, KNOWN_METHODS};

/// Lint a single rule file.
pub fn lint_file(path: &Path, options: &LintOptions) -> LintResult {
    let mut result = LintResult::new();
    result.files_checked = 1;

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            result.add_issue(LintIssue::error(
                "E001",
                format!("Failed to read file: {e}"),
                path.to_path_buf(),
            ));
            return result;
        }
    };

    let value: serde_json::Value = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            result.add_issue(
                LintIssue::error("E002", format!("Invalid JSON: {e}"), path.to_path_buf())
                    .with_suggestion("Check for JSON syntax errors"),
            );
            return result;
        }
    };

    validate_rule_file(path, &value, &mut result, options);
    result
}

/// Lint all JSON files in a directory (non-recursive), in name order.
pub fn lint_directory(path: &Path, options: &LintOptions) -> LintResult {
    let mut result = LintResult::new();

    let entries = match std::fs::read_dir(path) {
        Ok(e) => e,
        Err(e) => {
            result.add_issue(LintIssue::error(
                "E001",
                format!("Failed to read directory: {e}"),
                path.to_path_buf(),
            ));
            return result;
        }
    };

    let mut files: Vec<_> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|file| file.is_file() && file.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();

    if files.is_empty() {
        result.add_issue(
            LintIssue::error("E006", "No rule files (*.json) found", path.to_path_buf())
                .with_suggestion("Point the linter at a rule file or a directory of them"),
        );
    }

    for file in files {
        result.merge(lint_file(&file, options));
    }

    result
}

/// Lint a file or every rule file in a directory.
pub fn lint_path(path: &Path, options: &LintOptions) -> LintResult {
    if path.is_dir() {
        lint_directory(path, options)
    } else {
        lint_file(path, options)
    }
}

/// Lint a JSON string directly (useful for in-memory validation).
pub fn lint_json(json: &str, source_name: &str, options: &LintOptions) -> LintResult {
    let mut result = LintResult::new();
    result.files_checked = 1;

    let path = Path::new(source_name);

    let value: serde_json::Value = match serde_json::from_str(json) {
        Ok(v) => v,
        Err(e) => {
            result.add_issue(LintIssue::error(
                "E002",
                format!("Invalid JSON: {e}"),
                path.to_path_buf(),
            ));
            return result;
        }
    };

    validate_rule_file(path, &value, &mut result, options);
    result
}

/// Lint a parsed JSON value directly.
pub fn lint_value(
    value: &serde_json::Value,
    source_name: &str,
    options: &LintOptions,
) -> LintResult {
    let mut result = LintResult::new();
    result.files_checked = 1;

    validate_rule_file(Path::new(source_name), value, &mut result, options);
    result
}
