//! Core types for the linting library.

use serde::Serialize;
use std::path::{Path, PathBuf};

/// Severity level of a lint issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The rule file cannot be loaded, or a rule can never behave as written.
    Error,
    /// The rule loads but probably does not do what its author meant.
    Warning,
    Info,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

/// A single lint issue found in a rule file.
#[derive(Debug, Clone, Serialize)]
pub struct LintIssue {
    pub severity: Severity,
    /// Stable code (e.g. "E012", "W015")
    pub code: String,
    pub message: String,
    #[serde(serialize_with = "serialize_path")]
    pub file: PathBuf,
    /// Path inside the document (e.g. "mockRules[2].url")
    pub location: Option<String>,
    pub suggestion: Option<String>,
    /// `--fix` can repair this issue mechanically
    pub fixable: bool,
}

fn serialize_path<S>(path: &Path, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&path.to_string_lossy())
}

impl LintIssue {
    fn new(
        severity: Severity,
        code: impl Into<String>,
        message: impl Into<String>,
        file: PathBuf,
    ) -> Self {
        Self {
            severity,
            code: code.into(),
            message: message.into(),
            file,
            location: None,
            suggestion: None,
            fixable: false,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>, file: PathBuf) -> Self {
        Self::new(Severity::Error, code, message, file)
    }

    pub fn warning(code: impl Into<String>, message: impl Into<String>, file: PathBuf) -> Self {
        Self::new(Severity::Warning, code, message, file)
    }

    pub fn info(code: impl Into<String>, message: impl Into<String>, file: PathBuf) -> Self {
        Self::new(Severity::Info, code, message, file)
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn fixable(mut self) -> Self {
        self.fixable = true;
        self
    }
}

/// Result of linting one or more rule files.
#[derive(Debug, Default, Serialize)]
pub struct LintResult {
    pub issues: Vec<LintIssue>,
    pub files_checked: usize,
    /// Rules inspected across all files
    pub rules_checked: usize,
    pub errors: usize,
    pub warnings: usize,
}

impl LintResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_issue(&mut self, issue: LintIssue) {
        match issue.severity {
            Severity::Error => self.errors += 1,
            Severity::Warning => self.warnings += 1,
            Severity::Info => {}
        }
        self.issues.push(issue);
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    pub fn has_warnings(&self) -> bool {
        self.warnings > 0
    }

    /// No errors, and no warnings either when `strict`.
    pub fn passes(&self, strict: bool) -> bool {
        self.errors == 0 && !(strict && self.warnings > 0)
    }

    pub fn has_fixable(&self) -> bool {
        self.issues.iter().any(|issue| issue.fixable)
    }

    /// Issues carrying `code`, in discovery order.
    pub fn with_code<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a LintIssue> + 'a {
        self.issues.iter().filter(move |issue| issue.code == code)
    }

    pub fn merge(&mut self, other: LintResult) {
        self.issues.extend(other.issues);
        self.files_checked += other.files_checked;
        self.rules_checked += other.rules_checked;
        self.errors += other.errors;
        self.warnings += other.warnings;
    }
}

/// Options for validation.
#[derive(Debug, Clone, Default)]
pub struct LintOptions {
    /// Enable verbose output (for CLI).
    pub verbose: bool,
    /// Skip the unknown-field check (W016).
    pub allow_unknown_fields: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_and_strictness() {
        let mut result = LintResult::new();
        result.add_issue(LintIssue::warning("W012", "lower-case", PathBuf::from("a.json")).fixable());
        result.add_issue(LintIssue::info("I020", "string rules", PathBuf::from("a.json")));

        assert_eq!(result.warnings, 1);
        assert!(!result.has_errors());
        assert!(result.passes(false));
        assert!(!result.passes(true));
        assert!(result.has_fixable());
        assert_eq!(result.with_code("I020").count(), 1);
    }

    #[test]
    fn test_merge() {
        let mut total = LintResult::new();
        let mut other = LintResult::new();
        other.files_checked = 1;
        other.rules_checked = 3;
        other.add_issue(LintIssue::error("E008", "missing id", PathBuf::from("b.json")));

        total.merge(other);

        assert_eq!(total.files_checked, 1);
        assert_eq!(total.rules_checked, 3);
        assert_eq!(total.errors, 1);
        assert!(!total.passes(false));
    }
}
