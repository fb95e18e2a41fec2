//! Rule matching: picks at most one mock rule for an outbound call.

use crate::config::{MatchType, MockRule};
use regex::Regex;
use std::sync::Arc;
use tracing::{trace, warn};

/// A rule together with its pre-compiled URL pattern.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub rule: Arc<MockRule>,
    pattern: UrlPattern,
}

#[derive(Debug, Clone)]
enum UrlPattern {
    Exact(String),
    Contains(String),
    Regex(Regex),
    /// Invalid regex or unknown match type
    Never,
}

impl CompiledRule {
    /// Compile a rule. Never fails: a pattern that cannot be compiled yields
    /// a rule that never matches.
    pub fn compile(rule: MockRule) -> Self {
        let pattern = match rule.match_type {
            MatchType::Exact => UrlPattern::Exact(rule.url.clone()),
            MatchType::Contains => UrlPattern::Contains(rule.url.clone()),
            MatchType::Regex => match Regex::new(&rule.url) {
                Ok(regex) => UrlPattern::Regex(regex),
                Err(e) => {
                    warn!(
                        "Rule '{}' has an invalid regex '{}', it will never match: {}",
                        rule.id, rule.url, e
                    );
                    UrlPattern::Never
                }
            },
            MatchType::Unknown => {
                warn!("Rule '{}' has an unknown match type, it will never match", rule.id);
                UrlPattern::Never
            }
        };

        CompiledRule {
            rule: Arc::new(rule),
            pattern,
        }
    }

    pub fn id(&self) -> &str {
        &self.rule.id
    }

    pub fn matches(&self, url: &str, method: &str) -> bool {
        if !self.rule.enabled {
            trace!("Rule disabled: {}", self.rule.id);
            return false;
        }

        if !self.rule.matches_any_method() && !self.rule.method.eq_ignore_ascii_case(method) {
            trace!(
                "Method mismatch - rule: {}, request: {}",
                self.rule.method,
                method
            );
            return false;
        }

        let url_matches = match &self.pattern {
            UrlPattern::Exact(exact) => url == exact,
            UrlPattern::Contains(needle) => url.contains(needle.as_str()),
            UrlPattern::Regex(regex) => regex.is_match(url),
            UrlPattern::Never => false,
        };
        trace!("URL match result for rule {}: {}", self.rule.id, url_matches);
        url_matches
    }
}

/// An immutable snapshot of the rule table plus the global switch.
///
/// Snapshots are shared behind `Arc` and replaced whole, never patched.
#[derive(Debug, Clone, Default)]
pub struct MockState {
    rules: Vec<CompiledRule>,
    enabled: bool,
}

impl MockState {
    pub fn new(rules: Vec<MockRule>, enabled: bool) -> Self {
        Self {
            rules: rules.into_iter().map(CompiledRule::compile).collect(),
            enabled,
        }
    }

    /// The state every store starts in and falls back to.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Return the first enabled rule, in store order, whose method and URL
/// pattern accept the call. A disabled state never matches.
pub fn find_matching_rule(url: &str, method: &str, state: &MockState) -> Option<Arc<MockRule>> {
    if !state.enabled {
        trace!("Mocking is disabled globally");
        return None;
    }

    state
        .rules
        .iter()
        .find(|rule| rule.matches(url, method))
        .map(|rule| Arc::clone(&rule.rule))
}
