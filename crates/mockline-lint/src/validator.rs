//! Core validation logic for rule files.

use crate::types::{LintIssue, LintOptions, LintResult};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

pub const KNOWN_METHODS: [&str; 9] = [
    "GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS", "ALL", "*",
];

const MATCH_TYPES: [&str; 3] = ["contains", "exact", "regex"];

/// Largest repeat count the template engine accepts.
const MAX_REPEAT: i64 = 10_000;

const RULE_FIELDS: [&str; 8] = [
    "id",
    "url",
    "method",
    "matchType",
    "status",
    "delay",
    "response",
    "enabled",
];

fn key_rule_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(-?\d+)(?:-(-?\d+))?(?:\.(\d+)(?:-(\d+))?)?$").expect("valid key rule regex")
    })
}

/// Validate a complete rule file: a bare list of rules, or an object with
/// `mockRules` (list or JSON text) and `isEnabled`.
pub fn validate_rule_file(
    file: &Path,
    document: &Value,
    result: &mut LintResult,
    options: &LintOptions,
) {
    match document {
        Value::Array(rules) => validate_rules(file, rules, "", result, options),
        Value::Object(object) => validate_envelope(file, object, result, options),
        other => {
            result.add_issue(
                LintIssue::error(
                    "E003",
                    format!("Rule file must be a list of rules or an object, found {}", type_name(other)),
                    file.to_path_buf(),
                )
                .with_suggestion("Wrap the rules in [ ... ] or {\"mockRules\": [ ... ]}"),
            );
        }
    }
}

fn validate_envelope(
    file: &Path,
    object: &Map<String, Value>,
    result: &mut LintResult,
    options: &LintOptions,
) {
    match object.get("isEnabled") {
        None | Some(Value::Bool(_)) => {}
        Some(other) => {
            result.add_issue(
                LintIssue::warning(
                    "W010",
                    format!("isEnabled is {} rather than a boolean", type_name(other)),
                    file.to_path_buf(),
                )
                .with_location("isEnabled")
                .with_suggestion("Use true or false; other values are read by truthiness"),
            );
        }
    }

    match object.get("mockRules") {
        None => {}
        Some(Value::Array(rules)) => validate_rules(file, rules, "mockRules", result, options),
        Some(Value::String(text)) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Array(rules)) => {
                result.add_issue(
                    LintIssue::info(
                        "I020",
                        "mockRules is stored as JSON text",
                        file.to_path_buf(),
                    )
                    .with_location("mockRules")
                    .with_suggestion("Store the rules as a list")
                    .fixable(),
                );
                validate_rules(file, &rules, "mockRules", result, options);
            }
            Ok(other) => {
                result.add_issue(
                    LintIssue::error(
                        "E004",
                        format!("mockRules text decodes to {}, not a list", type_name(&other)),
                        file.to_path_buf(),
                    )
                    .with_location("mockRules"),
                );
            }
            Err(e) => {
                result.add_issue(
                    LintIssue::error(
                        "E004",
                        format!("mockRules text is not valid JSON: {e}"),
                        file.to_path_buf(),
                    )
                    .with_location("mockRules")
                    .with_suggestion("The engine will load no rules from this file"),
                );
            }
        },
        Some(other) => {
            result.add_issue(
                LintIssue::error(
                    "E005",
                    format!("mockRules must be a list, found {}", type_name(other)),
                    file.to_path_buf(),
                )
                .with_location("mockRules"),
            );
        }
    }
}

fn validate_rules(
    file: &Path,
    rules: &[Value],
    prefix: &str,
    result: &mut LintResult,
    options: &LintOptions,
) {
    let mut seen_ids: HashMap<&str, usize> = HashMap::new();

    for (idx, rule) in rules.iter().enumerate() {
        let location = if prefix.is_empty() {
            format!("[{idx}]")
        } else {
            format!("{prefix}[{idx}]")
        };
        result.rules_checked += 1;

        validate_rule(file, rule, &location, result, options);

        if let Some(id) = rule.get("id").and_then(|v| v.as_str()).filter(|id| !id.is_empty()) {
            if let Some(first) = seen_ids.insert(id, idx) {
                result.add_issue(
                    LintIssue::error(
                        "E009",
                        format!("Duplicate rule id '{id}' (first used by rule {first})"),
                        file.to_path_buf(),
                    )
                    .with_location(format!("{location}.id"))
                    .with_suggestion("Rule ids must be unique; the X-Mock-Rule header would be ambiguous"),
                );
            }
        }
    }

    check_shadowed_rules(file, rules, prefix, result);
}

/// Validate a single rule.
pub fn validate_rule(
    file: &Path,
    rule: &Value,
    location: &str,
    result: &mut LintResult,
    options: &LintOptions,
) {
    let Some(object) = rule.as_object() else {
        result.add_issue(
            LintIssue::error(
                "E007",
                format!("Rule must be an object, found {}", type_name(rule)),
                file.to_path_buf(),
            )
            .with_location(location)
            .with_suggestion("The engine skips this entry"),
        );
        return;
    };

    match object.get("id") {
        Some(Value::String(id)) if !id.is_empty() => {}
        _ => {
            result.add_issue(
                LintIssue::error("E008", "Rule has no id", file.to_path_buf())
                    .with_location(location)
                    .with_suggestion("Give every rule a unique, non-empty string id"),
            );
        }
    }

    validate_url(file, object, location, result);
    validate_method(file, object, location, result);
    validate_status(file, object, location, result);
    validate_delay(file, object, location, result);

    match object.get("enabled") {
        Some(Value::Bool(_)) => {}
        None => {
            result.add_issue(
                LintIssue::warning("W014", "Rule has no 'enabled' flag and will never match", file.to_path_buf())
                    .with_location(location)
                    .with_suggestion("Add \"enabled\": true"),
            );
        }
        Some(other) => {
            result.add_issue(
                LintIssue::warning(
                    "W014",
                    format!("'enabled' is {}, only true enables a rule", type_name(other)),
                    file.to_path_buf(),
                )
                .with_location(format!("{location}.enabled")),
            );
        }
    }

    if let Some(response) = object.get("response") {
        validate_response_template(file, response, &format!("{location}.response"), result);
    }

    if !options.allow_unknown_fields {
        for key in object.keys() {
            if !RULE_FIELDS.contains(&key.as_str()) {
                let suggestion = RULE_FIELDS
                    .iter()
                    .find(|field| field.eq_ignore_ascii_case(key))
                    .map(|field| format!("Did you mean '{field}'?"))
                    .unwrap_or_else(|| format!("Known fields: {}", RULE_FIELDS.join(", ")));
                result.add_issue(
                    LintIssue::warning("W016", format!("Unknown rule field '{key}'"), file.to_path_buf())
                        .with_location(format!("{location}.{key}"))
                        .with_suggestion(suggestion),
                );
            }
        }
    }
}

fn validate_url(file: &Path, rule: &Map<String, Value>, location: &str, result: &mut LintResult) {
    let match_type = match rule.get("matchType") {
        None => {
            result.add_issue(
                LintIssue::error("E011", "Rule has no matchType and will never match", file.to_path_buf())
                    .with_location(location)
                    .with_suggestion(format!("Add \"matchType\" with one of: {}", MATCH_TYPES.join(", "))),
            );
            return;
        }
        Some(Value::String(kind)) if MATCH_TYPES.contains(&kind.as_str()) => kind.as_str(),
        Some(other) => {
            result.add_issue(
                LintIssue::error(
                    "E011",
                    format!("Unknown matchType {other}; the rule will never match"),
                    file.to_path_buf(),
                )
                .with_location(format!("{location}.matchType"))
                .with_suggestion(format!("Use one of: {}", MATCH_TYPES.join(", "))),
            );
            return;
        }
    };

    let url = match rule.get("url") {
        Some(Value::String(url)) => url,
        None => {
            result.add_issue(
                LintIssue::error("E010", "Rule has no url", file.to_path_buf())
                    .with_location(location),
            );
            return;
        }
        Some(other) => {
            result.add_issue(
                LintIssue::error(
                    "E010",
                    format!("url must be a string, found {}", type_name(other)),
                    file.to_path_buf(),
                )
                .with_location(format!("{location}.url")),
            );
            return;
        }
    };

    if url.is_empty() && match_type != "exact" {
        result.add_issue(
            LintIssue::warning("W011", "Empty url matches every request", file.to_path_buf())
                .with_location(format!("{location}.url")),
        );
    }

    if match_type == "regex" {
        if let Err(e) = Regex::new(url) {
            result.add_issue(
                LintIssue::error(
                    "E012",
                    format!("Invalid regex pattern: {e}"),
                    file.to_path_buf(),
                )
                .with_location(format!("{location}.url"))
                .with_suggestion("The rule will never match until the pattern compiles"),
            );
        }
    }
}

fn validate_method(file: &Path, rule: &Map<String, Value>, location: &str, result: &mut LintResult) {
    let method = match rule.get("method") {
        None => return,
        Some(Value::String(method)) => method,
        Some(other) => {
            result.add_issue(
                LintIssue::error(
                    "E017",
                    format!("method must be a string, found {}", type_name(other)),
                    file.to_path_buf(),
                )
                .with_location(format!("{location}.method")),
            );
            return;
        }
    };

    let upper = method.to_ascii_uppercase();
    if !KNOWN_METHODS.contains(&upper.as_str()) {
        result.add_issue(
            LintIssue::warning("W013", format!("Unusual HTTP method '{method}'"), file.to_path_buf())
                .with_location(format!("{location}.method"))
                .with_suggestion(format!("Use one of: {}", KNOWN_METHODS.join(", "))),
        );
    } else if upper != *method {
        result.add_issue(
            LintIssue::warning("W012", format!("Method '{method}' is not upper-case"), file.to_path_buf())
                .with_location(format!("{location}.method"))
                .with_suggestion(format!("Use '{upper}'"))
                .fixable(),
        );
    }
}

fn validate_status(file: &Path, rule: &Map<String, Value>, location: &str, result: &mut LintResult) {
    let Some(status) = rule.get("status") else {
        return;
    };
    let Some(code) = status.as_u64() else {
        result.add_issue(
            LintIssue::error(
                "E013",
                format!("status must be a non-negative integer, found {status}"),
                file.to_path_buf(),
            )
            .with_location(format!("{location}.status"))
            .with_suggestion("Unreadable statuses are served as 200"),
        );
        return;
    };

    if code != 0 && !(100..=999).contains(&code) {
        result.add_issue(
            LintIssue::error(
                "E014",
                format!("Status {code} cannot be sent over HTTP"),
                file.to_path_buf(),
            )
            .with_location(format!("{location}.status"))
            .with_suggestion("fetch calls for this rule fall through to the network"),
        );
    }
}

fn validate_delay(file: &Path, rule: &Map<String, Value>, location: &str, result: &mut LintResult) {
    let Some(delay) = rule.get("delay") else {
        return;
    };
    let Some(ms) = delay.as_f64() else {
        result.add_issue(
            LintIssue::error(
                "E015",
                format!("delay must be a number of milliseconds, found {}", type_name(delay)),
                file.to_path_buf(),
            )
            .with_location(format!("{location}.delay")),
        );
        return;
    };

    if ms < 0.0 {
        result.add_issue(
            LintIssue::error("E016", format!("Negative delay {delay}"), file.to_path_buf())
                .with_location(format!("{location}.delay"))
                .with_suggestion("Use 0 for an immediate response")
                .fixable(),
        );
    }
}

/// Check `name|rule` keys of a response template.
pub fn validate_response_template(
    file: &Path,
    response: &Value,
    location: &str,
    result: &mut LintResult,
) {
    match response {
        Value::String(text) => {
            if let Ok(decoded @ (Value::Object(_) | Value::Array(_))) =
                serde_json::from_str::<Value>(text)
            {
                validate_response_template(file, &decoded, location, result);
            }
        }
        Value::Array(items) => {
            for (idx, item) in items.iter().enumerate() {
                validate_response_template(file, item, &format!("{location}[{idx}]"), result);
            }
        }
        Value::Object(object) => {
            for (key, value) in object {
                if let Some((name, rule)) = key.split_once('|') {
                    if let Err(reason) = check_key_rule(rule, value) {
                        result.add_issue(
                            LintIssue::error(
                                "E018",
                                format!("Invalid generation rule '{rule}' on '{name}': {reason}"),
                                file.to_path_buf(),
                            )
                            .with_location(format!("{location}.{key}"))
                            .with_suggestion("The raw response is served unchanged when the template fails"),
                        );
                    }
                }
                validate_response_template(file, value, &format!("{location}.{key}"), result);
            }
        }
        _ => {}
    }
}

fn check_key_rule(rule: &str, value: &Value) -> Result<(), String> {
    if let Some(step) = rule.strip_prefix('+') {
        return step
            .parse::<f64>()
            .map(|_| ())
            .map_err(|_| "step must be a number".to_string());
    }

    let caps = key_rule_regex()
        .captures(rule)
        .ok_or_else(|| "expected min, min-max, or min-max.dmin-dmax".to_string())?;
    let bound = |idx: usize| caps.get(idx).and_then(|m| m.as_str().parse::<i64>().ok());
    if let (Some(min), Some(max)) = (bound(1), bound(2)) {
        if max < min {
            return Err(format!("range {min}-{max} is reversed"));
        }
    }
    if let (Some(dmin), Some(dmax)) = (bound(3), bound(4)) {
        if dmax < dmin {
            return Err(format!("decimal range {dmin}-{dmax} is reversed"));
        }
    }
    if bound(4).or(bound(3)).is_some_and(|decimals| decimals > 17) {
        return Err("at most 17 decimals are supported".to_string());
    }

    let upper = bound(2).or(bound(1));
    match value {
        Value::String(_) | Value::Array(_) | Value::Object(_)
            if upper.is_some_and(|count| count > MAX_REPEAT) =>
        {
            Err(format!("repeat count is capped at {MAX_REPEAT}"))
        }
        Value::Bool(_) => match (bound(1), bound(2)) {
            (Some(min), Some(max)) if min.checked_add(max).is_none() => {
                Err(format!("probability bounds {min}-{max} overflow"))
            }
            _ => Ok(()),
        },
        _ => Ok(()),
    }
}

/// Warn about rules that can never be reached because an earlier enabled
/// rule answers every request they would.
fn check_shadowed_rules(file: &Path, rules: &[Value], prefix: &str, result: &mut LintResult) {
    let parsed: Vec<Option<SimpleRule>> = rules.iter().map(SimpleRule::from_value).collect();

    for (later_idx, later) in parsed.iter().enumerate() {
        let Some(later) = later else { continue };
        let shadow = parsed[..later_idx]
            .iter()
            .enumerate()
            .find_map(|(idx, earlier)| earlier.as_ref().filter(|e| e.covers(later)).map(|e| (idx, e)));

        if let Some((earlier_idx, earlier)) = shadow {
            let location = if prefix.is_empty() {
                format!("[{later_idx}]")
            } else {
                format!("{prefix}[{later_idx}]")
            };
            result.add_issue(
                LintIssue::warning(
                    "W015",
                    format!(
                        "Rule '{}' is unreachable: rule '{}' (index {earlier_idx}) matches first",
                        later.id, earlier.id
                    ),
                    file.to_path_buf(),
                )
                .with_location(location)
                .with_suggestion("Move the more specific rule earlier"),
            );
        }
    }
}

/// The parts of an enabled rule needed for reachability checks.
struct SimpleRule<'a> {
    id: &'a str,
    url: &'a str,
    method: &'a str,
    match_type: &'a str,
}

impl<'a> SimpleRule<'a> {
    fn from_value(value: &'a Value) -> Option<Self> {
        if value.get("enabled") != Some(&Value::Bool(true)) {
            return None;
        }
        Some(Self {
            id: value.get("id")?.as_str()?,
            url: value.get("url")?.as_str()?,
            method: value.get("method").and_then(|m| m.as_str()).unwrap_or("ALL"),
            match_type: value.get("matchType")?.as_str()?,
        })
    }

    fn any_method(&self) -> bool {
        self.method.eq_ignore_ascii_case("ALL") || self.method == "*"
    }

    /// Every request `other` matches is also matched by `self`.
    fn covers(&self, other: &SimpleRule<'_>) -> bool {
        let methods = self.any_method() || (!other.any_method() && self.method.eq_ignore_ascii_case(other.method));
        if !methods {
            return false;
        }
        match (self.match_type, other.match_type) {
            ("contains", "contains") | ("contains", "exact") => other.url.contains(self.url),
            ("exact", "exact") => self.url == other.url,
            _ => false,
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
