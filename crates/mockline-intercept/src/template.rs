//! Mock.js-compatible response templating.
//!
//! A template is any JSON value. Realizing it produces a concrete value with
//! generated data in place of the template syntax.
//!
//! # Generation rules (object keys)
//!
//! - `"name|3": "ab"` - repeat the string 3 times
//! - `"name|1-5": "ab"` - repeat 1 to 5 times
//! - `"age|18-60": 0` - random integer in range
//! - `"price|1-100.2": 0` - random float with exactly 2 decimals
//! - `"price|1-100.1-3": 0` - random float with 1 to 3 decimals
//! - `"flag|1": true` - random boolean
//! - `"flag|1-3": true` - `true` with probability 1/4
//! - `"item|1": [..]` - one random element
//! - `"items|2-4": [..]` - the array contents repeated 2 to 4 times
//! - `"pick|2": {..}` - two random properties of the object
//! - `"id|+1": 1` - step rules keep the value as is (no cross-request counters)
//!
//! # Placeholders (strings)
//!
//! `@name` and `@name(args)`, e.g. `@integer(1, 10)`, `@guid`, `@date(yyyy-MM-dd)`.
//! A string that is exactly one placeholder yields a typed value. Unknown
//! placeholders are left verbatim; `\@` escapes a placeholder.
//!
//! # Example
//!
//! ```json
//! {"list|2-3": [{"id": "@guid", "name": "@name", "age|18-60": 0}]}
//! ```

use crate::error::TemplateError;
use chrono::{DateTime, Local};
use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use serde_json::{Map, Number, Value};
use std::fmt::Write;
use std::sync::OnceLock;

static KEY_RULE_REGEX: OnceLock<Regex> = OnceLock::new();
static PLACEHOLDER_REGEX: OnceLock<Regex> = OnceLock::new();

fn key_rule_regex() -> &'static Regex {
    KEY_RULE_REGEX.get_or_init(|| {
        Regex::new(r"^(-?\d+)(?:-(-?\d+))?(?:\.(\d+)(?:-(\d+))?)?$").unwrap()
    })
}

fn placeholder_regex() -> &'static Regex {
    PLACEHOLDER_REGEX.get_or_init(|| {
        Regex::new(r"(\\)?@([A-Za-z_][A-Za-z0-9_]*)(?:\(([^)]*)\))?").unwrap()
    })
}

const WORDS: &[&str] = &[
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed", "do",
    "eiusmod", "tempor", "incididunt", "labore", "dolore", "magna", "aliqua", "enim", "minim",
    "veniam", "quis", "nostrud", "exercitation", "ullamco", "laboris", "nisi", "aliquip",
];
const FIRST_NAMES: &[&str] = &[
    "James", "Mary", "John", "Patricia", "Robert", "Jennifer", "Michael", "Linda", "William",
    "Elizabeth", "David", "Barbara", "Richard", "Susan", "Joseph", "Jessica", "Thomas", "Sarah",
];
const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Rodriguez",
    "Martinez", "Hernandez", "Lopez", "Wilson", "Anderson", "Taylor", "Thomas", "Moore",
];
const TLDS: &[&str] = &["com", "net", "org", "io", "dev", "edu"];

const LOWER: &str = "abcdefghijklmnopqrstuvwxyz";
const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &str = "0123456789";
const SYMBOLS: &str = "!@#$%^&*()[]";

/// Upper bound on repeat counts and generated text lengths.
const MAX_REPEAT: usize = 10_000;

/// Realize a template with the thread-local RNG.
pub fn realize(template: &Value) -> Result<Value, TemplateError> {
    realize_with(template, &mut rand::thread_rng())
}

/// Realize a template with a caller-supplied RNG (deterministic in tests).
pub fn realize_with<R: Rng + ?Sized>(
    template: &Value,
    rng: &mut R,
) -> Result<Value, TemplateError> {
    match template {
        Value::Object(object) => realize_object(object, rng),
        Value::Array(items) => items
            .iter()
            .map(|item| realize_with(item, rng))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::String(s) => realize_string(s, rng),
        other => Ok(other.clone()),
    }
}

/// Parsed `|rule` suffix of an object key.
#[derive(Debug, Clone, Copy, PartialEq)]
enum KeyRule {
    Range {
        min: i64,
        max: Option<i64>,
        decimals: Option<(u32, u32)>,
    },
    Step,
}

fn parse_key(key: &str) -> Result<(&str, Option<KeyRule>), TemplateError> {
    let Some((name, rule)) = key.split_once('|') else {
        return Ok((key, None));
    };

    let invalid = || TemplateError::InvalidRule {
        key: name.to_string(),
        rule: rule.to_string(),
    };

    if let Some(step) = rule.strip_prefix('+') {
        step.parse::<f64>().map_err(|_| invalid())?;
        return Ok((name, Some(KeyRule::Step)));
    }

    let caps = key_rule_regex().captures(rule).ok_or_else(invalid)?;
    let min: i64 = caps[1].parse().map_err(|_| invalid())?;
    let max = caps
        .get(2)
        .map(|m| m.as_str().parse::<i64>())
        .transpose()
        .map_err(|_| invalid())?;
    if matches!(max, Some(max) if max < min) {
        return Err(invalid());
    }

    let decimals = match caps.get(3) {
        Some(dmin) => {
            let dmin: u32 = dmin.as_str().parse().map_err(|_| invalid())?;
            let dmax = caps
                .get(4)
                .map(|m| m.as_str().parse::<u32>())
                .transpose()
                .map_err(|_| invalid())?
                .unwrap_or(dmin);
            if dmax < dmin || dmax > 17 {
                return Err(invalid());
            }
            Some((dmin, dmax))
        }
        None => None,
    };

    Ok((name, Some(KeyRule::Range { min, max, decimals })))
}

/// Number of repetitions a range rule asks for. Negative counts and counts
/// above `MAX_REPEAT` are invalid.
fn pick_count<R: Rng + ?Sized>(
    rng: &mut R,
    name: &str,
    min: i64,
    max: Option<i64>,
) -> Result<usize, TemplateError> {
    let invalid = || TemplateError::InvalidRule {
        key: name.to_string(),
        rule: match max {
            Some(max) => format!("{min}-{max}"),
            None => format!("{min}"),
        },
    };
    if max.unwrap_or(min) > MAX_REPEAT as i64 {
        return Err(invalid());
    }

    let count = match max {
        Some(max) => rng.gen_range(min..=max),
        None => min,
    };
    usize::try_from(count).map_err(|_| invalid())
}

fn realize_object<R: Rng + ?Sized>(
    object: &Map<String, Value>,
    rng: &mut R,
) -> Result<Value, TemplateError> {
    let mut out = Map::with_capacity(object.len());
    for (key, value) in object {
        let (name, rule) = parse_key(key)?;
        let realized = match rule {
            None => realize_with(value, rng)?,
            Some(rule) => apply_rule(name, rule, value, rng)?,
        };
        out.insert(name.to_string(), realized);
    }
    Ok(Value::Object(out))
}

fn apply_rule<R: Rng + ?Sized>(
    name: &str,
    rule: KeyRule,
    value: &Value,
    rng: &mut R,
) -> Result<Value, TemplateError> {
    let KeyRule::Range { min, max, decimals } = rule else {
        return realize_with(value, rng);
    };

    match value {
        Value::String(s) => {
            let count = pick_count(rng, name, min, max)?;
            realize_string(&s.repeat(count), rng)
        }
        Value::Number(_) => match (max, decimals) {
            (_, Some((dmin, dmax))) => {
                let whole = max.map(|max| rng.gen_range(min..=max)).unwrap_or(min);
                Ok(random_float(rng, whole, dmin, dmax))
            }
            (Some(max), None) => Ok(Value::Number(rng.gen_range(min..=max).into())),
            (None, None) => Ok(Value::Number(min.into())),
        },
        Value::Bool(current) => match max.map(|max| min.checked_add(max)) {
            Some(None) => Err(TemplateError::InvalidRule {
                key: name.to_string(),
                rule: format!("{min}-{}", max.unwrap_or_default()),
            }),
            Some(Some(total)) if total > 0 => {
                let probability = min as f64 / total as f64;
                let keep = rng.gen_bool(probability.clamp(0.0, 1.0));
                Ok(Value::Bool(if keep { *current } else { !*current }))
            }
            _ => Ok(Value::Bool(rng.gen_bool(0.5))),
        },
        Value::Array(items) => {
            if max.is_none() && min == 1 {
                return match items.choose(rng) {
                    Some(item) => realize_with(item, rng),
                    None => Ok(Value::Array(Vec::new())),
                };
            }
            let count = pick_count(rng, name, min, max)?;
            let mut out = Vec::with_capacity(items.len() * count);
            for _ in 0..count {
                for item in items {
                    out.push(realize_with(item, rng)?);
                }
            }
            Ok(Value::Array(out))
        }
        Value::Object(object) => {
            let count = pick_count(rng, name, min, max)?.min(object.len());
            let keys: Vec<&String> = object.keys().collect();
            let mut picked = Map::new();
            for key in keys.choose_multiple(rng, count) {
                let single = Map::from_iter([((*key).clone(), object[key.as_str()].clone())]);
                if let Value::Object(realized) = realize_object(&single, rng)? {
                    picked.extend(realized);
                }
            }
            Ok(Value::Object(picked))
        }
        Value::Null => Ok(Value::Null),
    }
}

fn random_float<R: Rng + ?Sized>(rng: &mut R, whole: i64, dmin: u32, dmax: u32) -> Value {
    let places = rng.gen_range(dmin..=dmax);
    if places == 0 {
        return Value::Number(whole.into());
    }

    let mut digits: String = (0..places - 1)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect();
    // Keep the last digit non-zero so the number really has `places` decimals
    digits.push(char::from(b'0' + rng.gen_range(1..10u8)));

    let sign = if whole < 0 { "-" } else { "" };
    format!("{sign}{}.{digits}", whole.unsigned_abs())
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::Number(whole.into()))
}

fn realize_string<R: Rng + ?Sized>(s: &str, rng: &mut R) -> Result<Value, TemplateError> {
    let re = placeholder_regex();

    // A lone placeholder keeps the generated type
    if let Some(caps) = re.captures(s) {
        let whole = caps.get(0).map(|m| m.as_str().len() == s.len()).unwrap_or(false);
        if whole && caps.get(1).is_none() {
            let args = caps.get(3).map(|m| m.as_str()).unwrap_or("");
            return Ok(generate(&caps[2], args, rng)?.unwrap_or_else(|| Value::String(s.to_string())));
        }
    }

    let mut out = String::with_capacity(s.len());
    let mut last = 0;
    for caps in re.captures_iter(s) {
        let Some(m) = caps.get(0) else { continue };
        out.push_str(&s[last..m.start()]);
        last = m.end();

        if caps.get(1).is_some() {
            out.push_str(&m.as_str()[1..]);
            continue;
        }
        // "user@example" is an address, not a placeholder
        let glued = s[..m.start()]
            .chars()
            .next_back()
            .map(|c| c.is_alphanumeric())
            .unwrap_or(false);
        if glued {
            out.push_str(m.as_str());
            continue;
        }

        let args = caps.get(3).map(|m| m.as_str()).unwrap_or("");
        match generate(&caps[2], args, rng)? {
            Some(Value::String(text)) => out.push_str(&text),
            Some(other) => out.push_str(&other.to_string()),
            None => out.push_str(m.as_str()),
        }
    }
    out.push_str(&s[last..]);
    Ok(Value::String(out))
}

fn parse_args(args: &str) -> Vec<String> {
    if args.trim().is_empty() {
        return Vec::new();
    }
    args.split(',')
        .map(|a| a.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
        .collect()
}

fn int_args(
    placeholder: &str,
    args: &[String],
    default_min: i64,
    default_max: i64,
) -> Result<(i64, i64), TemplateError> {
    let invalid = |reason: String| TemplateError::InvalidArgument {
        placeholder: placeholder.to_string(),
        reason,
    };
    let parse = |s: &String| {
        s.parse::<i64>()
            .map_err(|_| invalid(format!("'{s}' is not an integer")))
    };

    let min = args.first().map(parse).transpose()?.unwrap_or(default_min);
    let max = args.get(1).map(parse).transpose()?.unwrap_or(default_max.max(min));
    if min > max {
        return Err(invalid(format!("min {min} is greater than max {max}")));
    }
    Ok((min, max))
}

fn random_text<R: Rng + ?Sized>(rng: &mut R, pool: &str, len: usize) -> String {
    let chars: Vec<char> = pool.chars().collect();
    (0..len)
        .filter_map(|_| chars.choose(rng).copied())
        .collect()
}

fn char_pool(name: &str) -> String {
    match name {
        "lower" => LOWER.to_string(),
        "upper" => UPPER.to_string(),
        "number" => DIGITS.to_string(),
        "symbol" => SYMBOLS.to_string(),
        "alpha" => format!("{LOWER}{UPPER}"),
        other => other.to_string(),
    }
}

fn word<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    WORDS.choose(rng).copied().unwrap_or("lorem")
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn sentence<R: Rng + ?Sized>(rng: &mut R, min: usize, max: usize) -> String {
    let len = rng.gen_range(min..=max);
    let words: Vec<&str> = (0..len).map(|_| word(rng)).collect();
    format!("{}.", capitalize(&words.join(" ")))
}

/// Translate Mock.js date tokens (`yyyy-MM-dd HH:mm:ss`) to chrono format.
/// Literal `%` is escaped so user text never reaches chrono as a specifier.
fn chrono_format(format: &str) -> String {
    format
        .replace('%', "%%")
        .replace("yyyy", "%Y")
        .replace("MM", "%m")
        .replace("dd", "%d")
        .replace("HH", "%H")
        .replace("mm", "%M")
        .replace("ss", "%S")
}

/// Format a moment without going through `to_string`, which panics when
/// chrono rejects the format.
fn format_moment<Tz>(
    placeholder: &str,
    moment: &DateTime<Tz>,
    format: &str,
) -> Result<String, TemplateError>
where
    Tz: chrono::TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut out = String::new();
    write!(out, "{}", moment.format(&chrono_format(format))).map_err(|_| {
        TemplateError::InvalidArgument {
            placeholder: placeholder.to_string(),
            reason: format!("unsupported date format '{format}'"),
        }
    })?;
    Ok(out)
}

fn random_datetime<R: Rng + ?Sized>(
    rng: &mut R,
    placeholder: &str,
    format: &str,
) -> Result<String, TemplateError> {
    // 1970-01-01 .. roughly 2030
    let seconds = rng.gen_range(0..1_893_456_000);
    match DateTime::from_timestamp(seconds, 0) {
        Some(moment) => format_moment(placeholder, &moment, format),
        None => Ok(String::new()),
    }
}

/// Text length for `@string`/`@word`, capped at `MAX_REPEAT`.
fn text_len<R: Rng + ?Sized>(
    rng: &mut R,
    placeholder: &str,
    min: i64,
    max: i64,
) -> Result<usize, TemplateError> {
    if min < 0 || max > MAX_REPEAT as i64 {
        return Err(TemplateError::InvalidArgument {
            placeholder: placeholder.to_string(),
            reason: format!("length must be between 0 and {MAX_REPEAT}"),
        });
    }
    Ok(usize::try_from(rng.gen_range(min..=max)).unwrap_or(0))
}

/// Generate the value for one placeholder. `Ok(None)` means "not a known
/// placeholder", which callers leave verbatim.
fn generate<R: Rng + ?Sized>(
    name: &str,
    args: &str,
    rng: &mut R,
) -> Result<Option<Value>, TemplateError> {
    let args = parse_args(args);
    let text = |s: String| -> Result<Option<Value>, TemplateError> { Ok(Some(Value::String(s))) };

    match name {
        "boolean" | "bool" => Ok(Some(Value::Bool(rng.gen_bool(0.5)))),
        "natural" => {
            let (min, max) = int_args(name, &args, 0, i64::from(u32::MAX))?;
            if min < 0 {
                return Err(TemplateError::InvalidArgument {
                    placeholder: name.to_string(),
                    reason: "natural numbers cannot be negative".to_string(),
                });
            }
            Ok(Some(Value::Number(rng.gen_range(min..=max).into())))
        }
        "integer" | "int" => {
            let (min, max) = int_args(name, &args, -10_000, 10_000)?;
            Ok(Some(Value::Number(rng.gen_range(min..=max).into())))
        }
        "float" => {
            let (min, max) = int_args(name, &args.iter().take(2).cloned().collect::<Vec<_>>(), -10_000, 10_000)?;
            let decimal_args: Vec<String> = args.iter().skip(2).cloned().collect();
            let (dmin, dmax) = int_args(name, &decimal_args, 1, 4)?;
            if dmin < 0 || dmax > 17 {
                return Err(TemplateError::InvalidArgument {
                    placeholder: name.to_string(),
                    reason: "decimal places must be between 0 and 17".to_string(),
                });
            }
            let whole = rng.gen_range(min..=max);
            Ok(Some(random_float(rng, whole, dmin as u32, dmax as u32)))
        }
        "character" | "char" => {
            let pool = args
                .first()
                .map(|p| char_pool(p))
                .unwrap_or_else(|| format!("{LOWER}{UPPER}{DIGITS}"));
            text(random_text(rng, &pool, 1))
        }
        "string" | "str" => {
            // @string(len) | @string(min, max) | @string(pool, min, max)
            let (pool, numeric) = match args.first() {
                Some(first) if first.parse::<i64>().is_err() => (char_pool(first), &args[1..]),
                _ => (LOWER.to_string(), &args[..]),
            };
            let (min, max) = match numeric.len() {
                0 => (3, 7),
                1 => {
                    let (n, _) = int_args(name, numeric, 0, 0)?;
                    (n, n)
                }
                _ => int_args(name, numeric, 0, 0)?,
            };
            let len = text_len(rng, name, min, max)?;
            text(random_text(rng, &pool, len))
        }
        "word" => {
            let (min, max) = match args.len() {
                0 => (3, 10),
                1 => {
                    let (n, _) = int_args(name, &args, 0, 0)?;
                    (n, n)
                }
                _ => int_args(name, &args, 0, 0)?,
            };
            let len = text_len(rng, name, min, max)?;
            text(random_text(rng, LOWER, len))
        }
        "title" => {
            let len = rng.gen_range(3..=7);
            let words: Vec<String> = (0..len).map(|_| capitalize(word(rng))).collect();
            text(words.join(" "))
        }
        "sentence" => text(sentence(rng, 12, 18)),
        "paragraph" => {
            let len = rng.gen_range(3..=7);
            let sentences: Vec<String> = (0..len).map(|_| sentence(rng, 12, 18)).collect();
            text(sentences.join(" "))
        }
        "first" => text(FIRST_NAMES.choose(rng).copied().unwrap_or("John").to_string()),
        "last" => text(LAST_NAMES.choose(rng).copied().unwrap_or("Smith").to_string()),
        "name" => {
            let first = FIRST_NAMES.choose(rng).copied().unwrap_or("John");
            let last = LAST_NAMES.choose(rng).copied().unwrap_or("Smith");
            text(format!("{first} {last}"))
        }
        "domain" => {
            let tld = TLDS.choose(rng).copied().unwrap_or("com");
            text(format!("{}.{tld}", word(rng)))
        }
        "email" => {
            let tld = TLDS.choose(rng).copied().unwrap_or("com");
            let len = rng.gen_range(3..=8);
            let user = random_text(rng, LOWER, len);
            text(format!("{user}@{}.{tld}", word(rng)))
        }
        "url" => {
            let tld = TLDS.choose(rng).copied().unwrap_or("com");
            let host = word(rng);
            text(format!("http://{host}.{tld}/{}", word(rng)))
        }
        "ip" => {
            let octets: Vec<String> = (0..4).map(|_| rng.gen_range(0..=255u8).to_string()).collect();
            text(octets.join("."))
        }
        "color" => text(format!("#{:06x}", rng.gen_range(0..=0xFF_FFFFu32))),
        "guid" | "uuid" => text(uuid::Uuid::new_v4().to_string()),
        "id" => {
            let mut id = random_text(rng, "123456789", 1);
            id.push_str(&random_text(rng, DIGITS, 17));
            text(id)
        }
        "zip" => text(random_text(rng, DIGITS, 6)),
        "date" | "time" | "datetime" => {
            let default = match name {
                "date" => "yyyy-MM-dd",
                "time" => "HH:mm:ss",
                _ => "yyyy-MM-dd HH:mm:ss",
            };
            let format = args.first().map(String::as_str).unwrap_or(default);
            text(random_datetime(rng, name, format)?)
        }
        "now" => {
            let format = args.first().map(String::as_str).unwrap_or("yyyy-MM-dd HH:mm:ss");
            text(format_moment(name, &Local::now(), format)?)
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use chrono::NaiveDate;
    use rand::SeedableRng;
    use serde_json::json;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_plain_values_pass_through() {
        let template = json!({"a": 1, "b": [true, null], "c": {"d": "text"}});
        assert_eq!(realize_with(&template, &mut rng()).unwrap(), template);
    }

    #[test]
    fn test_string_repeat_rule() {
        let out = realize_with(&json!({"stars|3": "*"}), &mut rng()).unwrap();
        assert_eq!(out, json!({"stars": "***"}));
    }

    #[test]
    fn test_number_range_rule() {
        let mut rng = rng();
        for _ in 0..50 {
            let out = realize_with(&json!({"age|18-60": 0}), &mut rng).unwrap();
            let age = out["age"].as_i64().unwrap();
            assert!((18..=60).contains(&age));
        }
    }

    #[test]
    fn test_number_count_sets_value() {
        let out = realize_with(&json!({"n|5": 1}), &mut rng()).unwrap();
        assert_eq!(out, json!({"n": 5}));
    }

    #[test]
    fn test_float_rule_decimals() {
        let mut rng = rng();
        for _ in 0..20 {
            let out = realize_with(&json!({"price|1-100.2": 0}), &mut rng).unwrap();
            let text = out["price"].to_string();
            let (whole, fraction) = text.split_once('.').unwrap();
            assert!((1..=100).contains(&whole.parse::<i64>().unwrap()));
            assert_eq!(fraction.len(), 2);
        }
    }

    #[test]
    fn test_step_rule_keeps_value() {
        let out = realize_with(&json!({"id|+1": 10}), &mut rng()).unwrap();
        assert_eq!(out, json!({"id": 10}));
    }

    #[test]
    fn test_array_pick_one() {
        let mut rng = rng();
        for _ in 0..20 {
            let out = realize_with(&json!({"color|1": ["red", "green"]}), &mut rng).unwrap();
            assert!(out["color"] == json!("red") || out["color"] == json!("green"));
        }
    }

    #[test]
    fn test_array_repeat_range() {
        let mut rng = rng();
        for _ in 0..20 {
            let out = realize_with(&json!({"list|2-4": [{"x": 1}]}), &mut rng).unwrap();
            let len = out["list"].as_array().unwrap().len();
            assert!((2..=4).contains(&len));
        }
    }

    #[test]
    fn test_object_pick_properties() {
        let template = json!({"pick|2": {"a": 1, "b": 2, "c": 3}});
        let out = realize_with(&template, &mut rng()).unwrap();
        assert_eq!(out["pick"].as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_invalid_rule_is_error() {
        let err = realize_with(&json!({"n|9-1": 0}), &mut rng()).unwrap_err();
        assert!(matches!(err, TemplateError::InvalidRule { .. }));

        let err = realize_with(&json!({"n|abc": 0}), &mut rng()).unwrap_err();
        assert!(matches!(err, TemplateError::InvalidRule { .. }));
    }

    #[test]
    fn test_lone_placeholder_is_typed() {
        let out = realize_with(&json!({"n": "@integer(1, 3)", "b": "@boolean"}), &mut rng())
            .unwrap();
        assert!((1..=3).contains(&out["n"].as_i64().unwrap()));
        assert!(out["b"].is_boolean());
    }

    #[test]
    fn test_embedded_placeholder_is_text() {
        let out = realize_with(&json!("user-@natural(5, 5)"), &mut rng()).unwrap();
        assert_eq!(out, json!("user-5"));
    }

    #[test]
    fn test_unknown_placeholder_is_verbatim() {
        let out = realize_with(&json!("@nothing here"), &mut rng()).unwrap();
        assert_eq!(out, json!("@nothing here"));
    }

    #[test]
    fn test_email_like_text_is_untouched() {
        let out = realize_with(&json!("mail admin@domain.com"), &mut rng()).unwrap();
        assert_eq!(out, json!("mail admin@domain.com"));
    }

    #[test]
    fn test_escaped_placeholder() {
        let out = realize_with(&json!(r"\@guid"), &mut rng()).unwrap();
        assert_eq!(out, json!("@guid"));
    }

    #[test]
    fn test_guid_and_date_formats() {
        let out = realize_with(&json!({"id": "@guid", "day": "@date"}), &mut rng()).unwrap();
        assert!(uuid::Uuid::parse_str(out["id"].as_str().unwrap()).is_ok());
        assert!(NaiveDate::parse_from_str(out["day"].as_str().unwrap(), "%Y-%m-%d").is_ok());
    }

    #[test]
    fn test_bad_placeholder_arguments() {
        let err = realize_with(&json!("@integer(10, 1)"), &mut rng()).unwrap_err();
        assert!(matches!(err, TemplateError::InvalidArgument { .. }));

        let err = realize_with(&json!("@natural(x)"), &mut rng()).unwrap_err();
        assert!(matches!(err, TemplateError::InvalidArgument { .. }));
    }

    #[test]
    fn test_percent_in_date_format() {
        let out = realize_with(&json!("@datetime(yyyy%MM %Q)"), &mut rng()).unwrap();
        let text = out.as_str().unwrap();
        assert_eq!(text.len(), "2001%01 %Q".len());
        assert!(text.ends_with(" %Q"));
    }

    #[test]
    fn test_boolean_rule_overflow_is_error() {
        let template = json!({"b|9223372036854775807-9223372036854775807": true});
        let err = realize_with(&template, &mut rng()).unwrap_err();
        assert!(matches!(err, TemplateError::InvalidRule { .. }));
    }

    #[test]
    fn test_repeat_counts_are_capped() {
        for template in [
            json!({"s|1-100000000000": "x"}),
            json!({"s|100000000000": "x"}),
            json!({"list|10001": [1]}),
        ] {
            let err = realize_with(&template, &mut rng()).unwrap_err();
            assert!(matches!(err, TemplateError::InvalidRule { .. }));
        }

        let out = realize_with(&json!({"s|10000": "x"}), &mut rng()).unwrap();
        assert_eq!(out["s"].as_str().unwrap().len(), 10_000);

        let err = realize_with(&json!("@word(1, 100000)"), &mut rng()).unwrap_err();
        assert!(matches!(err, TemplateError::InvalidArgument { .. }));
    }

    #[test]
    fn test_nested_list_template() {
        let template = json!({
            "data|3": [{"id|+1": 1, "name": "@name", "email": "@email"}]
        });
        let out = realize(&template).unwrap();
        let data = out["data"].as_array().unwrap();

        assert_eq!(data.len(), 3);
        for item in data {
            assert!(item["name"].as_str().unwrap().contains(' '));
            assert!(item["email"].as_str().unwrap().contains('@'));
        }
    }
}
