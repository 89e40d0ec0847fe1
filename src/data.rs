use std::{cmp::Ordering, fmt, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Full numeric literal: optional sign, digits with an optional fraction,
/// optional exponent, surrounding blanks tolerated.
static NUMERIC_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?\s*$").expect("valid numeric regex")
});

/// Longest numeric prefix, mirroring a lenient `parseFloat`.
static NUMERIC_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([+-]?(Infinity|(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?))")
        .expect("valid numeric prefix regex")
});

/// A single cell. Columns are not typed; each cell carries its own variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
}

impl Value {
    pub fn string(value: impl Into<String>) -> Self {
        Value::String(value.into())
    }

    /// Stringified form used for export, hashing and comparisons. Null renders empty.
    pub fn as_display(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Boolean(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
        }
    }

    /// Lookup key for value mappings; Null cells never match a mapping.
    pub fn as_key(&self) -> Option<String> {
        match self {
            Value::Null => None,
            other => Some(other.as_display()),
        }
    }

    /// Label used for grouping, pivot headers and exact filter matches.
    /// Null reads as a literal `null`.
    pub fn label(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            other => other.as_display(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Null or the empty string.
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Numeric reading with `parseFloat` leniency: `"12kg"` reads as 12,
    /// booleans and nulls do not read at all.
    pub fn to_lenient_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) if !n.is_nan() => Some(*n),
            Value::String(s) => parse_number_prefix(s),
            _ => None,
        }
    }

    /// Numeric reading that only accepts numbers and fully numeric strings.
    pub fn to_strict_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) if !n.is_nan() => Some(*n),
            Value::String(s) => parse_numeric_literal(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

pub fn format_number(value: f64) -> String {
    if value.is_infinite() {
        return if value.is_sign_positive() {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        };
    }
    if value == 0.0 {
        // Avoid rendering negative zero as "-0".
        return "0".to_string();
    }
    value.to_string()
}

/// Parses a string that is entirely a numeric literal.
pub fn parse_numeric_literal(raw: &str) -> Option<f64> {
    if !NUMERIC_LITERAL.is_match(raw) {
        return None;
    }
    raw.trim().parse::<f64>().ok()
}

/// Parses the longest numeric prefix of `raw`.
pub fn parse_number_prefix(raw: &str) -> Option<f64> {
    let captures = NUMERIC_PREFIX.captures(raw)?;
    let literal = captures.get(1)?.as_str();
    literal.parse::<f64>().ok()
}

/// Type inference applied to raw CSV cells on ingestion.
pub fn infer_value(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    if let Some(number) = parse_numeric_literal(raw) {
        return Value::Number(number);
    }
    if raw.eq_ignore_ascii_case("true") {
        return Value::Boolean(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return Value::Boolean(false);
    }
    Value::String(raw.to_string())
}

/// Sort key giving a total "natural" order: numeric-looking values first in
/// numeric order, then everything else lexicographically, nulls last.
#[derive(Debug, Clone, PartialEq)]
pub enum NaturalKey {
    Numeric(f64),
    Text(String),
    Missing,
}

impl NaturalKey {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => NaturalKey::Missing,
            other => match other.to_strict_number() {
                Some(n) => NaturalKey::Numeric(n),
                None => NaturalKey::Text(other.as_display()),
            },
        }
    }

    fn rank(&self) -> u8 {
        match self {
            NaturalKey::Numeric(_) => 0,
            NaturalKey::Text(_) => 1,
            NaturalKey::Missing => 2,
        }
    }
}

impl Eq for NaturalKey {}

impl Ord for NaturalKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (NaturalKey::Numeric(a), NaturalKey::Numeric(b)) => a.total_cmp(b),
            (NaturalKey::Text(a), NaturalKey::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for NaturalKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
