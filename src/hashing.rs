//! Non-cryptographic row identifiers.
//!
//! The rolling hash is the classic `h * 31 + unit` over UTF-16 code units in
//! 32-bit arithmetic, rendered as the lowercase hex of its absolute value.
//! The `complex` variant concatenates four rolling hashes of the input salted
//! with a timestamp and keeps the first ten hex digits.

use serde::{Deserialize, Serialize};

use crate::data::Value;

pub const DEFAULT_HASH_COLUMN: &str = "hash_id";
const FIELD_SEPARATOR: &str = "|";
const COMPLEX_ROUNDS: usize = 4;
const COMPLEX_LENGTH: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HashAlgorithm {
    #[default]
    Simple,
    Complex,
}

pub fn rolling_hash(input: &str) -> String {
    let mut hash: i32 = 0;
    for unit in input.encode_utf16() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit));
    }
    format!("{:x}", i64::from(hash).abs())
}

pub fn complex_hash(input: &str, timestamp_millis: i64) -> String {
    let salted = format!("{input}{timestamp_millis}");
    let mut combined = String::new();
    for round in 0..COMPLEX_ROUNDS {
        combined.push_str(&rolling_hash(&format!("{salted}{round}")));
    }
    combined.chars().take(COMPLEX_LENGTH).collect()
}

/// Joins the selected cells (null as empty) and the optional salt with `|`.
pub fn hash_input<'a>(cells: impl IntoIterator<Item = &'a Value>, salt: Option<&str>) -> String {
    let mut combined = cells
        .into_iter()
        .map(Value::as_display)
        .collect::<Vec<_>>()
        .join(FIELD_SEPARATOR);
    if let Some(salt) = salt.filter(|salt| !salt.is_empty()) {
        combined.push_str(FIELD_SEPARATOR);
        combined.push_str(salt);
    }
    combined
}

pub fn hash_with(algorithm: HashAlgorithm, input: &str, timestamp_millis: i64) -> String {
    match algorithm {
        HashAlgorithm::Simple => rolling_hash(input),
        HashAlgorithm::Complex => complex_hash(input, timestamp_millis),
    }
}

/// Output column name derived from the hashed columns.
pub fn auto_column_name(columns: &[String]) -> String {
    match columns {
        [] => DEFAULT_HASH_COLUMN.to_string(),
        [first, second, rest @ ..] if rest.len() > 1 => {
            format!("{first}_{second}_plus{}_hash", columns.len() - 2)
        }
        _ => format!("{}_hash", columns.join("_")),
    }
}
