//! Similarity keys and string distance.
//!
//! Each key function maps a value to a normalized string; values that share a
//! key are treated as spellings of the same thing. All functions are total and
//! return an empty key for empty input.

use std::sync::LazyLock;

use itertools::Itertools;
use regex::Regex;

pub const DEFAULT_NGRAM_SIZE: usize = 2;
const PHONETIC_KEY_LENGTH: usize = 6;

/// Ordered rewrite rules applied to the uppercased, letters-only value.
static PHONETIC_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"^(KN|GN|PN|PS|AE)", "N"),
        (r"^WR", "R"),
        (r"^X", "S"),
        (r"^WH", "W"),
        (r"MB$", "M"),
        (r"SCH", "SK"),
        (r"TH", "0"),
        (r"PH", "F"),
        (r"([DFLT])CH", "${1}K"),
        (r"CH", "X"),
        (r"C([EIY])", "S${1}"),
        (r"C", "K"),
        (r"Q", "K"),
        (r"V", "F"),
        (r"W[AO]", "W2"),
        (r"X", "KS"),
        (r"Z", "S"),
        (r"GH", "H"),
        (r"G([EIY])", "J${1}"),
        (r"G", "K"),
        (r"[AEIOU]", ""),
    ]
    .into_iter()
    .map(|(pattern, replacement)| {
        (
            Regex::new(pattern).expect("valid phonetic rule"),
            replacement,
        )
    })
    .collect()
});

/// Lowercases and drops everything that is not a word character or whitespace.
fn normalize(value: &str) -> String {
    value
        .to_lowercase()
        .chars()
        .filter(|ch| ch.is_alphanumeric() || *ch == '_' || ch.is_whitespace())
        .collect()
}

/// Key-collision fingerprint: case, punctuation, word order and repeated
/// words are all ignored.
pub fn fingerprint(value: &str) -> String {
    normalize(value)
        .split_whitespace()
        .sorted()
        .dedup()
        .join(" ")
}

/// Contiguous character n-grams of the normalized value. A value shorter
/// than `n` yields itself as the only gram.
pub fn ngrams(value: &str, n: usize) -> Vec<String> {
    if value.is_empty() || n == 0 {
        return Vec::new();
    }
    let normalized = normalize(value);
    let chars = normalized.trim().chars().collect::<Vec<_>>();
    if chars.len() < n {
        return vec![chars.into_iter().collect()];
    }
    chars
        .windows(n)
        .map(|window| window.iter().collect())
        .collect()
}

pub fn ngram_fingerprint(value: &str, n: usize) -> String {
    ngrams(value, n).into_iter().sorted().join(" ")
}

/// Phonetic key approximating English pronunciation, at most six characters.
pub fn metaphone(value: &str) -> String {
    let mut word = value
        .to_uppercase()
        .chars()
        .filter(char::is_ascii_uppercase)
        .collect::<String>();
    for (rule, replacement) in PHONETIC_RULES.iter() {
        if rule.is_match(&word) {
            word = rule.replace_all(&word, *replacement).into_owned();
        }
    }
    let mut key = String::with_capacity(PHONETIC_KEY_LENGTH);
    let mut previous = None;
    for ch in word.chars() {
        if previous != Some(ch) {
            key.push(ch);
            previous = Some(ch);
        }
    }
    key.chars().take(PHONETIC_KEY_LENGTH).collect()
}

/// Accepted as a separate keying choice; produces the same key as [`metaphone`].
pub fn double_metaphone(value: &str) -> String {
    metaphone(value)
}

/// Levenshtein distance over characters with unit costs.
pub fn levenshtein(a: &str, b: &str) -> usize {
    if a == b {
        return 0;
    }
    let a = a.chars().collect::<Vec<_>>();
    let b = b.chars().collect::<Vec<_>>();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous = (0..=b.len()).collect::<Vec<_>>();
    let mut current = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

/// `1 - distance / longest length`; two empty strings are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}
