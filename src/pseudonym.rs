//! Placeholder identities for pseudonymized columns.
//!
//! Names are drawn round-robin from small fixed pools. Pool order and the
//! numeric username suffix come from a SHA-256 stream keyed by a seed that is
//! recorded with the operation, so replaying the same operation reproduces
//! the same pseudonyms. None of this is meant to resist re-identification.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

const FIRST_NAMES: [&str; 8] = [
    "Alex", "Bailey", "Cameron", "Dakota", "Ellis", "Finley", "Gray", "Harper",
];
const LAST_NAMES: [&str; 8] = [
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis",
];
const USERNAME_PREFIXES: [&str; 8] = [
    "cool", "super", "awesome", "happy", "clever", "bright", "swift", "ninja",
];
const USERNAME_SUFFIXES: [&str; 8] = [
    "user", "gamer", "coder", "dev", "guru", "wizard", "star", "geek",
];
const USERNAME_NUMBER_RANGE: u64 = 1000;

/// Column name -> (original value -> pseudonym).
pub type PseudonymMap = BTreeMap<String, BTreeMap<String, String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PseudonymKind {
    #[default]
    FullName,
    FirstName,
    LastName,
    Username,
}

/// Per-column generator with pools shuffled by `(seed, column)`.
#[derive(Debug, Clone)]
pub struct PseudonymGenerator {
    seed: u64,
    column: String,
    first_names: Vec<&'static str>,
    last_names: Vec<&'static str>,
    prefixes: Vec<&'static str>,
    suffixes: Vec<&'static str>,
}

impl PseudonymGenerator {
    pub fn new(seed: u64, column: &str) -> Self {
        Self {
            seed,
            column: column.to_string(),
            first_names: shuffled(&FIRST_NAMES, seed, column, "first"),
            last_names: shuffled(&LAST_NAMES, seed, column, "last"),
            prefixes: shuffled(&USERNAME_PREFIXES, seed, column, "prefix"),
            suffixes: shuffled(&USERNAME_SUFFIXES, seed, column, "suffix"),
        }
    }

    /// Pseudonym for the `index`-th distinct value of the column.
    pub fn generate(&self, kind: PseudonymKind, index: usize) -> String {
        let first = self.first_names[index % self.first_names.len()];
        let last = self.last_names[(index / self.first_names.len()) % self.last_names.len()];
        match kind {
            PseudonymKind::FullName => format!("{first} {last}"),
            PseudonymKind::FirstName => first.to_string(),
            PseudonymKind::LastName => last.to_string(),
            PseudonymKind::Username => {
                let prefix = self.prefixes[index % self.prefixes.len()];
                let suffix = self.suffixes[(index / self.prefixes.len()) % self.suffixes.len()];
                let number = stream_u64(
                    self.seed,
                    &[self.column.as_bytes(), b"number".as_slice(), index.to_le_bytes().as_slice()],
                ) % USERNAME_NUMBER_RANGE;
                format!("{prefix}{suffix}{number}")
            }
        }
    }
}

fn shuffled(pool: &[&'static str], seed: u64, column: &str, label: &str) -> Vec<&'static str> {
    let mut entries = pool.to_vec();
    entries.sort_by_cached_key(|entry| {
        stream_u64(seed, &[column.as_bytes(), label.as_bytes(), entry.as_bytes()])
    });
    entries
}

fn stream_u64(seed: u64, parts: &[&[u8]]) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(seed.to_le_bytes());
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

/// Seed for a new operation when the caller supplies none.
pub fn fresh_seed() -> u64 {
    let nanos = chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_default();
    stream_u64(nanos as u64, &[b"pseudonym-seed".as_slice()])
}
