//! Near-duplicate detection over a column's distinct values.
//!
//! Three key-collision methods (fingerprint, n-gram fingerprint, phonetic)
//! group values by a computed key. The nearest-neighbour method is a greedy
//! single pass: each unassigned value seeds a cluster and absorbs every later
//! unassigned value whose similarity *to the seed* reaches the threshold.
//! Membership is never re-evaluated, so similarity chains are not followed.
//!
//! Only groups with at least two members are returned, largest first; ties
//! keep the order in which their first member was seen.

use std::{collections::HashMap, ops::ControlFlow};

use clap::ValueEnum;
use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    dataset::Table,
    error::{EngineError, Result},
    keys,
};

pub const DEFAULT_THRESHOLD: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
#[value(rename_all = "kebab-case")]
pub enum ClusterMethod {
    /// Key collision on sorted, de-duplicated word tokens
    #[default]
    Fingerprint,
    /// Key collision on sorted character n-grams
    NgramFingerprint,
    /// Key collision on a phonetic key
    Metaphone,
    /// Nearest neighbour by normalized edit distance
    Levenshtein,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
#[value(rename_all = "kebab-case")]
pub enum KeyingFunction {
    #[default]
    Metaphone,
    DoubleMetaphone,
}

/// Parameters for proposing clusters on one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRequest {
    pub column: String,
    #[serde(default)]
    pub method: ClusterMethod,
    #[serde(default)]
    pub keying_function: KeyingFunction,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_ngram_size")]
    pub ngram_size: usize,
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

fn default_ngram_size() -> usize {
    keys::DEFAULT_NGRAM_SIZE
}

impl ClusterRequest {
    pub fn new(column: impl Into<String>, method: ClusterMethod) -> Self {
        Self {
            column: column.into(),
            method,
            keying_function: KeyingFunction::default(),
            threshold: DEFAULT_THRESHOLD,
            ngram_size: keys::DEFAULT_NGRAM_SIZE,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_keying_function(mut self, keying_function: KeyingFunction) -> Self {
        self.keying_function = keying_function;
        self
    }

    /// Threshold clamped into `[0, 1]`; NaN falls back to exact matching.
    pub fn effective_threshold(&self) -> f64 {
        if self.threshold.is_nan() {
            1.0
        } else {
            self.threshold.clamp(0.0, 1.0)
        }
    }

    fn key_of(&self, value: &str) -> String {
        match self.method {
            ClusterMethod::Fingerprint => keys::fingerprint(value),
            ClusterMethod::NgramFingerprint => keys::ngram_fingerprint(value, self.ngram_size),
            ClusterMethod::Metaphone | ClusterMethod::Levenshtein => match self.keying_function {
                KeyingFunction::Metaphone => keys::metaphone(value),
                KeyingFunction::DoubleMetaphone => keys::double_metaphone(value),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub key: String,
    pub values: Vec<String>,
    pub count: usize,
}

/// Result of a clustering pass, pending review before any merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterProposal {
    pub request: ClusterRequest,
    pub clusters: Vec<Cluster>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub processed: usize,
    pub total: usize,
}

/// Distinct non-null values of a column, stringified, in first-seen order.
pub fn distinct_values(table: &Table, column: &str) -> Result<Vec<String>> {
    let idx = table.require_column(column)?;
    Ok(table
        .column_values(idx)
        .filter_map(|value| value.as_key())
        .unique()
        .collect())
}

/// Clusters `values` without progress reporting.
pub fn cluster_values(values: &[String], request: &ClusterRequest) -> Vec<Cluster> {
    match partition(values, request, &mut |_| ControlFlow::Continue(())) {
        ControlFlow::Continue(clusters) => clusters,
        ControlFlow::Break(()) => Vec::new(),
    }
}

/// Clusters `values`, reporting after every value. Returning `Break` from the
/// observer abandons the pass; no partial result is ever returned.
pub fn cluster_values_with_progress<F>(
    values: &[String],
    request: &ClusterRequest,
    observer: &mut F,
) -> Result<Vec<Cluster>>
where
    F: FnMut(Progress) -> ControlFlow<()>,
{
    match partition(values, request, observer) {
        ControlFlow::Continue(clusters) => Ok(clusters),
        ControlFlow::Break(()) => Err(EngineError::ClusteringCancelled),
    }
}

fn partition<F>(
    values: &[String],
    request: &ClusterRequest,
    observer: &mut F,
) -> ControlFlow<(), Vec<Cluster>>
where
    F: FnMut(Progress) -> ControlFlow<()>,
{
    let distinct = values.iter().unique().collect::<Vec<_>>();
    let groups = match request.method {
        ClusterMethod::Levenshtein => {
            nearest_neighbour(&distinct, request.effective_threshold(), observer)?
        }
        _ => key_collision(&distinct, request, observer)?,
    };
    let mut clusters = groups
        .into_iter()
        .filter(|cluster| cluster.values.len() > 1)
        .map(|mut cluster| {
            cluster.count = cluster.values.len();
            cluster
        })
        .collect::<Vec<_>>();
    // Stable: equal counts keep first-seen order.
    clusters.sort_by(|a, b| b.count.cmp(&a.count));
    debug!(
        "Clustered {} distinct value(s) with {:?} into {} cluster(s)",
        distinct.len(),
        request.method,
        clusters.len()
    );
    ControlFlow::Continue(clusters)
}

fn key_collision<F>(
    values: &[&String],
    request: &ClusterRequest,
    observer: &mut F,
) -> ControlFlow<(), Vec<Cluster>>
where
    F: FnMut(Progress) -> ControlFlow<()>,
{
    let total = values.len();
    let mut groups: Vec<Cluster> = Vec::new();
    let mut slots: HashMap<String, usize> = HashMap::new();
    for (idx, value) in values.iter().enumerate() {
        let key = request.key_of(value);
        match slots.get(&key) {
            Some(&slot) => groups[slot].values.push((*value).clone()),
            None => {
                slots.insert(key.clone(), groups.len());
                groups.push(Cluster {
                    key,
                    values: vec![(*value).clone()],
                    count: 0,
                });
            }
        }
        observer(Progress {
            processed: idx + 1,
            total,
        })?;
    }
    ControlFlow::Continue(groups)
}

fn nearest_neighbour<F>(
    values: &[&String],
    threshold: f64,
    observer: &mut F,
) -> ControlFlow<(), Vec<Cluster>>
where
    F: FnMut(Progress) -> ControlFlow<()>,
{
    let total = values.len();
    let mut assigned = vec![false; total];
    let mut groups = Vec::new();
    for (i, seed) in values.iter().enumerate() {
        if assigned[i] {
            continue;
        }
        assigned[i] = true;
        let mut members = vec![(*seed).clone()];
        for (j, candidate) in values.iter().enumerate().skip(i + 1) {
            if assigned[j] {
                continue;
            }
            if keys::similarity(seed, candidate) >= threshold {
                members.push((*candidate).clone());
                assigned[j] = true;
            }
        }
        groups.push(Cluster {
            key: format!("cluster_{i}"),
            values: members,
            count: 0,
        });
        observer(Progress {
            processed: i + 1,
            total,
        })?;
    }
    ControlFlow::Continue(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Value;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn fingerprint_groups_spelling_variants() {
        let values = strings(&["USA", "U.S.A", "usa", "United States"]);
        let clusters = cluster_values(&values, &ClusterRequest::new("c", ClusterMethod::Fingerprint));
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].key, "usa");
        assert_eq!(clusters[0].values, strings(&["USA", "U.S.A", "usa"]));
        assert_eq!(clusters[0].count, 3);
    }

    #[test]
    fn nearest_neighbour_uses_threshold() {
        let values = strings(&["color", "colour", "flavor"]);
        let request = ClusterRequest::new("c", ClusterMethod::Levenshtein).with_threshold(0.8);
        let clusters = cluster_values(&values, &request);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].values, strings(&["color", "colour"]));
        assert_eq!(clusters[0].key, "cluster_0");
    }

    #[test]
    fn nearest_neighbour_compares_against_seed_only() {
        // "abcd" ~ "abce" ~ "abfe" but "abcd" is too far from "abfe".
        let values = strings(&["abcd", "abce", "abfe"]);
        let request = ClusterRequest::new("c", ClusterMethod::Levenshtein).with_threshold(0.75);
        let clusters = cluster_values(&values, &request);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].values, strings(&["abcd", "abce"]));
    }

    #[test]
    fn threshold_is_clamped() {
        let values = strings(&["a", "b"]);
        let low = ClusterRequest::new("c", ClusterMethod::Levenshtein).with_threshold(-3.0);
        assert_eq!(cluster_values(&values, &low)[0].count, 2);
        let high = ClusterRequest::new("c", ClusterMethod::Levenshtein).with_threshold(7.0);
        assert!(cluster_values(&values, &high).is_empty());
    }

    #[test]
    fn clusters_are_sorted_by_size_with_stable_ties() {
        let values = strings(&["b", "B", "a", "A", "c", "C", "c."]);
        let clusters = cluster_values(&values, &ClusterRequest::new("c", ClusterMethod::Fingerprint));
        let keys = clusters.iter().map(|c| c.key.as_str()).collect::<Vec<_>>();
        assert_eq!(keys, vec!["c", "b", "a"]);
    }

    #[test]
    fn degenerate_inputs_produce_no_clusters() {
        let request = ClusterRequest::new("c", ClusterMethod::Metaphone);
        assert!(cluster_values(&[], &request).is_empty());
        assert!(cluster_values(&strings(&["same", "same"]), &request).is_empty());
    }

    #[test]
    fn ngram_method_honours_gram_size() {
        let values = strings(&["abab", "baba"]);
        let mut request = ClusterRequest::new("c", ClusterMethod::NgramFingerprint);
        assert!(cluster_values(&values, &request).is_empty());
        request.ngram_size = 1;
        assert_eq!(cluster_values(&values, &request).len(), 1);
    }

    #[test]
    fn phonetic_method_groups_homophones() {
        let values = strings(&["Stephen", "Steven", "Robert"]);
        let request = ClusterRequest::new("c", ClusterMethod::Metaphone)
            .with_keying_function(KeyingFunction::DoubleMetaphone);
        let clusters = cluster_values(&values, &request);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].key, "STFN");
    }

    #[test]
    fn cancellation_discards_partial_results() {
        let values = strings(&["a", "A", "b", "B"]);
        let request = ClusterRequest::new("c", ClusterMethod::Fingerprint);
        let mut seen = Vec::new();
        let result = cluster_values_with_progress(&values, &request, &mut |progress| {
            seen.push(progress);
            if progress.processed == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert_eq!(result, Err(EngineError::ClusteringCancelled));
        assert_eq!(seen.last().map(|p| p.total), Some(4));
    }

    #[test]
    fn distinct_values_skip_nulls_and_keep_first_occurrence() {
        let table = Table::from_rows(
            vec!["c".into()],
            vec![
                vec!["x".into()],
                vec![Value::Null],
                vec![Value::Number(2.0)],
                vec!["x".into()],
                vec!["2".into()],
            ],
        )
        .unwrap();
        assert_eq!(distinct_values(&table, "c").unwrap(), strings(&["x", "2"]));
        assert!(matches!(
            distinct_values(&table, "missing"),
            Err(EngineError::UnknownColumn(_))
        ));
    }
}
