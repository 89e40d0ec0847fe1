//! Rewriting cells through a value mapping.
//!
//! Accepted clusters become one `original -> canonical` mapping which is then
//! applied to a single column. The same applier rewrites pseudonymized
//! columns. Cells without a mapping entry pass through untouched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    cluster::Cluster,
    data::Value,
    dataset::Table,
    error::{EngineError, Result},
};

pub type ValueMapping = BTreeMap<String, String>;

/// Reviewer's choices over a list of proposed clusters: which ones to merge
/// and, optionally, what to merge them into. Owned by the caller and
/// consumed by the merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSelection {
    #[serde(default)]
    accepted: BTreeMap<usize, bool>,
    #[serde(default)]
    canonical: BTreeMap<usize, String>,
}

impl ClusterSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts every cluster index below `count`.
    pub fn all(count: usize) -> Self {
        Self {
            accepted: (0..count).map(|idx| (idx, true)).collect(),
            canonical: BTreeMap::new(),
        }
    }

    pub fn toggle(&mut self, index: usize) {
        let entry = self.accepted.entry(index).or_insert(false);
        *entry = !*entry;
    }

    pub fn set_accepted(&mut self, index: usize, accepted: bool) {
        self.accepted.insert(index, accepted);
    }

    pub fn set_canonical(&mut self, index: usize, value: impl Into<String>) {
        self.canonical.insert(index, value.into());
    }

    pub fn is_accepted(&self, index: usize) -> bool {
        self.accepted.get(&index).copied().unwrap_or(false)
    }

    /// Accepted indices in ascending order.
    pub fn accepted_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.accepted
            .iter()
            .filter(|(_, accepted)| **accepted)
            .map(|(idx, _)| *idx)
    }

    /// Replacement for a cluster: the edited value, else its first member.
    pub fn canonical_for<'a>(&'a self, index: usize, cluster: &'a Cluster) -> Option<&'a str> {
        self.canonical
            .get(&index)
            .map(String::as_str)
            .or_else(|| cluster.values.first().map(String::as_str))
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty() && self.canonical.is_empty()
    }
}

/// Flattens the accepted clusters into one mapping. Later clusters win if a
/// value appears twice.
pub fn build_merge_mapping(clusters: &[Cluster], selection: &ClusterSelection) -> Result<ValueMapping> {
    let mut mapping = ValueMapping::new();
    for index in selection.accepted_indices() {
        let cluster = clusters
            .get(index)
            .ok_or(EngineError::ClusterIndexOutOfRange {
                index,
                count: clusters.len(),
            })?;
        let Some(canonical) = selection.canonical_for(index, cluster) else {
            continue;
        };
        for value in &cluster.values {
            mapping.insert(value.clone(), canonical.to_string());
        }
    }
    Ok(mapping)
}

/// Rewrites `column` through `mapping`. Null cells and unmapped values are kept.
pub fn apply_value_mapping(table: &Table, column: &str, mapping: &ValueMapping) -> Result<Table> {
    let idx = table.require_column(column)?;
    if mapping.is_empty() {
        return Ok(table.clone());
    }
    let rows = table
        .rows()
        .iter()
        .map(|row| {
            let mut row = row.clone();
            if let Some(replacement) = row[idx].as_key().and_then(|key| mapping.get(&key)) {
                row[idx] = Value::String(replacement.clone());
            }
            row
        })
        .collect();
    Ok(table.with_rows(rows))
}
