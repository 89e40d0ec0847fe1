//! Transformation operators.
//!
//! Each operator is a pure function from a table and its typed parameters to
//! a new table. [`Transform`] ties the parameter records together as the
//! `{type, params}` shape recorded in history and accepted from recipes.
//! Validation (missing columns, empty selections) happens before any output
//! is built.

use std::collections::HashMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    cluster::ClusterRequest,
    data::{NaturalKey, Value, parse_numeric_literal},
    dataset::Table,
    error::{EngineError, Result},
    hashing::{self, HashAlgorithm},
    pseudonym::{self, PseudonymGenerator, PseudonymKind, PseudonymMap},
    remap::{self, ValueMapping},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregate {
    #[default]
    Sum,
    Avg,
    Min,
    Max,
    Count,
}

impl Aggregate {
    pub fn as_str(self) -> &'static str {
        match self {
            Aggregate::Sum => "sum",
            Aggregate::Avg => "avg",
            Aggregate::Min => "min",
            Aggregate::Max => "max",
            Aggregate::Count => "count",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterParams {
    pub column: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortParams {
    pub column: String,
    #[serde(default)]
    pub direction: SortDirection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupByParams {
    pub group_by: String,
    pub aggregate: String,
    #[serde(default)]
    pub function: Aggregate,
}

impl GroupByParams {
    pub fn output_column(&self) -> String {
        format!("{}({})", self.function.as_str(), self.aggregate)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotParams {
    /// Column whose values key the output rows.
    pub group_by: String,
    /// Column whose distinct values become output columns.
    pub pivot_column: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PseudonymColumn {
    pub column: String,
    #[serde(default)]
    pub kind: PseudonymKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PseudonymizeParams {
    #[serde(default)]
    pub columns: Vec<PseudonymColumn>,
    #[serde(default)]
    pub drop_columns: Vec<String>,
    /// Filled in when the request is accepted so replay reproduces the names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HashIdParams {
    pub columns: Vec<String>,
    #[serde(default)]
    pub algorithm: HashAlgorithm,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_column_name: Option<String>,
    /// Milliseconds since the epoch, captured on acceptance for `complex`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl HashIdParams {
    pub fn output_column(&self) -> String {
        self.output_column_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| hashing::auto_column_name(&self.columns))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropColumnsParams {
    #[serde(default)]
    pub columns: Vec<String>,
}

/// A reviewed clustering pass: the request that produced the clusters and
/// the resolved `original -> canonical` mapping that was accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterMergeParams {
    #[serde(flatten)]
    pub request: ClusterRequest,
    #[serde(default)]
    pub mapping: ValueMapping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "camelCase")]
pub enum Transform {
    Filter(FilterParams),
    Sort(SortParams),
    GroupBy(GroupByParams),
    Clean,
    Pivot(PivotParams),
    Pseudonymize(PseudonymizeParams),
    HashId(HashIdParams),
    Clustering(ClusterMergeParams),
    DropColumns(DropColumnsParams),
}

/// Output of one operator application.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub table: Table,
    /// Only pseudonymize produces a map; it replaces any earlier one.
    pub pseudonyms: Option<PseudonymMap>,
}

impl Transform {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Transform::Filter(_) => "filter",
            Transform::Sort(_) => "sort",
            Transform::GroupBy(_) => "groupBy",
            Transform::Clean => "clean",
            Transform::Pivot(_) => "pivot",
            Transform::Pseudonymize(_) => "pseudonymize",
            Transform::HashId(_) => "hashId",
            Transform::Clustering(_) => "clustering",
            Transform::DropColumns(_) => "dropColumns",
        }
    }

    /// One-line summary for history listings.
    pub fn describe(&self) -> String {
        match self {
            Transform::Filter(p) => format!("Filter \"{}\" containing \"{}\"", p.column, p.value),
            Transform::Sort(p) => format!("Sort by \"{}\" ({})", p.column, p.direction.as_str()),
            Transform::GroupBy(p) => format!(
                "Group by \"{}\", {} of \"{}\"",
                p.group_by,
                p.function.as_str(),
                p.aggregate
            ),
            Transform::Clustering(p) => format!("Cluster values in \"{}\"", p.request.column),
            Transform::Pseudonymize(p) => {
                format!("Pseudonymize {} column(s)", p.columns.len() + p.drop_columns.len())
            }
            Transform::HashId(p) => format!("Generate hash IDs from {} column(s)", p.columns.len()),
            other => {
                let name = other.kind_name();
                let mut chars = name.chars();
                let capitalized = match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                };
                format!("{capitalized} transformation")
            }
        }
    }

    /// Fills in whatever a replay needs that the request may omit: the
    /// pseudonym seed, the composite-hash timestamp and the hash column name.
    pub fn resolved(self) -> Self {
        match self {
            Transform::Pseudonymize(mut params) => {
                params.seed.get_or_insert_with(pseudonym::fresh_seed);
                Transform::Pseudonymize(params)
            }
            Transform::HashId(mut params) => {
                if params.algorithm == HashAlgorithm::Complex {
                    params
                        .timestamp
                        .get_or_insert_with(|| chrono::Utc::now().timestamp_millis());
                }
                params.output_column_name = Some(params.output_column());
                Transform::HashId(params)
            }
            other => other,
        }
    }

    pub fn apply(&self, table: &Table) -> Result<Applied> {
        let mut pseudonyms = None;
        let table = match self {
            Transform::Filter(params) => filter(table, params)?,
            Transform::Sort(params) => sort(table, params)?,
            Transform::GroupBy(params) => group_by(table, params)?,
            Transform::Clean => clean(table),
            Transform::Pivot(params) => pivot(table, params)?,
            Transform::Pseudonymize(params) => {
                let (table, map) = pseudonymize(table, params)?;
                pseudonyms = Some(map);
                table
            }
            Transform::HashId(params) => hash_id(table, params)?,
            Transform::Clustering(params) => {
                remap::apply_value_mapping(table, &params.request.column, &params.mapping)?
            }
            Transform::DropColumns(params) => drop_columns(table, params)?,
        };
        Ok(Applied { table, pseudonyms })
    }
}

/// String cells match on case-insensitive containment, every other cell on
/// exact equality of its label. An empty needle keeps every row.
pub fn filter(table: &Table, params: &FilterParams) -> Result<Table> {
    let idx = table.require_column(&params.column)?;
    if params.value.is_empty() {
        return Ok(table.clone());
    }
    let needle = params.value.to_lowercase();
    let rows = table
        .rows()
        .iter()
        .filter(|row| match &row[idx] {
            Value::String(text) => text.to_lowercase().contains(&needle),
            other => other.label() == params.value,
        })
        .cloned()
        .collect();
    Ok(table.with_rows(rows))
}

pub fn sort(table: &Table, params: &SortParams) -> Result<Table> {
    let idx = table.require_column(&params.column)?;
    let mut keyed = table
        .rows()
        .iter()
        .map(|row| (NaturalKey::of(&row[idx]), row))
        .collect::<Vec<_>>();
    // sort_by is stable, so ties keep their input order in both directions.
    match params.direction {
        SortDirection::Asc => keyed.sort_by(|a, b| a.0.cmp(&b.0)),
        SortDirection::Desc => keyed.sort_by(|a, b| b.0.cmp(&a.0)),
    }
    let rows = keyed.into_iter().map(|(_, row)| row.clone()).collect();
    Ok(table.with_rows(rows))
}

pub fn group_by(table: &Table, params: &GroupByParams) -> Result<Table> {
    let group_idx = table.require_column(&params.group_by)?;
    let value_idx = table.require_column(&params.aggregate)?;

    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(&Value, Vec<&Value>)> = Vec::new();
    for row in table.rows() {
        let key = row[group_idx].label();
        let slot = *positions.entry(key).or_insert_with(|| {
            groups.push((&row[group_idx], Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(&row[value_idx]);
    }

    let rows = groups
        .into_iter()
        .map(|(group, members)| vec![group.clone(), aggregate(params.function, &members)])
        .collect();
    Table::from_rows(vec![params.group_by.clone(), params.output_column()], rows)
}

fn aggregate(function: Aggregate, members: &[&Value]) -> Value {
    let lenient_sum = || {
        members
            .iter()
            .map(|value| value.to_lenient_number().unwrap_or(0.0))
            .sum::<f64>()
    };
    match function {
        Aggregate::Sum => Value::Number(lenient_sum()),
        Aggregate::Avg if members.is_empty() => Value::Null,
        Aggregate::Avg => Value::Number(lenient_sum() / members.len() as f64),
        Aggregate::Count => Value::Number(members.len() as f64),
        Aggregate::Min => extreme(members, |candidate, best| candidate < best),
        Aggregate::Max => extreme(members, |candidate, best| candidate > best),
    }
}

/// First cell holding the winning numeric reading; Null when nothing reads
/// as a number.
fn extreme(members: &[&Value], beats: impl Fn(f64, f64) -> bool) -> Value {
    let mut best: Option<(f64, &Value)> = None;
    for value in members {
        let Some(number) = value.to_lenient_number() else {
            continue;
        };
        match best {
            Some((current, _)) if !beats(number, current) => {}
            _ => best = Some((number, *value)),
        }
    }
    best.map(|(_, value)| value.clone()).unwrap_or_default()
}

/// Drops rows with any missing cell and promotes fully numeric strings.
pub fn clean(table: &Table) -> Table {
    let rows = table
        .rows()
        .iter()
        .filter(|row| !row.iter().any(Value::is_missing))
        .map(|row| {
            row.iter()
                .map(|value| match value {
                    Value::String(text) => parse_numeric_literal(text)
                        .map(Value::Number)
                        .unwrap_or_else(|| value.clone()),
                    other => other.clone(),
                })
                .collect()
        })
        .collect();
    table.with_rows(rows)
}

pub fn pivot(table: &Table, params: &PivotParams) -> Result<Table> {
    let row_idx = table.require_column(&params.group_by)?;
    let col_idx = table.require_column(&params.pivot_column)?;

    let column_keys = table
        .column_values(col_idx)
        .map(Value::label)
        .unique()
        .collect::<Vec<_>>();
    let column_slots = column_keys
        .iter()
        .enumerate()
        .map(|(slot, key)| (key.as_str(), slot))
        .collect::<HashMap<_, _>>();

    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(&Value, Vec<usize>)> = Vec::new();
    for row in table.rows() {
        let slot = *positions.entry(row[row_idx].label()).or_insert_with(|| {
            groups.push((&row[row_idx], vec![0; column_keys.len()]));
            groups.len() - 1
        });
        let column_key = row[col_idx].label();
        if let Some(&column) = column_slots.get(column_key.as_str()) {
            groups[slot].1[column] += 1;
        }
    }

    let mut columns = vec![params.group_by.clone()];
    for key in &column_keys {
        let name = unique_name(&columns, key);
        columns.push(name);
    }
    let rows = groups
        .into_iter()
        .map(|(group, counts)| {
            std::iter::once(group.clone())
                .chain(counts.into_iter().map(|count| Value::Number(count as f64)))
                .collect()
        })
        .collect();
    Table::from_rows(columns, rows)
}

fn unique_name(existing: &[String], candidate: &str) -> String {
    if !existing.iter().any(|name| name == candidate) {
        return candidate.to_string();
    }
    (2..)
        .map(|n| format!("{candidate}_{n}"))
        .find(|name| !existing.contains(name))
        .unwrap_or_else(|| candidate.to_string())
}

/// Rewrites each selected column through a freshly built pseudonym map and
/// removes the columns marked for dropping. Returns the table and the map.
pub fn pseudonymize(table: &Table, params: &PseudonymizeParams) -> Result<(Table, PseudonymMap)> {
    if params.columns.is_empty() && params.drop_columns.is_empty() {
        return Err(EngineError::NoPseudonymColumns);
    }
    for name in params
        .columns
        .iter()
        .map(|selection| &selection.column)
        .chain(&params.drop_columns)
    {
        table.require_column(name)?;
    }

    let seed = params.seed.unwrap_or_default();
    let mut map = PseudonymMap::new();
    let mut current = table.clone();
    for selection in &params.columns {
        let idx = current.require_column(&selection.column)?;
        let generator = PseudonymGenerator::new(seed, &selection.column);
        let mapping = current
            .column_values(idx)
            .filter(|value| !value.is_missing())
            .filter_map(Value::as_key)
            .unique()
            .enumerate()
            .map(|(index, original)| (original, generator.generate(selection.kind, index)))
            .collect::<ValueMapping>();
        current = remap::apply_value_mapping(&current, &selection.column, &mapping)?;
        map.insert(selection.column.clone(), mapping);
    }
    Ok((current.without_columns(&params.drop_columns), map))
}

pub fn hash_id(table: &Table, params: &HashIdParams) -> Result<Table> {
    if params.columns.is_empty() {
        return Err(EngineError::NoHashColumns);
    }
    let indices = params
        .columns
        .iter()
        .map(|column| table.require_column(column))
        .collect::<Result<Vec<_>>>()?;
    let timestamp = params.timestamp.unwrap_or_default();
    let salt = params.salt.as_deref();
    let values = table
        .rows()
        .iter()
        .map(|row| {
            let input = hashing::hash_input(indices.iter().map(|&idx| &row[idx]), salt);
            Value::String(hashing::hash_with(params.algorithm, &input, timestamp))
        })
        .collect();
    table.with_column(&params.output_column(), values)
}

pub fn drop_columns(table: &Table, params: &DropColumnsParams) -> Result<Table> {
    for column in &params.columns {
        table.require_column(column)?;
    }
    Ok(table.without_columns(&params.columns))
}
