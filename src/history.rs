//! Operation log with an undo/redo cursor.
//!
//! Tables are never snapshotted. Any earlier state is rebuilt by replaying
//! the applied prefix of the log against the original table, so every
//! recorded operation must carry all the parameters it needs.

use std::{fs::File, io::BufReader, path::Path};

use anyhow::Context;
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    dataset::Table,
    error::{EngineError, Result},
    ops::{Applied, Transform},
    pseudonym::PseudonymMap,
};

/// A recorded transformation: `{type, params, timestamp}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(flatten)]
    pub transform: Transform,
    pub timestamp: DateTime<Utc>,
}

impl Operation {
    pub fn new(transform: Transform) -> Self {
        Self {
            transform,
            timestamp: Utc::now(),
        }
    }
}

/// Ordered operations plus a cursor. `applied` counts the operations at or
/// before the cursor; zero means the original table is current.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "HistoryFile", into = "HistoryFile")]
pub struct History {
    operations: Vec<Operation>,
    applied: usize,
}

/// On-disk shape; `cursor` is the index of the last applied operation, -1
/// when nothing is applied.
#[derive(Serialize, Deserialize)]
struct HistoryFile {
    operations: Vec<Operation>,
    cursor: i64,
}

impl TryFrom<HistoryFile> for History {
    type Error = String;

    fn try_from(file: HistoryFile) -> std::result::Result<Self, Self::Error> {
        let applied = file
            .cursor
            .checked_add(1)
            .and_then(|applied| usize::try_from(applied).ok())
            .filter(|&applied| applied <= file.operations.len());
        match applied {
            Some(applied) => Ok(Self {
                operations: file.operations,
                applied,
            }),
            None => Err(format!(
                "cursor {} is outside the {} recorded operation(s)",
                file.cursor,
                file.operations.len()
            )),
        }
    }
}

impl From<History> for HistoryFile {
    fn from(history: History) -> Self {
        Self {
            cursor: history.applied as i64 - 1,
            operations: history.operations,
        }
    }
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Operations up to and including the cursor.
    pub fn applied(&self) -> &[Operation] {
        &self.operations[..self.applied]
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Index of the last applied operation, `None` at the original table.
    pub fn cursor(&self) -> Option<usize> {
        self.applied.checked_sub(1)
    }

    /// Drops everything after the cursor, then appends and advances.
    pub fn push(&mut self, operation: Operation) {
        self.operations.truncate(self.applied);
        self.operations.push(operation);
        self.applied = self.operations.len();
    }

    pub fn can_undo(&self) -> bool {
        self.applied > 0
    }

    pub fn can_redo(&self) -> bool {
        self.applied < self.operations.len()
    }

    pub fn undo(&mut self) -> bool {
        if !self.can_undo() {
            return false;
        }
        self.applied -= 1;
        true
    }

    pub fn redo(&mut self) -> bool {
        if !self.can_redo() {
            return false;
        }
        self.applied += 1;
        true
    }

    /// The operation a redo would apply.
    pub fn next(&self) -> Option<&Operation> {
        self.operations.get(self.applied)
    }

    /// Moves the cursor without touching the log. `None` selects the original table.
    pub fn set_cursor(&mut self, cursor: Option<usize>) -> Result<()> {
        let applied = cursor.map_or(0, |idx| idx + 1);
        if applied > self.operations.len() {
            return Err(EngineError::InvalidParameter(format!(
                "cursor {} is outside the {} recorded operation(s)",
                applied - 1,
                self.operations.len()
            )));
        }
        self.applied = applied;
        Ok(())
    }

    /// Human-readable log, marking the operation the cursor sits on.
    pub fn listing(&self) -> Vec<String> {
        let marker = |applied: bool| if applied { "*" } else { " " };
        let mut lines = vec![format!("{} 0. Original data", marker(self.applied == 0))];
        lines.extend(self.operations.iter().enumerate().map(|(idx, op)| {
            format!(
                "{} {}. {} [{}]",
                marker(idx + 1 == self.applied),
                idx + 1,
                op.transform.describe(),
                op.timestamp.format("%Y-%m-%d %H:%M:%S")
            )
        }));
        lines
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let file =
            File::create(path).with_context(|| format!("Creating history file {path:?}"))?;
        serde_json::to_writer_pretty(file, self).context("Writing history JSON")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening history file {path:?}"))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).with_context(|| format!("Parsing history JSON {path:?}"))
    }
}

/// Table and pseudonym map produced by replaying a run of operations.
#[derive(Debug, Clone, PartialEq)]
pub struct Replayed {
    pub table: Table,
    pub pseudonyms: PseudonymMap,
}

/// Replays `operations` against `original`. A step whose column is gone is
/// reported as [`EngineError::StaleColumn`] with its 1-based position.
pub fn replay(original: &Table, operations: &[Operation]) -> Result<Replayed> {
    let mut table = original.clone();
    let mut pseudonyms = PseudonymMap::new();
    for (idx, operation) in operations.iter().enumerate() {
        let applied = apply_step(&table, operation, idx + 1)?;
        table = applied.table;
        if let Some(map) = applied.pseudonyms {
            pseudonyms = map;
        }
    }
    debug!(
        "Replayed {} operation(s): {} row(s) x {} column(s)",
        operations.len(),
        table.len(),
        table.column_count()
    );
    Ok(Replayed { table, pseudonyms })
}

pub(crate) fn apply_step(
    table: &Table,
    operation: &Operation,
    step: usize,
) -> Result<Applied> {
    operation
        .transform
        .apply(table)
        .map_err(|err| match err {
            EngineError::UnknownColumn(column) => EngineError::StaleColumn {
                step,
                operation: operation.transform.kind_name().to_string(),
                column,
            },
            other => other,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::Value,
        ops::{DropColumnsParams, FilterParams, SortDirection, SortParams},
    };

    fn sort_by(column: &str) -> Operation {
        Operation::new(Transform::Sort(SortParams {
            column: column.into(),
            direction: SortDirection::Asc,
        }))
    }

    fn sample() -> Table {
        Table::from_rows(
            vec!["name".into(), "age".into()],
            vec![
                vec!["Cy".into(), Value::Number(41.0)],
                vec!["Ada".into(), Value::Number(36.0)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn out_of_range_cursors_are_rejected_on_load() {
        for cursor in ["-2", "1", "9223372036854775807"] {
            let json = format!(r#"{{"operations": [], "cursor": {cursor}}}"#);
            let err = serde_json::from_str::<History>(&json).unwrap_err();
            assert!(err.to_string().contains("is outside the 0 recorded operation(s)"));
        }
        let empty: History = serde_json::from_str(r#"{"operations": [], "cursor": -1}"#).unwrap();
        assert_eq!(empty.cursor(), None);
    }

    #[test]
    fn push_after_undo_truncates_redo_tail() {
        let mut history = History::new();
        history.push(sort_by("a"));
        history.push(sort_by("b"));
        assert!(history.undo());
        history.push(sort_by("c"));
        assert_eq!(history.len(), 2);
        assert_eq!(history.cursor(), Some(1));
        assert!(!history.can_redo());
    }

    #[test]
    fn undo_and_redo_stop_at_the_ends() {
        let mut history = History::new();
        assert!(!history.undo());
        history.push(sort_by("a"));
        assert!(history.undo());
        assert_eq!(history.cursor(), None);
        assert!(!history.undo());
        assert!(history.redo());
        assert!(!history.redo());
        assert_eq!(history.cursor(), Some(0));
    }

    #[test]
    fn serialises_cursor_as_index_with_minus_one_for_original() {
        let mut history = History::new();
        history.push(sort_by("name"));
        history.undo();
        let json = serde_json::to_value(&history).unwrap();
        assert_eq!(json["cursor"], serde_json::json!(-1));
        assert_eq!(json["operations"][0]["type"], "sort");
        assert_eq!(json["operations"][0]["params"]["column"], "name");
        assert!(json["operations"][0]["timestamp"].is_string());

        let restored: History = serde_json::from_value(json).unwrap();
        assert_eq!(restored, history);
    }

    #[test]
    fn rejects_cursor_past_the_log() {
        let json = serde_json::json!({"operations": [], "cursor": 0});
        assert!(serde_json::from_value::<History>(json).is_err());
    }

    #[test]
    fn replay_reports_stale_columns_with_step() {
        let ops = vec![
            Operation::new(Transform::DropColumns(DropColumnsParams {
                columns: vec!["age".into()],
            })),
            Operation::new(Transform::Filter(FilterParams {
                column: "age".into(),
                value: "3".into(),
            })),
        ];
        let err = replay(&sample(), &ops).unwrap_err();
        assert_eq!(
            err,
            EngineError::StaleColumn {
                step: 2,
                operation: "filter".into(),
                column: "age".into()
            }
        );
    }

    #[test]
    fn listing_marks_the_cursor() {
        let mut history = History::new();
        history.push(sort_by("name"));
        history.push(sort_by("age"));
        history.undo();
        let listing = history.listing();
        assert_eq!(listing.len(), 3);
        assert!(listing[0].starts_with("  0. Original data"));
        assert!(listing[1].starts_with("* 1. Sort by \"name\" (asc)"));
        assert!(listing[2].starts_with("  2. Sort by \"age\" (asc)"));
    }
}
