//! In-memory table model.
//!
//! A [`Table`] is an ordered list of rows sharing one header. Rows are stored
//! positionally (one [`Value`] per column) so every row always carries the
//! full column set; absent cells are [`Value::Null`], never omitted.
//! Operators never mutate a table they were given; they build a new one.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{
    data::Value,
    error::{EngineError, Result},
};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

/// Borrowed view of one row addressed by column name.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl<'a> Record<'a> {
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        self.columns
            .iter()
            .position(|name| name == column)
            .and_then(|idx| self.values.get(idx))
    }
}

impl Table {
    pub fn new(columns: Vec<String>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(EngineError::DuplicateColumn(column.clone()));
            }
        }
        Ok(Self {
            columns,
            rows: Vec::new(),
        })
    }

    /// Builds a table, rejecting rows whose width differs from the header.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        let mut table = Self::new(columns)?;
        let expected = table.columns.len();
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != expected {
                return Err(EngineError::RaggedRow {
                    row: idx,
                    expected,
                    found: row.len(),
                });
            }
        }
        table.rows = rows;
        Ok(table)
    }

    /// Appends a row, padding short rows with nulls and dropping surplus cells.
    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| EngineError::UnknownColumn(name.to_string()))
    }

    pub fn record(&self, row: usize) -> Option<Record<'_>> {
        self.rows.get(row).map(|values| Record {
            columns: &self.columns,
            values,
        })
    }

    pub fn column_values(&self, column: usize) -> impl Iterator<Item = &Value> {
        self.rows.iter().filter_map(move |row| row.get(column))
    }

    /// Same header, new rows. Callers guarantee the row widths.
    pub(crate) fn with_rows(&self, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Removes the named columns; names not present are ignored.
    pub fn without_columns(&self, names: &[String]) -> Self {
        let keep = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, column)| !names.contains(column))
            .map(|(idx, _)| idx)
            .collect::<Vec<_>>();
        if keep.len() == self.columns.len() {
            return self.clone();
        }
        let columns = keep.iter().map(|&idx| self.columns[idx].clone()).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| keep.iter().map(|&idx| row[idx].clone()).collect())
            .collect();
        Self { columns, rows }
    }

    /// Adds a column at the end, or overwrites it in place when the name exists.
    pub fn with_column(&self, name: &str, values: Vec<Value>) -> Result<Self> {
        if values.len() != self.rows.len() {
            return Err(EngineError::InvalidParameter(format!(
                "column '{name}' has {} value(s) for {} row(s)",
                values.len(),
                self.rows.len()
            )));
        }
        let mut table = self.clone();
        match table.column_index(name) {
            Some(idx) => {
                for (row, value) in table.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                table.columns.push(name.to_string());
                for (row, value) in table.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(table)
    }
}
