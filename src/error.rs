//! Validation failures raised by the engine.
//!
//! Every variant is reported before any state changes: a rejected request
//! leaves the current table, the history and any pending cluster proposal
//! exactly as they were.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Column '{0}' not found")]
    UnknownColumn(String),

    #[error("Column '{0}' appears more than once in the header")]
    DuplicateColumn(String),

    #[error("Row {row} has {found} value(s) but the table has {expected} column(s)")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Select at least one column to generate the hash ID")]
    NoHashColumns,

    #[error("Select at least one column to pseudonymize or drop")]
    NoPseudonymColumns,

    #[error("No clustering proposal is pending; propose clusters first")]
    NoPendingClusters,

    #[error("Cluster {index} does not exist ({count} cluster(s) proposed)")]
    ClusterIndexOutOfRange { index: usize, count: usize },

    #[error("Replay step {step} ({operation}) references column '{column}' which is no longer present")]
    StaleColumn {
        step: usize,
        operation: String,
        column: String,
    },

    #[error("Clustering was cancelled before completion")]
    ClusteringCancelled,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
