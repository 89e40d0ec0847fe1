#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use csv_refine::{data::Value, dataset::Table, io_utils};
use tempfile::{TempDir, tempdir};

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Ingests a comma-separated fixture the way the CLI does.
pub fn load_fixture(name: &str) -> Table {
    let text = fs::read_to_string(fixture_path(name)).expect("read fixture");
    io_utils::parse_table(&text, b',').expect("parse fixture")
}

/// Builds a table from literal columns and rows.
pub fn table_of(columns: &[&str], rows: Vec<Vec<Value>>) -> Table {
    Table::from_rows(columns.iter().map(|c| c.to_string()).collect(), rows).expect("table")
}

/// Stringified cells of one column, nulls as empty strings.
pub fn column_strings(table: &Table, column: &str) -> Vec<String> {
    let idx = table.column_index(column).expect("column exists");
    table.column_values(idx).map(Value::as_display).collect()
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    /// Path for a file the test expects a command to create.
    pub fn target(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }
}
