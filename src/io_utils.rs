//! Ingestion and export of delimited text.
//!
//! Whole tables live in memory, so input is read and decoded in one go
//! before parsing, and output is rendered to UTF-8 before transcoding.
//! A path of `-` stands for stdin or stdout.
//!
//! Ingestion takes column names from the header row, skips blank lines,
//! pads short rows with nulls and infers each cell's type with
//! [`infer_value`].

use std::{
    fs::{self, File},
    io::{self, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};
use log::{debug, warn};
use serde::Serialize;

use crate::{data::infer_value, dataset::Table};

pub const COMMA: u8 = b',';
pub const TAB: u8 = b'\t';

pub fn is_dash(path: &Path) -> bool {
    path.as_os_str() == "-"
}

/// Encoding for a WHATWG label such as `utf-8` or `windows-1252`; UTF-8 when absent.
pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    match label.map(str::trim) {
        None => Ok(UTF_8),
        Some(label) => Encoding::for_label(label.as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{label}'")),
    }
}

fn delimiter_for_extension(path: &Path) -> Option<u8> {
    let ext = path.extension()?.to_str()?;
    if ext.eq_ignore_ascii_case("tsv") || ext.eq_ignore_ascii_case("tab") {
        Some(TAB)
    } else if ext.eq_ignore_ascii_case("csv") {
        Some(COMMA)
    } else {
        None
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided
        .or_else(|| delimiter_for_extension(path))
        .unwrap_or(COMMA)
}

/// Explicit choice, then the output extension, then whatever the input used.
pub fn resolve_output_delimiter(path: Option<&Path>, provided: Option<u8>, input: u8) -> u8 {
    provided
        .or_else(|| path.and_then(delimiter_for_extension))
        .unwrap_or(input)
}

pub fn read_input_bytes(path: &Path) -> Result<Vec<u8>> {
    if is_dash(path) {
        let mut bytes = Vec::new();
        io::stdin()
            .lock()
            .read_to_end(&mut bytes)
            .context("Reading input from stdin")?;
        Ok(bytes)
    } else {
        fs::read(path).with_context(|| format!("Opening input file {path:?}"))
    }
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, actual, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(anyhow!("Input is not valid {}", actual.name()));
    }
    Ok(text.into_owned())
}

/// Reads and ingests a delimited file (or stdin for `-`).
pub fn read_table(path: &Path, delimiter: u8, encoding: &'static Encoding) -> Result<Table> {
    let bytes = read_input_bytes(path)?;
    let text = decode_bytes(&bytes, encoding).with_context(|| format!("Decoding {path:?}"))?;
    let table = parse_table(&text, delimiter).with_context(|| format!("Parsing {path:?}"))?;
    debug!(
        "Loaded {} row(s) x {} column(s) from {path:?}",
        table.len(),
        table.column_count()
    );
    Ok(table)
}

pub fn parse_table(text: &str, delimiter: u8) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true)
        .from_reader(text.as_bytes());
    let columns = reader
        .headers()
        .context("Reading header row")?
        .iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let mut table = Table::new(columns)?;
    for (idx, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Reading row {}", idx + 2))?;
        if record.len() == 1 && record.get(0) == Some("") {
            continue;
        }
        if record.len() > table.column_count() {
            warn!(
                "Row {} has {} field(s); keeping the first {}",
                idx + 2,
                record.len(),
                table.column_count()
            );
        }
        table.push_row(record.iter().map(infer_value).collect());
    }
    Ok(table)
}

/// Renders a table as delimited UTF-8 text: header first, nulls empty.
pub fn render_csv(table: &Table, delimiter: u8) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true)
        .from_writer(Vec::new());
    writer
        .write_record(table.columns())
        .context("Writing header row")?;
    for row in table.rows() {
        writer
            .write_record(row.iter().map(|value| value.as_display()))
            .context("Writing row")?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| anyhow!("Flushing CSV output: {}", err.error()))?;
    String::from_utf8(bytes).context("Rendering CSV output")
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) if !is_dash(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Creating output file {path:?}"))?,
        )),
        _ => Box::new(io::stdout().lock()),
    })
}

/// Writes the table to `path` (stdout when `None` or `-`) in `encoding`.
pub fn write_table(
    table: &Table,
    path: Option<&Path>,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<()> {
    let text = render_csv(table, delimiter)?;
    let (encoded, _, had_errors) = encoding.encode(&text);
    if had_errors {
        return Err(anyhow!(
            "Output contains characters that cannot be encoded as {}",
            encoding.name()
        ));
    }
    let mut output = open_output(path)?;
    output.write_all(&encoded).context("Writing CSV output")?;
    output.flush().context("Flushing CSV output")
}

/// Pretty-printed JSON; used for the pseudonym map export.
pub fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let mut output = open_output(Some(path))?;
    serde_json::to_writer_pretty(&mut output, value)
        .with_context(|| format!("Writing JSON to {path:?}"))?;
    writeln!(output).context("Writing JSON output")?;
    output.flush().context("Flushing JSON output")
}
