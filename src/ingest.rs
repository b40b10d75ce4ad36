//! Builds a [`Table`] from delimited, whitespace, key=value, or JSON-lines text.
//!
//! Empty fields become absent cells. Row widths are reconciled once the whole
//! input is read: short rows are padded and missing header names are
//! synthesized as `col<N>`.

use std::{collections::HashMap, path::Path};

use anyhow::{Context, Result};
use encoding_rs::{Encoding, UTF_8};
use log::debug;

use crate::{
    cli::InputFormat,
    data::{Cell, Value},
    error::{TableError, TableResult},
    io_utils,
    table::Table,
};

/// How an input is decoded and split into rows.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    pub format: InputFormat,
    /// Whether the first row of a delimited input names the columns.
    pub has_header: bool,
    /// Explicit column names; for key=value and JSON-lines inputs, the keys to keep.
    pub fields: Option<Vec<String>>,
    /// Maximum number of data rows read from each input.
    pub limit: Option<usize>,
    pub encoding: &'static Encoding,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            format: InputFormat::Auto,
            has_header: true,
            fields: None,
            limit: None,
            encoding: UTF_8,
        }
    }
}

pub fn read_table(path: &Path, options: &ReadOptions) -> Result<Table> {
    let text = io_utils::read_input_text(path, options.encoding)?;
    let table = parse_text(&text, options).with_context(|| format!("Parsing {path:?}"))?;
    debug!(
        "Read {} row(s) x {} column(s) from {:?}",
        table.len(),
        table.width(),
        path
    );
    Ok(table.with_source(path.display().to_string()))
}

pub fn parse_text(text: &str, options: &ReadOptions) -> TableResult<Table> {
    let format = match options.format {
        InputFormat::Auto => sniff_format(text),
        explicit => explicit,
    };
    debug!("Parsing input as {format:?}");
    match format {
        InputFormat::Csv => read_delimited(text, b',', options),
        InputFormat::Tsv => read_delimited(text, b'\t', options),
        InputFormat::Space => Ok(read_whitespace(text, options)),
        InputFormat::Kv => read_key_values(text, options),
        InputFormat::Jsonl | InputFormat::Auto => read_json_lines(text, options),
    }
}

/// Guesses the format from the first non-empty line.
pub fn sniff_format(text: &str) -> InputFormat {
    let Some(line) = text.lines().find(|line| !line.trim().is_empty()) else {
        return InputFormat::Space;
    };
    let trimmed = line.trim_start();
    if trimmed.starts_with('{') {
        InputFormat::Jsonl
    } else if line.contains('\t') {
        InputFormat::Tsv
    } else if trimmed.split_whitespace().all(|token| token.contains('=')) {
        InputFormat::Kv
    } else if line.contains(',') {
        InputFormat::Csv
    } else {
        InputFormat::Space
    }
}

fn text_cell(field: &str) -> Cell {
    if field.is_empty() {
        None
    } else {
        Some(Value::String(field.to_string()))
    }
}

fn read_delimited(text: &str, delimiter: u8, options: &ReadOptions) -> TableResult<Table> {
    let mut reader = io_utils::open_csv_reader(text.as_bytes(), delimiter);
    let mut records = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|err| {
            TableError::Format(format!("delimited record {}: {err}", line + 1))
        })?;
        records.push(record.iter().map(text_cell).collect::<Vec<_>>());
    }
    Ok(assemble(records, options))
}

fn read_whitespace(text: &str, options: &ReadOptions) -> Table {
    let records = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.split_whitespace().map(text_cell).collect())
        .collect();
    assemble(records, options)
}

/// Splits off the header row (unless fields are given or there is none) and
/// applies the row limit.
fn assemble(mut records: Vec<Vec<Cell>>, options: &ReadOptions) -> Table {
    let header = match &options.fields {
        Some(fields) => Some(fields.clone()),
        None if options.has_header && !records.is_empty() => Some(
            records
                .remove(0)
                .into_iter()
                .map(|cell| cell.map(|value| value.as_display()).unwrap_or_default())
                .collect(),
        ),
        None => None,
    };
    if let Some(limit) = options.limit {
        records.truncate(limit);
    }
    Table::from_parts(header, records)
}

/// Columns discovered row by row, in first-seen order.
#[derive(Default)]
struct DiscoveredColumns {
    names: Vec<String>,
    positions: HashMap<String, usize>,
}

impl DiscoveredColumns {
    fn position(&mut self, name: &str) -> usize {
        if let Some(position) = self.positions.get(name) {
            return *position;
        }
        self.names.push(name.to_string());
        self.positions.insert(name.to_string(), self.names.len() - 1);
        self.names.len() - 1
    }

    fn into_table(self, rows: Vec<Vec<Cell>>, fields: Option<&[String]>) -> Table {
        let table = Table::from_parts(Some(self.names), rows);
        match fields {
            Some(fields) => select_fields(table, fields),
            None => table,
        }
    }
}

fn select_fields(table: Table, fields: &[String]) -> Table {
    let positions = fields
        .iter()
        .map(|field| table.header.iter().position(|name| name == field))
        .collect::<Vec<_>>();
    let rows = table
        .rows
        .into_iter()
        .map(|row| {
            positions
                .iter()
                .map(|position| position.and_then(|idx| row[idx].clone()))
                .collect()
        })
        .collect();
    Table::new(fields.to_vec(), rows)
}

fn set_cell(row: &mut Vec<Cell>, position: usize, cell: Cell) {
    if row.len() <= position {
        row.resize(position + 1, None);
    }
    row[position] = cell;
}

fn read_key_values(text: &str, options: &ReadOptions) -> TableResult<Table> {
    let mut columns = DiscoveredColumns::default();
    let mut rows = Vec::new();
    for (line_idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        if options.limit.is_some_and(|limit| rows.len() >= limit) {
            break;
        }
        let mut row = Vec::new();
        for token in line.split_whitespace() {
            let (name, value) = token.split_once('=').ok_or_else(|| {
                TableError::Format(format!(
                    "expected name=value but found '{token}' on line {}",
                    line_idx + 1
                ))
            })?;
            set_cell(&mut row, columns.position(name), text_cell(value));
        }
        rows.push(row);
    }
    Ok(columns.into_table(rows, options.fields.as_deref()))
}

fn read_json_lines(text: &str, options: &ReadOptions) -> TableResult<Table> {
    let mut columns = DiscoveredColumns::default();
    let mut rows = Vec::new();
    for (line_idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        if options.limit.is_some_and(|limit| rows.len() >= limit) {
            break;
        }
        let parsed: serde_json::Value = serde_json::from_str(line).map_err(|err| {
            TableError::Format(format!("invalid JSON on line {}: {err}", line_idx + 1))
        })?;
        let serde_json::Value::Object(record) = parsed else {
            return Err(TableError::Format(format!(
                "line {} is not a JSON object",
                line_idx + 1
            )));
        };
        let mut row = Vec::new();
        for (key, value) in record {
            set_cell(&mut row, columns.position(&key), json_cell(value));
        }
        rows.push(row);
    }
    Ok(columns.into_table(rows, options.fields.as_deref()))
}

fn json_cell(value: serde_json::Value) -> Cell {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(text) => text_cell(&text),
        other => Some(Value::String(other.to_string())),
    }
}
