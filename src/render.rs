//! Renders the final table as delimited text, an aligned grid, or one field
//! per line.

use std::{borrow::Cow, fmt::Write as _, io::Write};

use anyhow::{Context, Result};

use crate::{data::display_cell, io_utils, table::Table};

pub const ROW_NUMBER_HEADER: &str = "#";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    #[default]
    Flat,
    Aligned,
    Blowup,
}

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub mode: RenderMode,
    pub delimiter: u8,
    pub include_header: bool,
    pub row_numbers: bool,
    /// Text printed in place of absent cells.
    pub absent: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            mode: RenderMode::Flat,
            delimiter: io_utils::DEFAULT_OUTPUT_DELIMITER,
            include_header: true,
            row_numbers: false,
            absent: String::new(),
        }
    }
}

pub fn render<W: Write>(table: &Table, options: &RenderOptions, writer: &mut W) -> Result<()> {
    match options.mode {
        RenderMode::Flat => render_flat(table, options, writer),
        RenderMode::Aligned => {
            let (header, rows) = text_grid(table, options);
            let header = options.include_header.then_some(header.as_slice());
            writer
                .write_all(render_table(header, &rows).as_bytes())
                .context("Writing aligned table")
        }
        RenderMode::Blowup => writer
            .write_all(render_blowup(table, &options.absent).as_bytes())
            .context("Writing expanded rows"),
    }?;
    writer.flush().context("Flushing output")
}

/// Header and rows as display strings, with the optional row-number column.
fn text_grid(table: &Table, options: &RenderOptions) -> (Vec<String>, Vec<Vec<String>>) {
    let mut header = Vec::with_capacity(table.width() + 1);
    if options.row_numbers {
        header.push(ROW_NUMBER_HEADER.to_string());
    }
    header.extend(table.header.iter().cloned());
    let rows = table
        .rows
        .iter()
        .enumerate()
        .map(|(idx, row)| {
            let mut line = Vec::with_capacity(row.len() + 1);
            if options.row_numbers {
                line.push((idx + 1).to_string());
            }
            line.extend(row.iter().map(|cell| display_cell(cell, &options.absent)));
            line
        })
        .collect();
    (header, rows)
}

fn render_flat<W: Write>(table: &Table, options: &RenderOptions, writer: &mut W) -> Result<()> {
    let (header, rows) = text_grid(table, options);
    if header.is_empty() {
        return Ok(());
    }
    let mut csv_writer = io_utils::open_csv_writer(writer, options.delimiter);
    if options.include_header {
        csv_writer
            .write_record(&header)
            .context("Writing header row")?;
    }
    for (idx, row) in rows.iter().enumerate() {
        csv_writer
            .write_record(row)
            .with_context(|| format!("Writing output row {}", idx + 1))?;
    }
    csv_writer.flush().context("Flushing delimited output")
}

/// Aligned columns separated by two spaces, with a dashed rule under the header.
pub fn render_table(header: Option<&[String]>, rows: &[Vec<String>]) -> String {
    let column_count = header
        .map(<[String]>::len)
        .or_else(|| rows.first().map(Vec::len))
        .unwrap_or(0);
    let mut widths = match header {
        Some(names) => names.iter().map(|h| display_width(h)).collect::<Vec<_>>(),
        None => vec![0; column_count],
    };
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }
    // Columns are at least as wide as the dashed rule under the header.
    let floor = if header.is_some() { 3 } else { 1 };
    for width in &mut widths {
        *width = (*width).max(floor);
    }

    let mut output = String::new();
    if let Some(names) = header {
        let _ = writeln!(output, "{}", format_row(names, &widths));
        let rule = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
        let _ = writeln!(output, "{}", format_row(&rule, &widths));
    }
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

/// One `name: value` line per column, each row introduced by a banner.
pub fn render_blowup(table: &Table, absent: &str) -> String {
    let mut output = String::new();
    for (idx, row) in table.rows.iter().enumerate() {
        let _ = writeln!(output, "--- row {} ---", idx + 1);
        for (name, cell) in table.header.iter().zip(row) {
            let _ = writeln!(
                output,
                "{name}: {}",
                sanitize_cell(&display_cell(cell, absent))
            );
        }
    }
    output
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let mut line = values
        .iter()
        .zip(widths)
        .map(|(value, width)| {
            let sanitized = sanitize_cell(value);
            let padding = width.saturating_sub(display_width(&sanitized));
            format!("{sanitized}{}", " ".repeat(padding))
        })
        .collect::<Vec<_>>()
        .join("  ");
    line.truncate(line.trim_end().len());
    line
}

fn display_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            // ANSI escape, e.g. \x1b[31m
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            width += 1;
        }
    }
    width
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
