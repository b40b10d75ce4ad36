//! Lists the columns of an input with a sample value for each.

use std::io::Write;

use anyhow::{Context, Result};
use log::info;

use crate::{cli::ColumnsArgs, data::display_cell, ingest, render, table::Table};

pub fn execute(args: &ColumnsArgs) -> Result<()> {
    let options = args.input_options.read_options()?;
    let table = ingest::read_table(&args.input, &options)
        .with_context(|| format!("Reading input {:?}", args.input))?;
    if table.width() == 0 {
        info!("Input {:?} has no columns", args.input);
        return Ok(());
    }

    let headers = vec!["#".to_string(), "name".to_string(), "sample".to_string()];
    let rendered = render::render_table(Some(&headers), &column_rows(&table));
    std::io::stdout()
        .lock()
        .write_all(rendered.as_bytes())
        .context("Writing column listing")?;
    info!(
        "Listed {} column(s) from {:?}",
        table.width(),
        args.input
    );
    Ok(())
}

/// One row per column: index, name, and the first non-absent value.
pub fn column_rows(table: &Table) -> Vec<Vec<String>> {
    table
        .header
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let sample = table
                .column(idx)
                .find(|cell| cell.is_some())
                .map(|cell| display_cell(cell, ""))
                .unwrap_or_default();
            vec![idx.to_string(), name.clone(), sample]
        })
        .collect()
}
