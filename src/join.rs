use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result, anyhow};
use log::{debug, info};

use crate::{
    cli::JoinArgs,
    data::Cell,
    error::TableResult,
    ingest, process,
    resolve::resolve_single,
    table::Table,
};

pub fn execute(args: &JoinArgs) -> Result<()> {
    if args.inputs.len() < 2 {
        return Err(anyhow!("Join requires at least two --input files"));
    }
    let options = args.input.read_options()?;
    let tables = args
        .inputs
        .iter()
        .map(|path| {
            ingest::read_table(path, &options)
                .with_context(|| format!("Reading input {path:?}"))
        })
        .collect::<Result<Vec<_>>>()?;
    let joined = join_all(tables, &args.key, args.right_key.as_deref())
        .with_context(|| format!("Joining {} input(s) on '{}'", args.inputs.len(), args.key))?;
    info!(
        "Join complete: {} row(s) across {} column(s)",
        joined.len(),
        joined.width()
    );
    process::run_and_render(joined, &args.ops, &args.pipeline.config(), &args.render)
}

/// Full-outer equality join of two tables on one column each.
///
/// `right_key` defaults to `left_key`. Output columns are the left header with
/// `left_prefix` prepended to each name, followed by the prefixed right header.
pub fn join(
    left: &Table,
    right: &Table,
    left_key: &str,
    right_key: Option<&str>,
    left_prefix: &str,
    right_prefix: &str,
) -> TableResult<Table> {
    let left_index = resolve_single(left_key, left)?;
    let right_index = resolve_single(right_key.unwrap_or(left_key), right)?;
    Ok(join_on(
        left,
        right,
        left_index,
        right_index,
        left_prefix,
        right_prefix,
    ))
}

/// Joins tables left to right, prefixing every column with its table's ordinal.
///
/// The left key is resolved against the first table; at each later step it
/// refers to the same column of the accumulated table. The right key (or the
/// left key when absent) is resolved against each right table's own header.
pub fn join_all(tables: Vec<Table>, left_key: &str, right_key: Option<&str>) -> TableResult<Table> {
    let mut tables = tables.into_iter();
    let Some(first) = tables.next() else {
        return Ok(Table::default());
    };
    let left_index = resolve_single(left_key, &first)?;
    let mut accumulated = first;
    let mut left_prefix = "0.".to_string();
    for (offset, right) in tables.enumerate() {
        let right_index = resolve_single(right_key.unwrap_or(left_key), &right)?;
        let right_prefix = format!("{}.", offset + 1);
        accumulated = join_on(
            &accumulated,
            &right,
            left_index,
            right_index,
            &left_prefix,
            &right_prefix,
        );
        left_prefix.clear();
    }
    Ok(accumulated)
}

fn join_on(
    left: &Table,
    right: &Table,
    left_index: usize,
    right_index: usize,
    left_prefix: &str,
    right_prefix: &str,
) -> Table {
    let right_lookup = build_right_lookup(right, right_index);
    let left_keys = left
        .rows
        .iter()
        .map(|row| &row[left_index])
        .collect::<HashSet<_>>();
    let left_blank = vec![None; left.width()];
    let right_blank = vec![None; right.width()];

    let mut rows = Vec::with_capacity(left.len().max(right.len()));
    let mut matched_rows = 0usize;
    for left_row in &left.rows {
        match right_lookup.get(&left_row[left_index]) {
            Some(bucket) => {
                for right_position in bucket {
                    matched_rows += 1;
                    rows.push(combine(left_row, &right.rows[*right_position]));
                }
            }
            None => rows.push(combine(left_row, &right_blank)),
        }
    }
    for right_row in &right.rows {
        if !left_keys.contains(&right_row[right_index]) {
            rows.push(combine(&left_blank, right_row));
        }
    }
    debug!(
        "Joined {} left row(s) with {} right row(s): {} matched, {} emitted",
        left.len(),
        right.len(),
        matched_rows,
        rows.len()
    );

    let header = prefixed(&left.header, left_prefix)
        .chain(prefixed(&right.header, right_prefix))
        .collect();
    Table::new(header, rows)
}

fn build_right_lookup(right: &Table, key_index: usize) -> HashMap<&Cell, Vec<usize>> {
    let mut map: HashMap<&Cell, Vec<usize>> = HashMap::new();
    for (position, row) in right.rows.iter().enumerate() {
        map.entry(&row[key_index]).or_default().push(position);
    }
    map
}

fn combine(left: &[Cell], right: &[Cell]) -> Vec<Cell> {
    let mut combined = Vec::with_capacity(left.len() + right.len());
    combined.extend_from_slice(left);
    combined.extend_from_slice(right);
    combined
}

fn prefixed<'a>(header: &'a [String], prefix: &'a str) -> impl Iterator<Item = String> + 'a {
    header.iter().map(move |name| format!("{prefix}{name}"))
}
