//! Column specification resolution.
//!
//! A specification is one token naming columns of a table. It is tried against
//! these forms, in order:
//!
//! - `3-5`: an inclusive index range,
//! - `0,2,7`: an explicit index list,
//! - `:pattern`: the column of the first cell (row-major) whose text matches,
//! - `name,re.*`: header names, each a regex anchored to the whole name.

use regex::Regex;

use crate::{
    error::{TableError, TableResult},
    table::Table,
};

pub fn resolve_columns(token: &str, table: &Table) -> TableResult<Vec<usize>> {
    if let Some((low, high)) = parse_range(token) {
        return resolve_range(token, low, high, table.width());
    }
    if let Some(indices) = parse_index_list(token) {
        return check_indices(token, indices, table.width());
    }
    if let Some(pattern) = token.strip_prefix(':') {
        return resolve_by_value(token, pattern, table).map(|idx| vec![idx]);
    }
    resolve_by_name(token, &table.header)
}

/// Resolves a token that must name exactly one column.
pub fn resolve_single(token: &str, table: &Table) -> TableResult<usize> {
    match resolve_columns(token, table)?.as_slice() {
        [index] => Ok(*index),
        many => Err(TableError::resolution(
            token,
            format!("expected exactly one column, matched {}", many.len()),
        )),
    }
}

fn parse_range(token: &str) -> Option<(usize, usize)> {
    let (low, high) = token.split_once('-')?;
    if !is_digits(low) || !is_digits(high) {
        return None;
    }
    Some((low.parse().ok()?, high.parse().ok()?))
}

fn parse_index_list(token: &str) -> Option<Vec<usize>> {
    token
        .split(',')
        .map(|part| {
            if is_digits(part) {
                part.parse::<usize>().ok()
            } else {
                None
            }
        })
        .collect()
}

fn is_digits(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

fn resolve_range(token: &str, low: usize, high: usize, width: usize) -> TableResult<Vec<usize>> {
    if low > high {
        return Err(TableError::resolution(
            token,
            format!("range start {low} is after range end {high}"),
        ));
    }
    check_indices(token, (low..=high).collect(), width)
}

fn check_indices(token: &str, indices: Vec<usize>, width: usize) -> TableResult<Vec<usize>> {
    if let Some(bad) = indices.iter().find(|idx| **idx >= width) {
        return Err(TableError::resolution(
            token,
            format!("index {bad} is out of range for {width} column(s)"),
        ));
    }
    Ok(indices)
}

fn resolve_by_value(token: &str, pattern: &str, table: &Table) -> TableResult<usize> {
    let regex = compile_regex(token, pattern)?;
    for row in &table.rows {
        for (idx, cell) in row.iter().enumerate() {
            if let Some(value) = cell
                && regex.is_match(&value.as_display())
            {
                return Ok(idx);
            }
        }
    }
    Err(TableError::resolution(
        token,
        format!("no cell matches /{pattern}/"),
    ))
}

fn resolve_by_name(token: &str, header: &[String]) -> TableResult<Vec<usize>> {
    let mut indices = Vec::new();
    for segment in token.split(',') {
        let regex = compile_regex(token, &format!("^(?:{segment})$"))?;
        let before = indices.len();
        indices.extend(
            header
                .iter()
                .enumerate()
                .filter(|(_, name)| regex.is_match(name))
                .map(|(idx, _)| idx),
        );
        if indices.len() == before {
            return Err(TableError::ColumnResolution {
                token: token.to_string(),
                reason: format!("no header matches '{segment}'"),
                available: Some(header.to_vec()),
            });
        }
    }
    Ok(indices)
}

fn compile_regex(token: &str, pattern: &str) -> TableResult<Regex> {
    Regex::new(pattern)
        .map_err(|err| TableError::resolution(token, format!("invalid pattern: {err}")))
}
