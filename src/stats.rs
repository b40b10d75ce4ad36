//! Descriptive statistics and the aggregate stage.
//!
//! The standard deviation is the population form (divides by `n`).

use std::collections::HashMap;

use crate::{
    data::{Cell, Value},
    error::{TableError, TableResult},
    table::Table,
};

pub const STAT_SUFFIXES: [&str; 5] = ["min", "mean", "stddev", "max", "sum"];

/// Running min/mean/stddev/max/sum over the numeric cells of one column.
#[derive(Debug, Clone, Default)]
pub struct ColumnStats {
    count: usize,
    sum: f64,
    sum_squares: f64,
    integer_sum: Option<i64>,
    min: Option<Value>,
    max: Option<Value>,
}

/// The five statistics of a non-empty sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub min: Value,
    pub mean: f64,
    pub stddev: f64,
    pub max: Value,
    pub sum: Value,
}

impl ColumnStats {
    pub fn new() -> Self {
        Self {
            integer_sum: Some(0),
            ..Self::default()
        }
    }

    /// Adds a cell; absent cells are skipped and strings are rejected.
    pub fn add_cell(&mut self, cell: &Cell) -> TableResult<()> {
        match cell {
            None => Ok(()),
            Some(value @ (Value::Integer(_) | Value::Float(_))) => {
                self.add_value(value);
                Ok(())
            }
            Some(Value::String(text)) => Err(TableError::Format(format!(
                "'{text}' is not numeric"
            ))),
        }
    }

    fn add_value(&mut self, value: &Value) {
        let Some(numeric) = value.as_f64() else {
            return;
        };
        self.count += 1;
        self.sum += numeric;
        self.sum_squares += numeric * numeric;
        self.integer_sum = match (self.integer_sum, value) {
            (Some(total), Value::Integer(i)) => total.checked_add(*i),
            _ => None,
        };
        if self.min.as_ref().and_then(Value::as_f64).is_none_or(|min| numeric < min) {
            self.min = Some(value.clone());
        }
        if self.max.as_ref().and_then(Value::as_f64).is_none_or(|max| numeric > max) {
            self.max = Some(value.clone());
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn summary(&self) -> Option<Summary> {
        let (min, max) = (self.min.clone()?, self.max.clone()?);
        let count = self.count as f64;
        let (low, high) = (min.as_f64()?, max.as_f64()?);
        // Float rounding can push the mean a hair outside [min, max].
        let mean = (self.sum / count).clamp(low, high);
        let variance = (self.sum_squares / count - mean * mean).max(0.0);
        let sum = match self.integer_sum {
            Some(total) => Value::Integer(total),
            None => Value::Float(self.sum),
        };
        Some(Summary {
            count: self.count,
            min,
            mean,
            stddev: variance.sqrt(),
            max,
            sum,
        })
    }

    /// Renders the five statistics as cells, all absent for an empty sequence.
    pub fn render_cells(&self) -> Vec<Cell> {
        match self.summary() {
            Some(summary) => vec![
                Some(summary.min),
                Some(Value::Float(summary.mean)),
                Some(Value::Float(summary.stddev)),
                Some(summary.max),
                Some(summary.sum),
            ],
            None => vec![None; STAT_SUFFIXES.len()],
        }
    }
}

/// Summarizes a sequence of cells, ignoring absent ones.
pub fn summarize<'a>(cells: impl IntoIterator<Item = &'a Cell>) -> TableResult<Option<Summary>> {
    let mut stats = ColumnStats::new();
    for cell in cells {
        stats.add_cell(cell)?;
    }
    Ok(stats.summary())
}

/// Groups rows by every column not in `columns` and replaces each aggregated
/// column with `<name>.min`, `.mean`, `.stddev`, `.max`, `.sum`.
pub fn apply_aggregate(table: &mut Table, columns: &[usize]) -> TableResult<()> {
    let mut targets = columns.to_vec();
    targets.sort_unstable();
    targets.dedup();
    for column in &targets {
        table.canonicalize_column(*column);
    }
    let width = table.width();
    let is_target = (0..width)
        .map(|idx| targets.binary_search(&idx).is_ok())
        .collect::<Vec<_>>();

    let mut positions: HashMap<Vec<Cell>, usize> = HashMap::new();
    let mut groups: Vec<(Vec<Cell>, Vec<ColumnStats>)> = Vec::new();
    for (row_idx, row) in table.rows.iter().enumerate() {
        let key = row
            .iter()
            .zip(&is_target)
            .filter(|(_, target)| !**target)
            .map(|(cell, _)| cell.clone())
            .collect::<Vec<_>>();
        let position = match positions.get(&key) {
            Some(position) => *position,
            None => {
                groups.push((key.clone(), vec![ColumnStats::new(); targets.len()]));
                positions.insert(key, groups.len() - 1);
                groups.len() - 1
            }
        };
        let stats = &mut groups[position].1;
        for (slot, column) in targets.iter().enumerate() {
            stats[slot].add_cell(&row[*column]).map_err(|err| {
                TableError::Format(format!(
                    "aggregating column '{}' at row {row_idx}: {err}",
                    table.header[*column]
                ))
            })?;
        }
    }

    let mut header = Vec::with_capacity(width + targets.len() * 4);
    for (idx, name) in table.header.iter().enumerate() {
        if is_target[idx] {
            header.extend(STAT_SUFFIXES.iter().map(|suffix| format!("{name}.{suffix}")));
        } else {
            header.push(name.clone());
        }
    }

    table.rows = groups
        .into_iter()
        .map(|(key, stats)| {
            let mut key = key.into_iter();
            let mut stats = stats.iter();
            let mut row = Vec::with_capacity(header.len());
            for target in &is_target {
                if *target {
                    if let Some(column_stats) = stats.next() {
                        row.extend(column_stats.render_cells());
                    }
                } else if let Some(cell) = key.next() {
                    row.push(cell);
                }
            }
            row
        })
        .collect();
    table.header = header;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[i64]) -> Vec<Cell> {
        values.iter().map(|v| Some(Value::Integer(*v))).collect()
    }

    #[test]
    fn summarize_uses_population_stddev() {
        let cells = ints(&[2, 4, 4, 4, 5, 5, 7, 9]);
        let summary = summarize(&cells).unwrap().unwrap();
        assert_eq!(summary.min, Value::Integer(2));
        assert_eq!(summary.max, Value::Integer(9));
        assert_eq!(summary.sum, Value::Integer(40));
        assert_eq!(summary.mean, 5.0);
        assert!((summary.stddev - 2.0).abs() < 1e-12);
    }

    #[test]
    fn summarize_skips_absent_and_mixes_floats() {
        let cells = vec![None, Some(Value::Float(1.5)), Some(Value::Integer(2)), None];
        let summary = summarize(&cells).unwrap().unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.sum, Value::Float(3.5));
        assert_eq!(summary.min, Value::Float(1.5));
    }

    #[test]
    fn summarize_of_nothing_is_none() {
        assert_eq!(summarize(&vec![None, None]).unwrap(), None);
        assert_eq!(ColumnStats::new().render_cells(), vec![None; 5]);
    }

    #[test]
    fn summarize_rejects_text() {
        let cells = vec![Some(Value::from("abc"))];
        assert!(matches!(summarize(&cells), Err(TableError::Format(_))));
    }

    #[test]
    fn aggregate_replaces_columns_in_place() {
        let mut table = Table::new(
            vec!["k".into(), "v".into(), "tag".into()],
            vec![
                vec![Some(Value::from("a")), Some(Value::from("1")), Some(Value::from("x"))],
                vec![Some(Value::from("b")), Some(Value::from("5")), Some(Value::from("x"))],
                vec![Some(Value::from("a")), Some(Value::from("3")), Some(Value::from("x"))],
            ],
        );
        apply_aggregate(&mut table, &[1]).expect("aggregate");
        assert_eq!(
            table.header,
            vec!["k", "v.min", "v.mean", "v.stddev", "v.max", "v.sum", "tag"]
        );
        assert_eq!(table.rows.len(), 2);
        assert_eq!(
            table.rows[0],
            vec![
                Some(Value::from("a")),
                Some(Value::Integer(1)),
                Some(Value::Float(2.0)),
                Some(Value::Float(1.0)),
                Some(Value::Integer(3)),
                Some(Value::Integer(4)),
                Some(Value::from("x")),
            ]
        );
        assert!(table.is_rectangular());
    }

    #[test]
    fn aggregate_reports_non_numeric_cells() {
        let mut table = Table::new(
            vec!["v".into()],
            vec![vec![Some(Value::from("oops"))]],
        );
        let err = apply_aggregate(&mut table, &[0]).unwrap_err();
        assert!(err.to_string().contains("aggregating column 'v'"));
    }
}
