//! Executes a compiled pipeline against a table and drives the `process` command.

use anyhow::{Context, Result, anyhow};
use log::{debug, info};

use crate::{
    cli::{ProcessArgs, RenderArgs},
    concat,
    data::{Cell, Value, compare_cells, merge_cells},
    error::TableResult,
    histogram, ingest, io_utils,
    plan::{self, Pipeline, PipelineConfig, Predicate, Stage, Transformation},
    render, stats,
    table::Table,
};

pub fn execute(args: &ProcessArgs) -> Result<()> {
    if args.inputs.is_empty() {
        return Err(anyhow!("At least one --input must be provided"));
    }
    let options = args.input.read_options()?;
    let mut tables = Vec::with_capacity(args.inputs.len());
    for path in &args.inputs {
        let table = ingest::read_table(path, &options)
            .with_context(|| format!("Reading input {path:?}"))?;
        info!(
            "✓ Read {} row(s) from {:?}",
            table.len(),
            path
        );
        tables.push(table);
    }
    let tag = args
        .tag_source
        .as_deref()
        .map(|name| if name.is_empty() { concat::DEFAULT_SOURCE_COLUMN } else { name });
    let table = concat::concat(tables, tag).context("Concatenating inputs")?;
    run_and_render(table, &args.ops, &args.pipeline.config(), &args.render)
}

/// Compiles `ops` against `table`, executes them, and renders the result.
///
/// Nothing is written unless every stage succeeds.
pub fn run_and_render(
    mut table: Table,
    ops: &[String],
    config: &PipelineConfig,
    render_args: &RenderArgs,
) -> Result<()> {
    let pipeline = plan::compile(ops, &table, config).context("Compiling operations")?;
    for stage in &pipeline.stages {
        debug!("Stage: {}", stage.describe());
    }
    execute_pipeline(&mut table, &pipeline).context("Executing pipeline")?;
    info!(
        "Pipeline produced {} row(s) across {} column(s)",
        table.len(),
        table.width()
    );

    let options = render_args.render_options();
    let mut writer = io_utils::open_output(render_args.output.as_deref())?;
    render::render(&table, &options, &mut writer)
}

/// Applies every stage of `pipeline` to `table` in place.
pub fn execute_pipeline(table: &mut Table, pipeline: &Pipeline) -> TableResult<()> {
    let mut executor = Executor {
        canonical: vec![false; table.width()],
    };
    for stage in &pipeline.stages {
        executor.apply(table, stage)?;
    }
    if let Some(names) = &pipeline.header_override {
        table.override_header(names)?;
    }
    Ok(())
}

struct Executor {
    // Columns already canonicalized since the last layout change.
    canonical: Vec<bool>,
}

impl Executor {
    fn apply(&mut self, table: &mut Table, stage: &Stage) -> TableResult<()> {
        match stage {
            Stage::Project { groups, names } => {
                project(table, groups, names);
                self.canonical = vec![false; table.width()];
            }
            Stage::Select { column, predicate } => {
                self.ensure_canonical(table, *column);
                select(table, *column, predicate)?;
            }
            Stage::Transform { column, function } => {
                self.ensure_canonical(table, *column);
                transform(table, *column, function)?;
                self.canonical[*column] = false;
            }
            Stage::SplitColumn { column, delimiter } => {
                split_column(table, *column, delimiter);
                self.canonical[*column] = false;
                self.canonical.insert(*column + 1, false);
            }
            Stage::Sort { column, reverse } => {
                self.ensure_canonical(table, *column);
                sort(table, *column, *reverse);
            }
            Stage::Histogram {
                columns,
                max_exemplars,
            } => {
                histogram::apply_histogram(table, columns, *max_exemplars);
                self.canonical.push(true);
            }
            Stage::Aggregate { columns } => {
                stats::apply_aggregate(table, columns)?;
                self.canonical = vec![true; table.width()];
            }
        }
        Ok(())
    }

    fn ensure_canonical(&mut self, table: &mut Table, column: usize) {
        if !self.canonical[column] {
            table.canonicalize_column(column);
            self.canonical[column] = true;
        }
    }
}

fn project(table: &mut Table, groups: &[Vec<usize>], names: &[String]) {
    table.rows = table
        .rows
        .iter()
        .map(|row| {
            groups
                .iter()
                .map(|group| match group.as_slice() {
                    [single] => row[*single].clone(),
                    members => merge_cells(members.iter().map(|idx| &row[*idx])),
                })
                .collect()
        })
        .collect();
    table.header = names.to_vec();
}

fn select(table: &mut Table, column: usize, predicate: &Predicate) -> TableResult<()> {
    let mut kept = Vec::with_capacity(table.len());
    for (row_idx, row) in table.rows.drain(..).enumerate() {
        let cell = &row[column];
        let keep = match predicate {
            Predicate::Expression(expr) => expr.evaluate_to_bool(cell, row_idx)?,
            Predicate::Search(regex) => cell
                .as_ref()
                .is_some_and(|value| regex.is_match(&value.as_display())),
            Predicate::Equals(text) => cell
                .as_ref()
                .is_some_and(|value| value.as_display() == *text),
            Predicate::IsAbsent => cell.is_none(),
        };
        if keep {
            kept.push(row);
        }
    }
    table.rows = kept;
    Ok(())
}

fn transform(table: &mut Table, column: usize, function: &Transformation) -> TableResult<()> {
    for (row_idx, row) in table.rows.iter_mut().enumerate() {
        let cell = &mut row[column];
        *cell = match function {
            Transformation::Expression(expr) => expr.evaluate_to_cell(cell, row_idx)?,
            Transformation::Substitute {
                regex,
                replacement,
                global,
            } => cell.as_ref().map(|value| {
                let text = value.as_display();
                let replaced = if *global {
                    regex.replace_all(&text, replacement.as_str())
                } else {
                    regex.replace(&text, replacement.as_str())
                };
                Value::String(replaced.into_owned())
            }),
        };
    }
    Ok(())
}

fn split_column(table: &mut Table, column: usize, delimiter: &str) {
    for row in &mut table.rows {
        let (pre, post) = match row[column].take() {
            None => (None, None),
            Some(value) => {
                let text = value.as_display();
                match text.split_once(delimiter) {
                    Some((pre, post)) => (part_cell(pre), part_cell(post)),
                    None => (Some(value), None),
                }
            }
        };
        row[column] = pre;
        row.insert(column + 1, post);
    }
    let name = table.header[column].clone();
    table.header[column] = format!("{name}.0");
    table.header.insert(column + 1, format!("{name}.1"));
}

fn part_cell(text: &str) -> Cell {
    (!text.is_empty()).then(|| Value::String(text.to_string()))
}

fn sort(table: &mut Table, column: usize, reverse: bool) {
    // `sort_by` is stable; reversing the comparator keeps ties in input order.
    if reverse {
        table
            .rows
            .sort_by(|a, b| compare_cells(&b[column], &a[column]));
    } else {
        table
            .rows
            .sort_by(|a, b| compare_cells(&a[column], &b[column]));
    }
}
