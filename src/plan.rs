//! Compiles operation tokens into an ordered list of pipeline stages.
//!
//! Tokens are read left to right. Column specifications append projection
//! groups; every other token either adds a row stage (select, transform,
//! split) bound to the rightmost projected column, or marks that column for
//! the sort, histogram, or aggregate stage. Markers are offsets into the
//! projection being built, never indices into the input table.

use regex::Regex;

use crate::{
    error::{TableError, TableResult},
    expr::CellExpression,
    resolve::resolve_columns,
    table::Table,
};

const NO_COLUMN: &str = "no column specified";

/// Settings that shape a pipeline but do not come from operation tokens.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Replaces the final header when set.
    pub header_override: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub enum Predicate {
    Expression(CellExpression),
    Search(Regex),
    Equals(String),
    IsAbsent,
}

#[derive(Debug, Clone)]
pub enum Transformation {
    Expression(CellExpression),
    Substitute {
        regex: Regex,
        replacement: String,
        global: bool,
    },
}

#[derive(Debug, Clone)]
pub enum Stage {
    Project {
        groups: Vec<Vec<usize>>,
        names: Vec<String>,
    },
    Select {
        column: usize,
        predicate: Predicate,
    },
    Transform {
        column: usize,
        function: Transformation,
    },
    SplitColumn {
        column: usize,
        delimiter: String,
    },
    Sort {
        column: usize,
        reverse: bool,
    },
    Histogram {
        columns: Vec<usize>,
        max_exemplars: usize,
    },
    Aggregate {
        columns: Vec<usize>,
    },
}

impl Stage {
    pub fn describe(&self) -> String {
        match self {
            Stage::Project { names, .. } => format!("project [{}]", names.join(", ")),
            Stage::Select { column, predicate } => match predicate {
                Predicate::Expression(expr) => format!("select #{column} where {}", expr.source()),
                Predicate::Search(regex) => format!("select #{column} matching /{regex}/"),
                Predicate::Equals(text) => format!("select #{column} equal to '{text}'"),
                Predicate::IsAbsent => format!("select #{column} absent"),
            },
            Stage::Transform { column, function } => match function {
                Transformation::Expression(expr) => {
                    format!("transform #{column} with {}", expr.source())
                }
                Transformation::Substitute { regex, global, .. } => format!(
                    "substitute /{regex}/ in #{column}{}",
                    if *global { " globally" } else { "" }
                ),
            },
            Stage::SplitColumn { column, delimiter } => {
                format!("split #{column} on '{delimiter}'")
            }
            Stage::Sort { column, reverse } => format!(
                "sort by #{column} {}",
                if *reverse { "descending" } else { "ascending" }
            ),
            Stage::Histogram {
                columns,
                max_exemplars,
            } => format!("histogram over {columns:?} keeping {max_exemplars} exemplar(s)"),
            Stage::Aggregate { columns } => format!("aggregate {columns:?}"),
        }
    }
}

/// Compiled stages in execution order, plus the optional header override.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
    pub header_override: Option<Vec<String>>,
}

pub fn compile(tokens: &[String], table: &Table, config: &PipelineConfig) -> TableResult<Pipeline> {
    let mut compiler = Compiler::new(table);
    if tokens.is_empty() {
        compiler.append_all();
    }
    for token in tokens {
        compiler.compile_token(token)?;
    }
    Ok(compiler.finish(config))
}

struct Compiler<'a> {
    table: &'a Table,
    groups: Vec<Vec<usize>>,
    names: Vec<String>,
    // Columns in the working layout: projected groups plus columns added by splits.
    width: usize,
    row_stages: Vec<Stage>,
    sort: Option<(usize, bool)>,
    histogram: Vec<usize>,
    max_exemplars: usize,
    aggregate: Vec<usize>,
}

impl<'a> Compiler<'a> {
    fn new(table: &'a Table) -> Self {
        Self {
            table,
            groups: Vec::new(),
            names: Vec::new(),
            width: 0,
            row_stages: Vec::new(),
            sort: None,
            histogram: Vec::new(),
            max_exemplars: 1,
            aggregate: Vec::new(),
        }
    }

    fn compile_token(&mut self, token: &str) -> TableResult<()> {
        match token {
            ".sort" | ".sort-" => {
                let column = self.last_column(token)?;
                self.sort = Some((column, token.ends_with('-')));
            }
            ".all" => self.append_all(),
            ".agg" => {
                let column = self.last_column(token)?;
                self.aggregate.push(column);
            }
            _ if token.starts_with(".hist") && is_hist_token(token) => {
                let column = self.last_column(token)?;
                if let Some(cap) = parse_exemplar_cap(token)? {
                    self.max_exemplars = cap;
                }
                self.histogram.push(column);
            }
            _ if token.starts_with(".split=") => {
                let column = self.last_column(token)?;
                let delimiter = &token[".split=".len()..];
                if delimiter.is_empty() {
                    return Err(TableError::compile(token, "split delimiter is empty"));
                }
                self.row_stages.push(Stage::SplitColumn {
                    column,
                    delimiter: delimiter.to_string(),
                });
                self.width += 1;
            }
            _ if token.starts_with('?') => {
                let column = self.last_column(token)?;
                let expr = CellExpression::parse(token, &token[1..])?;
                self.row_stages.push(Stage::Select {
                    column,
                    predicate: Predicate::Expression(expr),
                });
            }
            _ if token.starts_with("s/") => {
                let column = self.last_column(token)?;
                let function = parse_substitution(token)?;
                self.row_stages.push(Stage::Transform { column, function });
            }
            _ if token.starts_with('/') => {
                let column = self.last_column(token)?;
                let pattern = &token[1..];
                let predicate = if pattern.is_empty() {
                    Predicate::IsAbsent
                } else {
                    Predicate::Search(compile_regex(token, pattern)?)
                };
                self.row_stages.push(Stage::Select { column, predicate });
            }
            _ if token.starts_with('=') => {
                let column = self.last_column(token)?;
                self.row_stages.push(Stage::Select {
                    column,
                    predicate: Predicate::Equals(token[1..].to_string()),
                });
            }
            _ if token.starts_with('%') => {
                let column = self.last_column(token)?;
                let expr = CellExpression::parse(token, &token[1..])?;
                self.row_stages.push(Stage::Transform {
                    column,
                    function: Transformation::Expression(expr),
                });
            }
            _ => {
                let group = resolve_columns(token, self.table)?;
                let name = group
                    .iter()
                    .map(|idx| self.table.header[*idx].as_str())
                    .collect::<Vec<_>>()
                    .join("+");
                self.push_group(group, name);
            }
        }
        Ok(())
    }

    fn append_all(&mut self) {
        for idx in 0..self.table.width() {
            self.push_group(vec![idx], self.table.header[idx].clone());
        }
    }

    fn push_group(&mut self, group: Vec<usize>, name: String) {
        self.groups.push(group);
        self.names.push(name);
        self.width += 1;
    }

    fn last_column(&self, token: &str) -> TableResult<usize> {
        self.width
            .checked_sub(1)
            .ok_or_else(|| TableError::compile(token, NO_COLUMN))
    }

    fn finish(self, config: &PipelineConfig) -> Pipeline {
        let mut stages = Vec::with_capacity(self.row_stages.len() + 4);
        stages.push(Stage::Project {
            groups: self.groups,
            names: self.names,
        });
        stages.extend(self.row_stages);
        if let Some((column, reverse)) = self.sort {
            stages.push(Stage::Sort { column, reverse });
        }
        if !self.histogram.is_empty() {
            stages.push(Stage::Histogram {
                columns: self.histogram,
                max_exemplars: self.max_exemplars,
            });
        }
        if !self.aggregate.is_empty() {
            stages.push(Stage::Aggregate {
                columns: self.aggregate,
            });
        }
        Pipeline {
            stages,
            header_override: config.header_override.clone(),
        }
    }
}

fn is_hist_token(token: &str) -> bool {
    token[".hist".len()..].bytes().all(|b| b.is_ascii_digit())
}

fn parse_exemplar_cap(token: &str) -> TableResult<Option<usize>> {
    let digits = &token[".hist".len()..];
    if digits.is_empty() {
        return Ok(None);
    }
    match digits.parse::<usize>() {
        Ok(0) | Err(_) => Err(TableError::compile(
            token,
            "exemplar count must be a positive integer",
        )),
        Ok(cap) => Ok(Some(cap)),
    }
}

fn compile_regex(token: &str, pattern: &str) -> TableResult<Regex> {
    Regex::new(pattern).map_err(|err| TableError::compile(token, format!("invalid regex: {err}")))
}

/// Parses `s/search/replace/` or `s/search/replace/g`.
fn parse_substitution(token: &str) -> TableResult<Transformation> {
    let parts = split_unescaped_slashes(&token[2..]);
    let (search, replacement, flags) = match parts.as_slice() {
        [search, replacement] => (search, replacement, ""),
        [search, replacement, flags] => (search, replacement, flags.as_str()),
        _ => {
            return Err(TableError::compile(
                token,
                "expected s/<search>/<replace>/[g]",
            ));
        }
    };
    let global = match flags {
        "" => false,
        "g" => true,
        other => {
            return Err(TableError::compile(
                token,
                format!("unknown substitution flag '{other}'"),
            ));
        }
    };
    Ok(Transformation::Substitute {
        regex: compile_regex(token, search)?,
        replacement: translate_replacement(replacement),
        global,
    })
}

fn split_unescaped_slashes(body: &str) -> Vec<String> {
    let mut parts = vec![String::new()];
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some('/') => current(&mut parts).push('/'),
                Some(next) => {
                    current(&mut parts).push('\\');
                    current(&mut parts).push(next);
                }
                None => current(&mut parts).push('\\'),
            },
            '/' => parts.push(String::new()),
            other => current(&mut parts).push(other),
        }
    }
    parts
}

fn current(parts: &mut [String]) -> &mut String {
    let last = parts.len() - 1;
    &mut parts[last]
}

/// Rewrites `\1`-style back-references into the `${1}` form and escapes `$`.
fn translate_replacement(replacement: &str) -> String {
    let mut translated = String::with_capacity(replacement.len());
    let mut chars = replacement.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.peek().copied() {
                Some(digit) if digit.is_ascii_digit() => {
                    chars.next();
                    translated.push_str(&format!("${{{digit}}}"));
                }
                Some('\\') => {
                    chars.next();
                    translated.push('\\');
                }
                _ => translated.push('\\'),
            },
            '$' => translated.push_str("$$"),
            other => translated.push(other),
        }
    }
    translated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Value;

    fn sample() -> Table {
        Table::new(
            vec!["k".to_string(), "v".to_string(), "w".to_string()],
            vec![vec![
                Some(Value::from("a")),
                Some(Value::from("1")),
                Some(Value::from("x")),
            ]],
        )
    }

    fn tokens(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    fn compile_tokens(raw: &[&str]) -> TableResult<Pipeline> {
        compile(&tokens(raw), &sample(), &PipelineConfig::default())
    }

    #[test]
    fn empty_token_list_projects_every_column() {
        let pipeline = compile_tokens(&[]).expect("compile");
        match &pipeline.stages[0] {
            Stage::Project { groups, names } => {
                assert_eq!(groups, &vec![vec![0], vec![1], vec![2]]);
                assert_eq!(names, &vec!["k", "v", "w"]);
            }
            other => panic!("unexpected stage {other:?}"),
        }
        assert_eq!(pipeline.stages.len(), 1);
    }

    #[test]
    fn markers_refer_to_projection_offsets() {
        let pipeline = compile_tokens(&["w", "k", ".sort-", "v", ".hist3"]).expect("compile");
        let sort = pipeline
            .stages
            .iter()
            .find_map(|s| match s {
                Stage::Sort { column, reverse } => Some((*column, *reverse)),
                _ => None,
            })
            .expect("sort stage");
        assert_eq!(sort, (1, true));
        let hist = pipeline
            .stages
            .iter()
            .find_map(|s| match s {
                Stage::Histogram {
                    columns,
                    max_exemplars,
                } => Some((columns.clone(), *max_exemplars)),
                _ => None,
            })
            .expect("histogram stage");
        assert_eq!(hist, (vec![2], 3));
    }

    #[test]
    fn stages_follow_fixed_execution_order() {
        let pipeline =
            compile_tokens(&["k", ".agg", "v", ".sort", "?_ > 0", ".hist"]).expect("compile");
        let kinds = pipeline
            .stages
            .iter()
            .map(|s| match s {
                Stage::Project { .. } => "project",
                Stage::Select { .. } => "select",
                Stage::Transform { .. } => "transform",
                Stage::SplitColumn { .. } => "split",
                Stage::Sort { .. } => "sort",
                Stage::Histogram { .. } => "histogram",
                Stage::Aggregate { .. } => "aggregate",
            })
            .collect::<Vec<_>>();
        assert_eq!(kinds, vec!["project", "select", "sort", "histogram", "aggregate"]);
    }

    #[test]
    fn stage_tokens_need_a_projected_column() {
        for token in [".sort", ".hist", ".agg", "?_", "/a", "=a", "%_", "s/a/b/", ".split=:"] {
            match compile_tokens(&[token]) {
                Err(TableError::Compile { reason, .. }) => assert_eq!(reason, NO_COLUMN),
                other => panic!("{token}: unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn split_shifts_the_last_projected_column() {
        let pipeline = compile_tokens(&["k", ".split=:", "/x"]).expect("compile");
        match &pipeline.stages[2] {
            Stage::Select { column, .. } => assert_eq!(*column, 1),
            other => panic!("unexpected stage {other:?}"),
        }
    }

    #[test]
    fn multi_column_specifications_form_one_merge_group() {
        for token in ["k,w", "0,2"] {
            let pipeline = compile_tokens(&[token]).expect("compile");
            match &pipeline.stages[0] {
                Stage::Project { groups, names } => {
                    assert_eq!(groups, &vec![vec![0, 2]]);
                    assert_eq!(names, &vec!["k+w"]);
                }
                other => panic!("unexpected stage {other:?}"),
            }
        }
    }

    #[test]
    fn plus_prefix_is_an_ordinary_column_specification() {
        let err = compile_tokens(&["+k,w"]).unwrap_err();
        assert!(matches!(err, TableError::ColumnResolution { .. }));
    }

    #[test]
    fn unknown_tokens_are_column_specifications() {
        let err = compile_tokens(&["missing"]).unwrap_err();
        assert!(matches!(err, TableError::ColumnResolution { .. }));
    }

    #[test]
    fn substitution_parses_flags_and_escapes() {
        match parse_substitution(r"s/a\/b/(\1)$/g").expect("parse") {
            Transformation::Substitute {
                regex,
                replacement,
                global,
            } => {
                assert_eq!(regex.as_str(), "a/b");
                assert_eq!(replacement, "(${1})$$");
                assert!(global);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(parse_substitution("s/a/b/x").is_err());
        assert!(parse_substitution("s/a").is_err());
    }

    #[test]
    fn bad_histogram_cap_is_rejected() {
        assert!(compile_tokens(&["k", ".hist0"]).is_err());
    }
}
