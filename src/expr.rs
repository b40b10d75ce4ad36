//! Restricted expression evaluation for `?expr` and `%expr` stages.
//!
//! Expressions are evaluated by `evalexpr`, which only knows arithmetic,
//! comparison, boolean logic, string literals, and the functions registered
//! here. Two variables are bound per row: `_` (the canonical cell value,
//! empty when absent) and `i` (the zero-based row index).

use anyhow::Result;
use std::cell::RefCell;

use evalexpr::{
    ContextWithMutableFunctions, ContextWithMutableVariables, DefaultNumericTypes, EvalexprError, Function,
    HashMapContext, Node, Value as EvalValue, build_operator_tree,
};
use heck::ToSnakeCase;
use regex::Regex;

use crate::{
    data::{Cell, cell_to_evalexpr, evalexpr_to_cell},
    error::{TableError, TableResult},
};

pub const VALUE_VARIABLE: &str = "_";
pub const ROW_VARIABLE: &str = "i";

type EvalResult = std::result::Result<EvalValue, EvalexprError>;

fn register(context: &mut HashMapContext, name: &str, function: Function<DefaultNumericTypes>) -> Result<()> {
    context
        .set_function(name.to_string(), function)
        .map_err(|err| anyhow::anyhow!("Registering function '{name}': {err}"))
}

fn register_functions(context: &mut HashMapContext) -> Result<()> {
    register(
        context,
        "lower",
        Function::new(|argument: &EvalValue| -> EvalResult {
            let args = expect_args(argument, 1, "lower")?;
            Ok(EvalValue::String(expect_string(&args[0], "lower")?.to_lowercase()))
        }),
    )?;
    register(
        context,
        "upper",
        Function::new(|argument: &EvalValue| -> EvalResult {
            let args = expect_args(argument, 1, "upper")?;
            Ok(EvalValue::String(expect_string(&args[0], "upper")?.to_uppercase()))
        }),
    )?;
    register(
        context,
        "trim",
        Function::new(|argument: &EvalValue| -> EvalResult {
            let args = expect_args(argument, 1, "trim")?;
            Ok(EvalValue::String(
                expect_string(&args[0], "trim")?.trim().to_string(),
            ))
        }),
    )?;
    register(
        context,
        "snake",
        Function::new(|argument: &EvalValue| -> EvalResult {
            let args = expect_args(argument, 1, "snake")?;
            Ok(EvalValue::String(
                expect_string(&args[0], "snake")?.to_snake_case(),
            ))
        }),
    )?;
    register(
        context,
        "len",
        Function::new(|argument: &EvalValue| -> EvalResult {
            let args = expect_args(argument, 1, "len")?;
            let text = display_string(&args[0]);
            Ok(EvalValue::Int(text.chars().count() as i64))
        }),
    )?;
    register(
        context,
        "substr",
        Function::new(|argument: &EvalValue| -> EvalResult {
            let args = expect_args(argument, 3, "substr")?;
            let text = display_string(&args[0]);
            let start = expect_int(&args[1], "substr")?.max(0) as usize;
            let length = expect_int(&args[2], "substr")?.max(0) as usize;
            Ok(EvalValue::String(
                text.chars().skip(start).take(length).collect(),
            ))
        }),
    )?;
    register(
        context,
        "matches",
        Function::new(|argument: &EvalValue| -> EvalResult {
            let args = expect_args(argument, 2, "matches")?;
            let regex = build_regex(expect_string(&args[1], "matches")?)?;
            Ok(EvalValue::Boolean(regex.is_match(&display_string(&args[0]))))
        }),
    )?;
    register(
        context,
        "sub",
        Function::new(|argument: &EvalValue| -> EvalResult {
            let args = expect_args(argument, 3, "sub")?;
            let regex = build_regex(expect_string(&args[1], "sub")?)?;
            let replacement = expect_string(&args[2], "sub")?;
            Ok(EvalValue::String(
                regex
                    .replace_all(&display_string(&args[0]), replacement)
                    .into_owned(),
            ))
        }),
    )?;
    register(
        context,
        "num",
        Function::new(|argument: &EvalValue| -> EvalResult {
            let args = expect_args(argument, 1, "num")?;
            match &args[0] {
                EvalValue::Int(i) => Ok(EvalValue::Int(*i)),
                EvalValue::Float(f) => Ok(EvalValue::Float(*f)),
                other => {
                    let text = display_string(other);
                    let trimmed = text.trim();
                    if let Ok(i) = trimmed.parse::<i64>() {
                        Ok(EvalValue::Int(i))
                    } else {
                        trimmed.parse::<f64>().map(EvalValue::Float).map_err(|_| {
                            eval_error(&format!("num: '{text}' is not a number"))
                        })
                    }
                }
            }
        }),
    )?;
    register(
        context,
        "str",
        Function::new(|argument: &EvalValue| -> EvalResult {
            let args = expect_args(argument, 1, "str")?;
            Ok(EvalValue::String(display_string(&args[0])))
        }),
    )?;
    register(
        context,
        "is_absent",
        Function::new(|argument: &EvalValue| -> EvalResult {
            let args = expect_args(argument, 1, "is_absent")?;
            Ok(EvalValue::Boolean(matches!(args[0], EvalValue::Empty)))
        }),
    )?;
    Ok(())
}

fn expect_args(arguments: &EvalValue, expected: usize, name: &str) -> Result<Vec<EvalValue>, EvalexprError> {
    match arguments {
        EvalValue::Tuple(values) if expected > 1 => {
            if values.len() != expected {
                return Err(eval_error(&format!(
                    "{name} expects {expected} arguments, got {}",
                    values.len()
                )));
            }
            Ok(values.clone())
        }
        value if expected == 1 => Ok(vec![value.clone()]),
        _ => Err(eval_error(&format!(
            "{name} expects {expected} arguments provided as a tuple"
        ))),
    }
}

fn eval_error(message: &str) -> EvalexprError {
    EvalexprError::CustomMessage(message.to_string())
}

fn expect_string<'a>(value: &'a EvalValue, name: &str) -> Result<&'a str, EvalexprError> {
    if let EvalValue::String(s) = value {
        Ok(s)
    } else {
        Err(eval_error(&format!("{name} expects a string, got {value:?}")))
    }
}

fn expect_int(value: &EvalValue, name: &str) -> Result<i64, EvalexprError> {
    match value {
        EvalValue::Int(i) => Ok(*i),
        EvalValue::Float(f) => Ok(*f as i64),
        other => Err(eval_error(&format!("{name} expects an integer, got {other:?}"))),
    }
}

fn build_regex(pattern: &str) -> Result<Regex, EvalexprError> {
    Regex::new(pattern).map_err(|err| eval_error(&format!("invalid regex: {err}")))
}

fn display_string(value: &EvalValue) -> String {
    match value {
        EvalValue::String(s) => s.clone(),
        EvalValue::Empty => String::new(),
        other => other.to_string(),
    }
}

/// An expression bound to one column, ready to evaluate row by row.
///
/// The operator tree and the function table are built once; each row only
/// rebinds `_` and `i`.
#[derive(Debug, Clone)]
pub struct CellExpression {
    source: String,
    tree: Node,
    context: RefCell<HashMapContext>,
}

impl CellExpression {
    /// Parses an expression, rejecting syntax errors before any row is read.
    pub fn parse(token: &str, source: &str) -> TableResult<Self> {
        if source.trim().is_empty() {
            return Err(TableError::compile(token, "empty expression"));
        }
        let tree: Node = build_operator_tree(source)
            .map_err(|err| TableError::compile(token, format!("invalid expression: {err}")))?;
        let context = function_context().map_err(|err| TableError::compile(token, err.to_string()))?;
        Ok(Self {
            source: source.to_string(),
            tree,
            context: RefCell::new(context),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn evaluate(&self, cell: &Cell, row: usize) -> TableResult<EvalValue> {
        let mut context = self.context.borrow_mut();
        bind_row(&mut context, cell, row).map_err(|err| self.failure(row, err.to_string()))?;
        self.tree
            .eval_with_context(&*context)
            .map_err(|err| self.failure(row, err.to_string()))
    }

    pub fn evaluate_to_bool(&self, cell: &Cell, row: usize) -> TableResult<bool> {
        self.evaluate(cell, row).map(eval_value_truthy)
    }

    pub fn evaluate_to_cell(&self, cell: &Cell, row: usize) -> TableResult<Cell> {
        self.evaluate(cell, row).map(evalexpr_to_cell)
    }

    fn failure(&self, row: usize, message: String) -> TableError {
        TableError::Expression {
            expression: self.source.clone(),
            row,
            message,
        }
    }
}

fn function_context() -> Result<HashMapContext> {
    let mut context: HashMapContext = HashMapContext::new();
    register_functions(&mut context)?;
    Ok(context)
}

// Variables keep the type of their first assignment, so the previous row's
// bindings are dropped before rebinding.
fn bind_row(context: &mut HashMapContext, cell: &Cell, row: usize) -> Result<()> {
    context.clear_variables();
    context
        .set_value(VALUE_VARIABLE.to_string(), cell_to_evalexpr(cell))
        .map_err(|err| anyhow::anyhow!("Binding cell value: {err}"))?;
    context
        .set_value(ROW_VARIABLE.to_string(), EvalValue::Int(row as i64))
        .map_err(|err| anyhow::anyhow!("Binding row index: {err}"))?;
    Ok(())
}

pub fn eval_value_truthy(value: EvalValue) -> bool {
    match value {
        EvalValue::Boolean(b) => b,
        EvalValue::Int(i) => i != 0,
        EvalValue::Float(f) => f != 0.0,
        EvalValue::String(s) => !s.is_empty(),
        EvalValue::Tuple(values) => values.into_iter().any(eval_value_truthy),
        EvalValue::Empty => false,
    }
}
