use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
};

use evalexpr::Value as EvalValue;
use itertools::Itertools;

/// A present cell value.
#[derive(Debug, Clone)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
}

/// A table cell; `None` is the absent marker.
pub type Cell = Option<Value>;

// Floats compare and hash by one bit pattern: -0.0 folds into 0.0 and every
// NaN is the same key.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => float_key(*a) == float_key(*b),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::String(s) => s.hash(state),
            Value::Integer(i) => i.hash(state),
            Value::Float(f) => float_key(*f).hash(state),
        }
    }
}

fn float_key(value: f64) -> u64 {
    normalize_float(value).to_bits()
}

fn normalize_float(value: f64) -> f64 {
    if value.is_nan() {
        f64::NAN
    } else {
        value + 0.0
    }
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::String(_) => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, Value::String(_))
    }

    /// Coerces a string into a number when its whole text is a numeric literal.
    ///
    /// Numbers are returned unchanged, so the conversion is idempotent.
    pub fn canonical(self) -> Value {
        match self {
            Value::String(s) => match parse_number(&s) {
                Some(number) => number,
                None => Value::String(s),
            },
            other => other,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

/// Canonicalizes a cell, leaving absent cells absent.
pub fn canonicalize(cell: Cell) -> Cell {
    cell.map(Value::canonical)
}

/// Renders a cell, substituting `absent` for the absent marker.
pub fn display_cell(cell: &Cell, absent: &str) -> String {
    match cell {
        Some(value) => value.as_display(),
        None => absent.to_string(),
    }
}

/// Joins the string forms of a group of cells with single spaces.
///
/// Returns absent when every cell in the group is absent.
pub fn merge_cells<'a>(cells: impl IntoIterator<Item = &'a Cell>) -> Cell {
    let present = cells.into_iter().flatten().collect::<Vec<_>>();
    if present.is_empty() {
        None
    } else {
        Some(Value::String(
            present.iter().map(|value| value.as_display()).join(" "),
        ))
    }
}

fn parse_number(text: &str) -> Option<Value> {
    if !text.bytes().any(|b| b.is_ascii_digit()) || has_protected_leading_zero(text) {
        return None;
    }
    if let Ok(integer) = text.parse::<i64>() {
        return Some(Value::Integer(integer));
    }
    text.parse::<f64>().ok().map(Value::Float)
}

// "007" and "-012" are identifiers, not numbers.
fn has_protected_leading_zero(text: &str) -> bool {
    let digits = text.strip_prefix(['-', '+']).unwrap_or(text).as_bytes();
    digits.len() >= 2 && digits[0] == b'0' && digits[1].is_ascii_digit()
}

fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

/// Total order used by the sort stage.
///
/// Absent compares as numeric zero; numbers order before strings.
pub fn compare_cells(left: &Cell, right: &Cell) -> Ordering {
    match (sort_key(left), sort_key(right)) {
        (SortKey::Number(a), SortKey::Number(b)) => a.total_cmp(&b),
        (SortKey::Number(_), SortKey::Text(_)) => Ordering::Less,
        (SortKey::Text(_), SortKey::Number(_)) => Ordering::Greater,
        (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
    }
}

enum SortKey<'a> {
    Number(f64),
    Text(&'a str),
}

fn sort_key(cell: &Cell) -> SortKey<'_> {
    match cell {
        None => SortKey::Number(0.0),
        Some(Value::Integer(i)) => SortKey::Number(*i as f64),
        Some(Value::Float(f)) => SortKey::Number(normalize_float(*f)),
        Some(Value::String(s)) => SortKey::Text(s),
    }
}

pub fn cell_to_evalexpr(cell: &Cell) -> EvalValue {
    match cell {
        Some(Value::String(s)) => EvalValue::String(s.clone()),
        Some(Value::Integer(i)) => EvalValue::Int(*i),
        Some(Value::Float(f)) => EvalValue::Float(*f),
        None => EvalValue::Empty,
    }
}

pub fn evalexpr_to_cell(value: EvalValue) -> Cell {
    match value {
        EvalValue::String(s) => Some(Value::String(s)),
        EvalValue::Int(i) => Some(Value::Integer(i)),
        EvalValue::Float(f) => Some(Value::Float(f)),
        EvalValue::Boolean(b) => Some(Value::String(b.to_string())),
        EvalValue::Tuple(values) => merge_cells(
            values
                .into_iter()
                .map(evalexpr_to_cell)
                .collect::<Vec<_>>()
                .iter(),
        ),
        EvalValue::Empty => None,
    }
}
