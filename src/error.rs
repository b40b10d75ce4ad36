//! Error types for the table engine.
//!
//! Command handlers wrap these in `anyhow` with context; library callers can
//! match on [`TableError`] directly (or `downcast_ref` it out of an
//! `anyhow::Error`).

use thiserror::Error;

/// Errors raised while resolving, compiling, or executing a pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TableError {
    /// A column specification did not resolve against the table.
    #[error("cannot resolve column '{token}': {reason}{}", available_suffix(.available))]
    ColumnResolution {
        token: String,
        reason: String,
        available: Option<Vec<String>>,
    },

    /// A stage token could not be compiled.
    #[error("cannot compile '{token}': {reason}")]
    Compile { token: String, reason: String },

    /// Tables handed to concatenation do not share a header.
    #[error("header mismatch: expected [{}] but found [{}]", .expected.join(", "), .found.join(", "))]
    SchemaMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// Input text or a mandatory numeric field was malformed.
    #[error("format error: {0}")]
    Format(String),

    /// An embedded expression failed while evaluating a row.
    #[error("expression '{expression}' failed at row {row}: {message}")]
    Expression {
        expression: String,
        row: usize,
        message: String,
    },

    /// Configuration values contradict the table being processed.
    #[error("configuration error: {0}")]
    Config(String),
}

fn available_suffix(available: &Option<Vec<String>>) -> String {
    match available {
        Some(names) => format!(" (available: {})", names.join(", ")),
        None => String::new(),
    }
}

impl TableError {
    pub(crate) fn resolution(token: &str, reason: impl Into<String>) -> Self {
        TableError::ColumnResolution {
            token: token.to_string(),
            reason: reason.into(),
            available: None,
        }
    }

    pub(crate) fn compile(token: &str, reason: impl Into<String>) -> Self {
        TableError::Compile {
            token: token.to_string(),
            reason: reason.into(),
        }
    }
}

pub type TableResult<T> = std::result::Result<T, TableError>;
