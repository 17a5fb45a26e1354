use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the coordinate parser, the loader, the mapping engine and
/// plan persistence.
///
/// Soft outcomes (a rule that matches nothing, an operator that falls back to
/// an all-false mask) are not errors; they are reported through
/// [`crate::engine::RuleOutcome`] and [`crate::observer::TraceEvent`].
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("Invalid {what} '{input}': {reason}")]
    Format {
        what: &'static str,
        input: String,
        reason: String,
    },

    #[error("{axis} index {index} is out of range for table '{table}' ({count} {axis}s)")]
    Range {
        axis: &'static str,
        index: usize,
        count: usize,
        table: String,
    },

    #[error("Cannot load workbook {path:?}: {reason}")]
    File { path: PathBuf, reason: String },

    #[error("Table '{key}' is not loaded")]
    UnknownTable { key: String },

    #[error("Mapping plan {path:?}: {reason}")]
    Plan { path: PathBuf, reason: String },

    #[error("Cannot write workbook {path:?}: {reason}")]
    Write { path: PathBuf, reason: String },
}

impl MappingError {
    pub(crate) fn format(what: &'static str, input: impl Into<String>, reason: impl Into<String>) -> Self {
        MappingError::Format {
            what,
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn column_out_of_range(index: usize, count: usize, table: &str) -> Self {
        MappingError::Range {
            axis: "column",
            index,
            count,
            table: table.to_string(),
        }
    }

    pub(crate) fn file(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        MappingError::File {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MappingError>;
