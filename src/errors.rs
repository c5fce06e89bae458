// src/errors.rs

//! Error taxonomy for enrichment runs.
//!
//! Two levels matter here:
//! - [`ConfigError`] fails a whole task before its first row, and never
//!   escalates past that task.
//! - [`LookupFailure`] fails a single row; it is rendered into the output
//!   cell and the batch keeps going.
//!
//! Everything else (unreadable workbook, bad config file, ...) is plain
//! `anyhow::Error` and is fatal to the run.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("sheet '{0}' not found in workbook")]
    MissingSheet(String),

    #[error("column '{column}' not found in sheet '{sheet}'")]
    MissingColumn { sheet: String, column: String },

    #[error("{task} expects {expected} input column(s), got {got}")]
    InputArity {
        task: String,
        expected: &'static str,
        got: usize,
    },

    #[error("missing credentials: {0}")]
    MissingCredentials(String),

    #[error("invalid task configuration: {0}")]
    Invalid(String),
}

/// Per-row lookup failure. Never escalates beyond the row it happened on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupFailure {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("parse error: {0}")]
    Parse(String),
}

impl LookupFailure {
    /// Short tag used in logs and run summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            LookupFailure::InvalidInput(_) => "invalid_input",
            LookupFailure::Backend(_) => "backend",
            LookupFailure::Timeout(_) => "timeout",
            LookupFailure::Parse(_) => "parse",
        }
    }
}
