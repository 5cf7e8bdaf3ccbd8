//! Error types for costwatch-core
//!
//! Typed failures instead of silent defaults: missing cost figures and an
//! unreadable alert state fail the run, an unwritable alert state degrades it.

use costwatch_types::PeriodKey;
use std::path::PathBuf;
use thiserror::Error;

/// Core error type for costwatch operations
#[derive(Error, Debug)]
pub enum CoreError {
    // ===================
    // Input Errors
    // ===================
    #[error("Incomplete cost data: {field} - {reason}")]
    IncompleteInput { field: String, reason: String },

    // ===================
    // State Errors
    // ===================
    #[error("Alert state unavailable for period {period}")]
    StateUnavailable {
        period: PeriodKey,
        #[source]
        source: StoreError,
    },

    // ===================
    // Config Errors
    // ===================
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Failed to read file: {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },
}

impl CoreError {
    pub(crate) fn incomplete(field: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::IncompleteInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// A later run may succeed without any change to input or config
    pub fn is_retryable(&self) -> bool {
        match self {
            CoreError::StateUnavailable { source, .. } => source.is_transient(),
            _ => false,
        }
    }

    /// Actionable hint for the operator, when one exists
    pub fn suggestion(&self) -> Option<String> {
        match self {
            CoreError::IncompleteInput { field, .. } if field == "coverageStart" => Some(
                "Re-run the billing queries from the start of the month and the trailing windows"
                    .to_string(),
            ),
            CoreError::IncompleteInput { .. } => {
                Some("Check the cost data export for missing or malformed fields".to_string())
            }
            CoreError::StateUnavailable { .. } => Some(
                "Retry the run; alerts are not evaluated without the previous firing history"
                    .to_string(),
            ),
            CoreError::InvalidConfig { .. } => {
                Some("Set COSTWATCH_BUDGET_AMOUNT or budgetAmount in the config file".to_string())
            }
            CoreError::FileRead { path, .. } => {
                Some(format!("Check the file exists and is readable: {}", path.display()))
            }
            CoreError::ConfigParse { .. } => None,
        }
    }
}

/// Failure of a dedup state store operation
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("State store timed out after {timeout_ms}ms: {operation}")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    #[error("State store unavailable during {operation}")]
    Unavailable {
        operation: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Corrupt alert state for period {period}: {message}")]
    Corrupt { period: String, message: String },

    #[error("State schema version {found} is not supported (expected {expected})")]
    SchemaMismatch { found: i64, expected: i64 },

    #[error("Failed to create state directory: {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Timeouts and lock contention clear up on their own; corruption does not
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Timeout { .. } | StoreError::Unavailable { .. })
    }
}
