//! Custom error types for rustbiblio.
//!
//! This module defines all error types used throughout the application.
//! All functions return `Result<T, BiblioError>` instead of using `unwrap()`.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for rustbiblio operations.
///
/// Fatal conditions (unreadable input, bad schema, no store) and the
/// row-level conditions the normalizer converts into error records share
/// this type; callers tell them apart by variant.
#[derive(Debug, Error)]
pub enum BiblioError {
    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reading error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Any SQLite failure that is not a constraint violation
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Insert rejected by a UNIQUE, NOT NULL or FOREIGN KEY constraint
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// Target database already exists and overwrite was not requested
    #[error("database already exists at {}", .0.display())]
    AlreadyExists(PathBuf),

    /// Input CSV lacks a column the normalizer depends on
    #[error("{file}: missing required column '{column}'")]
    MissingColumn {
        /// Path of the offending CSV
        file: String,
        /// Column name that was not found in the header
        column: String,
    },

    /// Schema definition could not be loaded or applied
    #[error("Schema error: {0}")]
    Schema(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),
}

impl BiblioError {
    /// Classify a rusqlite error, splitting constraint violations out.
    pub fn from_sqlite(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(ref failure, ref msg) = err {
            if failure.code == rusqlite::ErrorCode::ConstraintViolation {
                let text = msg.clone().unwrap_or_else(|| failure.to_string());
                return BiblioError::Constraint(text);
            }
        }
        BiblioError::Sqlite(err)
    }

    /// True if this error is a constraint violation.
    pub fn is_constraint(&self) -> bool {
        matches!(self, BiblioError::Constraint(_))
    }
}

/// Result type alias using `BiblioError`
pub type Result<T> = std::result::Result<T, BiblioError>;

/// Extension trait for adding context to Option types
pub trait OptionExt<T> {
    /// Convert Option to Result with a config error message
    fn ok_or_config(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_config(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| BiblioError::Config(msg.to_string()))
    }
}
