//! Error types for the data-loader crate.
//!
//! Every variant here is fatal for a pipeline run: a broken export is
//! surfaced immediately and no partial tables are returned.

use thiserror::Error;

/// Errors that can occur while reading and shaping the tabular exports
#[derive(Error, Debug)]
pub enum DataLoadError {
    /// File could not be found or opened
    #[error("Failed to open file: {path}")]
    FileNotFound { path: String },

    /// I/O error occurred while reading file
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The CSV reader itself failed (bad quoting, invalid UTF-8, ...)
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Line in data file couldn't be parsed
    ///
    /// This variant stores context about where the error occurred
    #[error("Parse error at line {line} in {file}: {reason}")]
    ParseError {
        file: String,
        line: u64,
        reason: String,
    },

    /// A data field had a value outside its domain (e.g. rating not in {0,1})
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// A column required by a transformation is not present
    #[error("Missing column '{column}' in {table} table")]
    MissingColumn { column: String, table: String },

    /// A column would shadow an existing one after expansion
    #[error("Column '{column}' already exists in {table} table")]
    DuplicateColumn { column: String, table: String },

    /// A column does not have one value per row
    #[error("Column '{column}' has {found} values but the table has {expected} rows")]
    ColumnLengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, DataLoadError>;
