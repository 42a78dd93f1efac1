//! Error handling for the cohort engine.
//!
//! Structural errors (unknown cohort names, missing required tables, bad
//! export formats) are returned to the caller. Data-availability gaps such
//! as unresolvable fields degrade gracefully and are only logged.

use thiserror::Error;

/// Specialized error type for cohort operations
#[derive(Debug, Error)]
pub enum CohortError {
    /// A cohort name that has not been created
    #[error("Cohort not found: {0}")]
    CohortNotFound(String),
    /// A table name missing from the table store
    #[error("Table not found: {0}")]
    TableNotFound(String),
    /// Invalid configuration or empty required inputs
    #[error("Configuration error: {0}")]
    Config(String),
    /// Export path with an unrecognized file extension
    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),
    /// Error from Arrow compute or schema operations
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    /// Error writing Parquet data
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    /// Error writing Excel data
    #[error("Excel error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
    /// Error opening or writing a file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for cohort operations
pub type Result<T> = std::result::Result<T, CohortError>;
