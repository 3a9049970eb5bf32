use std::io;
use thiserror::Error;

/// Unified error type for all stacq operations.
///
/// Errors propagate upward through the call stack with the `?` operator.
/// Search validation errors ([`Error::UnsupportedOption`],
/// [`Error::ConflictingOptions`], [`Error::UnknownColumn`]) are always raised
/// before any row is scanned, so a failed search never returns a partial
/// result.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error while reading catalog documents or parquet files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Arrow library error during columnar operations.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet library error while persisting or loading a table.
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Malformed JSON in a catalog document, item, or CQL2-JSON filter.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid user input or API parameter.
    ///
    /// The message describes what was invalid and why. These errors are
    /// recoverable: fix the input and retry the call.
    #[error("Invalid argument: {0}")]
    InvalidArgumentError(String),

    /// A recognized STAC API search option that this toolkit deliberately
    /// does not implement, such as `query` or open-ended datetime intervals.
    ///
    /// Callers must express the equivalent constraint another way (for
    /// `query`, use `filter`); the option is never silently ignored.
    #[error("unsupported search option: {0}")]
    UnsupportedOption(String),

    /// Two supplied search options specify the same constraint.
    #[error("conflicting search options: `{0}` and `{1}` cannot be combined")]
    ConflictingOptions(&'static str, &'static str),

    /// A filter expression referenced a column that does not exist in the
    /// table being searched.
    #[error("unknown column in filter expression: `{0}`")]
    UnknownColumn(String),

    /// Malformed CQL2 filter expression.
    #[error("filter parse error: {0}")]
    FilterParse(String),

    /// Malformed GeoJSON or WKT geometry.
    #[error("geometry parse error: {0}")]
    GeometryParse(String),

    /// Internal error indicating a bug or unexpected state.
    #[error("an internal operation failed: {0}")]
    Internal(String),
}

impl Error {
    /// Create a filter parse error from any displayable error.
    #[inline]
    pub fn filter_parse<E: std::fmt::Display>(err: E) -> Self {
        Error::FilterParse(err.to_string())
    }

    /// Create a geometry parse error from any displayable error.
    #[inline]
    pub fn geometry_parse<E: std::fmt::Display>(err: E) -> Self {
        Error::GeometryParse(err.to_string())
    }
}
