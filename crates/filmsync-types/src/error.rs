//! Error types for the core vocabulary.

use thiserror::Error;

/// Errors raised while reading typed fields out of a [`crate::Row`].
///
/// A missing field and a `NULL` field are distinct conditions: the
/// first means the query and the reader disagree about the row shape,
/// the second is a legitimate absence in the data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    /// The row has no field with the requested name.
    #[error("row has no field '{0}'")]
    MissingField(String),

    /// The field exists but holds `NULL` where a value is required.
    #[error("field '{0}' is null")]
    NullField(String),

    /// The field exists but holds a different type than requested.
    #[error("field '{field}' is not a {expected}")]
    WrongType {
        field: String,
        expected: &'static str,
    },
}

/// Errors raised while loading settings or resolving index names.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Settings could not be read or deserialized.
    #[error("configuration error: {0}")]
    Load(String),

    /// An index name outside the closed set of destinations.
    #[error("unknown index '{0}' (expected movies, genres or persons)")]
    UnknownIndex(String),
}
