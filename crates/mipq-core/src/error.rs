//! Error types for all mipq operations.

use thiserror::Error;

use crate::types::PropertyType;

/// Top-level error type for mipq operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl Error {
    /// Returns `true` if this error is a comparison against an absent or null
    /// value, the one failure a residual filter recovers from per record.
    pub fn is_null_comparison(&self) -> bool {
        matches!(self, Error::Filter(FilterError::NullComparison { .. }))
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    #[error("invalid filter type: {0}")]
    InvalidFilterType(String),

    #[error("unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("cannot compare absent or null value of property '{property}'")]
    NullComparison { property: String },

    #[error("type mismatch on property '{property}': cannot order {actual} against {expected}")]
    TypeMismatch {
        property: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("invalid expression: {0}")]
    InvalidExpression(String),
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(
        "inequality filters on more than one property: '{first}' and '{second}' in the same query"
    )]
    MultipleInequalityProperties { first: String, second: String },
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("model already exists: {0}")]
    ModelAlreadyExists(String),

    #[error(
        "type mismatch for property '{property}' of model '{model}': declared {expected:?}, got {actual}"
    )]
    PropertyTypeMismatch {
        model: String,
        property: String,
        expected: PropertyType,
        actual: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("unsupported JSON value for property '{property}': {found}")]
    UnsupportedValue { property: String, found: String },

    #[error("invalid {expected:?} literal for property '{property}': {value:?}")]
    InvalidTemporal {
        property: String,
        expected: PropertyType,
        value: String,
    },

    #[error("expected a JSON object, got {0}")]
    NotAnObject(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("corrupted record: {0}")]
    CorruptedRecord(String),

    #[error("record serialization failed: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, Error>;
