//! Error types for validation, compilation and execution.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::Dataset;

/// Machine-readable reason attached to every validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReasonCode {
    MalformedQuery,
    UnknownDataset,
    UnknownField,
    UnknownOperator,
    OperatorTypeMismatch,
    InvalidRange,
    EmptyValueSet,
    UnexpectedValue,
    UnknownCountry,
    TypeCoercionError,
    InvalidRegex,
    InvalidSortDirection,
    LimitOutOfRange,
}

impl ReasonCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ReasonCode::MalformedQuery => "MalformedQuery",
            ReasonCode::UnknownDataset => "UnknownDataset",
            ReasonCode::UnknownField => "UnknownField",
            ReasonCode::UnknownOperator => "UnknownOperator",
            ReasonCode::OperatorTypeMismatch => "OperatorTypeMismatch",
            ReasonCode::InvalidRange => "InvalidRange",
            ReasonCode::EmptyValueSet => "EmptyValueSet",
            ReasonCode::UnexpectedValue => "UnexpectedValue",
            ReasonCode::UnknownCountry => "UnknownCountry",
            ReasonCode::TypeCoercionError => "TypeCoercionError",
            ReasonCode::InvalidRegex => "InvalidRegex",
            ReasonCode::InvalidSortDirection => "InvalidSortDirection",
            ReasonCode::LimitOutOfRange => "LimitOutOfRange",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejected query: what went wrong and where in the input.
///
/// `path` addresses the offending element of the input document, e.g.
/// `filters[1].value[0]` or `sort[0].direction`. Validation is a pure
/// function of the input, so resubmitting the same query reproduces the
/// same error.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{reason}: {message} (at {path})")]
pub struct ValidationError {
    pub reason: ReasonCode,
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(reason: ReasonCode, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            reason,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Internal invariant violations detected while compiling a validated query.
///
/// These indicate a programming defect, never bad user input.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("field '{field}' belongs to dataset '{field_dataset}', not '{dataset}'")]
    FieldOutsideDataset {
        field: &'static str,
        field_dataset: Dataset,
        dataset: Dataset,
    },

    #[error("fetch size {0} is outside 1..={max}", max = crate::validator::MAX_LIMIT)]
    FetchSizeOutOfRange(u32),
}

/// Coarse classification of [`QueryError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Compilation,
    Execution,
}

/// Any failure along validate → compile → execute.
#[derive(thiserror::Error, Debug)]
pub enum QueryError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("compilation failed: {0}")]
    Compilation(#[from] CompileError),

    #[error("execution failed: {0}")]
    Execution(#[from] rusqlite::Error),
}

impl QueryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueryError::Validation(_) => ErrorKind::Validation,
            QueryError::Compilation(_) => ErrorKind::Compilation,
            QueryError::Execution(_) => ErrorKind::Execution,
        }
    }

    /// The validation details, if this is a validation failure.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            QueryError::Validation(e) => Some(e),
            _ => None,
        }
    }
}

/// Convenience result type.
pub type QueryResult<T> = Result<T, QueryError>;
