//! Error type for Arrow chunk decoding.
//!
//! Same canonical shape as the engine error: an opaque struct with `is_xxx()`
//! predicates over a crate-private kind.

use chunkcursor::CursorError;
use thiserror::Error;

/// Failure while decoding or encoding an Arrow IPC chunk.
#[derive(Error, Debug)]
#[error("{kind}")]
pub struct ArrowDecodeError {
    kind: ErrorKind,
}

#[derive(Error, Debug)]
#[non_exhaustive]
pub(crate) enum ErrorKind {
    #[error("unsupported arrow type in column '{column}': {data_type}")]
    UnsupportedType { column: String, data_type: String },

    #[error("schema mismatch: expected {expected} columns, got {actual}")]
    SchemaMismatch { expected: usize, actual: usize },

    #[error("value conversion failed for column '{column}': {message}")]
    ValueConversion { column: String, message: String },

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),
}

impl ArrowDecodeError {
    // ═══════════════════════════════════════════════════════════════════════
    // Constructors
    // ═══════════════════════════════════════════════════════════════════════

    #[must_use]
    pub fn unsupported_type(column: impl Into<String>, data_type: impl ToString) -> Self {
        Self {
            kind: ErrorKind::UnsupportedType {
                column: column.into(),
                data_type: data_type.to_string(),
            },
        }
    }

    #[must_use]
    pub const fn schema_mismatch(expected: usize, actual: usize) -> Self {
        Self {
            kind: ErrorKind::SchemaMismatch { expected, actual },
        }
    }

    #[must_use]
    pub fn value_conversion(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::ValueConversion {
                column: column.into(),
                message: message.into(),
            },
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Predicate Methods (is_xxx)
    // ═══════════════════════════════════════════════════════════════════════

    #[must_use]
    pub const fn is_unsupported_type(&self) -> bool {
        matches!(self.kind, ErrorKind::UnsupportedType { .. })
    }

    #[must_use]
    pub const fn is_schema_mismatch(&self) -> bool {
        matches!(self.kind, ErrorKind::SchemaMismatch { .. })
    }

    #[must_use]
    pub const fn is_value_conversion(&self) -> bool {
        matches!(self.kind, ErrorKind::ValueConversion { .. })
    }

    #[must_use]
    pub const fn is_arrow_error(&self) -> bool {
        matches!(self.kind, ErrorKind::Arrow(_))
    }
}

impl From<arrow_schema::ArrowError> for ArrowDecodeError {
    fn from(err: arrow_schema::ArrowError) -> Self {
        Self {
            kind: ErrorKind::Arrow(err),
        }
    }
}

/// Every Arrow failure surfaces to the cursor as a decode error.
impl From<ArrowDecodeError> for CursorError {
    fn from(err: ArrowDecodeError) -> Self {
        Self::decode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ArrowDecodeError>;
