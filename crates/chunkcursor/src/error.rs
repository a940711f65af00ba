//! Error hierarchy for chunkcursor.
//!
//! Follows the "canonical error struct" pattern: a single public error type
//! with `is_xxx()` predicates, the classification itself stays private so new
//! kinds can be added without breaking callers.

use thiserror::Error;

/// Vendor error code reported for column indexes outside `[1, column_count]`.
pub const INVALID_COLUMN_INDEX_CODE: i32 = 200_032;

/// Root error type for cursor, downloader and coercion operations.
///
/// # Example
///
/// ```rust,ignore
/// use chunkcursor::CursorError;
///
/// fn handle(err: &CursorError) {
///     if err.is_recoverable() {
///         // retry with a corrected column reference
///     } else if err.is_closed() {
///         // the cursor was closed underneath us
///     }
/// }
/// ```
#[derive(Error, Debug, Clone)]
#[error("{kind}")]
pub struct CursorError {
    kind: ErrorKind,
}

/// Internal error classification.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub(crate) enum ErrorKind {
    /// A chunk payload could not be fetched.
    #[error("failed to fetch chunk {chunk}: {message}")]
    Fetch {
        chunk: usize,
        transient: bool,
        message: String,
    },

    /// A payload or a single cell could not be decoded.
    #[error("decode error: {message}")]
    Decode { message: String },

    /// Column index outside `[1, column_count]`.
    #[error("column index {index} out of range [1, {column_count}]")]
    IndexOutOfBounds { index: usize, column_count: usize },

    /// Column label lookup miss. The message echoes the caller's input.
    #[error("Column not found: {name}")]
    ColumnNotFound { name: String },

    /// Row data requested after `close()`.
    #[error("result set is closed")]
    ClosedResultSet,

    /// Row data requested while the cursor is not positioned on a row.
    #[error("cursor is not positioned on a row")]
    NoCurrentRow,

    /// Memory budget has no headroom for the requested charge.
    #[error("memory budget exceeded: requested {requested} bytes, {available} available")]
    MemoryBudgetExceeded { requested: u64, available: u64 },

    /// Caller passed an argument outside the accepted domain.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration could not be loaded or validated.
    #[error("configuration error: {0}")]
    Config(String),

    /// No async runtime available for background fetches.
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl CursorError {
    // ═══════════════════════════════════════════════════════════════════════
    // Constructors
    // ═══════════════════════════════════════════════════════════════════════

    /// Create error for a failed chunk fetch.
    #[must_use]
    pub fn fetch(chunk: usize, transient: bool, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Fetch {
                chunk,
                transient,
                message: message.into(),
            },
        }
    }

    /// Create error for a malformed payload or cell.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Decode {
                message: message.into(),
            },
        }
    }

    /// Create error for a column index outside the result's column range.
    #[must_use]
    pub const fn index_out_of_bounds(index: usize, column_count: usize) -> Self {
        Self {
            kind: ErrorKind::IndexOutOfBounds {
                index,
                column_count,
            },
        }
    }

    /// Create error for an unknown column label.
    #[must_use]
    pub fn column_not_found(name: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::ColumnNotFound { name: name.into() },
        }
    }

    /// Create error for access to a closed cursor.
    #[must_use]
    pub const fn closed() -> Self {
        Self {
            kind: ErrorKind::ClosedResultSet,
        }
    }

    /// Create error for row access outside a row.
    #[must_use]
    pub const fn no_current_row() -> Self {
        Self {
            kind: ErrorKind::NoCurrentRow,
        }
    }

    /// Create error for an exhausted memory budget.
    #[must_use]
    pub const fn memory_budget_exceeded(requested: u64, available: u64) -> Self {
        Self {
            kind: ErrorKind::MemoryBudgetExceeded {
                requested,
                available,
            },
        }
    }

    /// Create error for an invalid argument.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::InvalidArgument(message.into()),
        }
    }

    /// Create error for invalid configuration.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Config(message.into()),
        }
    }

    /// Create error for a missing or unusable async runtime.
    #[must_use]
    pub fn runtime(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Runtime(message.into()),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Predicate Methods (is_xxx)
    // ═══════════════════════════════════════════════════════════════════════

    /// Returns true if this is a chunk fetch error.
    #[must_use]
    pub const fn is_fetch(&self) -> bool {
        matches!(self.kind, ErrorKind::Fetch { .. })
    }

    /// Returns true if this fetch error was transient (worth retrying).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Fetch {
                transient: true,
                ..
            }
        )
    }

    /// Returns true if this is a decode error.
    #[must_use]
    pub const fn is_decode(&self) -> bool {
        matches!(self.kind, ErrorKind::Decode { .. })
    }

    /// Returns true if this is a column index error.
    #[must_use]
    pub const fn is_index_out_of_bounds(&self) -> bool {
        matches!(self.kind, ErrorKind::IndexOutOfBounds { .. })
    }

    /// Returns true if this is a column lookup miss.
    #[must_use]
    pub const fn is_column_not_found(&self) -> bool {
        matches!(self.kind, ErrorKind::ColumnNotFound { .. })
    }

    /// Returns true if the cursor was already closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self.kind, ErrorKind::ClosedResultSet)
    }

    /// Returns true if the cursor was not positioned on a row.
    #[must_use]
    pub const fn is_no_current_row(&self) -> bool {
        matches!(self.kind, ErrorKind::NoCurrentRow)
    }

    /// Returns true if this is a memory budget error.
    #[must_use]
    pub const fn is_memory_budget_exceeded(&self) -> bool {
        matches!(self.kind, ErrorKind::MemoryBudgetExceeded { .. })
    }

    /// Returns true if this is an invalid argument error.
    #[must_use]
    pub const fn is_invalid_argument(&self) -> bool {
        matches!(self.kind, ErrorKind::InvalidArgument(_))
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self.kind, ErrorKind::Config(_))
    }

    /// Returns true if this is a runtime error.
    #[must_use]
    pub const fn is_runtime(&self) -> bool {
        matches!(self.kind, ErrorKind::Runtime(_))
    }

    /// Returns true if the caller may retry with a corrected column reference.
    ///
    /// Recoverable errors leave the cursor state untouched.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::IndexOutOfBounds { .. } | ErrorKind::ColumnNotFound { .. }
        )
    }

    /// Stable vendor error code, if this kind carries one.
    #[must_use]
    pub const fn vendor_code(&self) -> Option<i32> {
        match self.kind {
            ErrorKind::IndexOutOfBounds { .. } => Some(INVALID_COLUMN_INDEX_CODE),
            _ => None,
        }
    }

    /// Chunk index this error belongs to, for fetch errors.
    #[must_use]
    pub const fn chunk_index(&self) -> Option<usize> {
        match self.kind {
            ErrorKind::Fetch { chunk, .. } => Some(chunk),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for CursorError {
    fn from(err: serde_json::Error) -> Self {
        Self::decode(format!("malformed JSON payload: {err}"))
    }
}

/// Result type alias for cursor operations.
pub type Result<T> = std::result::Result<T, CursorError>;
