//! Logical column types, presentation types and decoded cell values.
//!
//! - [`LogicalType`] is what the server declares for a column.
//! - [`SqlType`] is how the client presents it, decided once per result.
//! - [`Cell`] is one decoded raw value inside a row batch.
//! - [`SqlValue`] is the owned value returned by `get_object`.

pub mod cell;
pub mod temporal;
pub mod value;

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

pub use cell::{Cell, Row, RowBatch};
pub use temporal::{Date, Time, Timestamp};
pub use value::SqlValue;

use crate::error::CursorError;

/// Column type as declared by the query service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalType {
    /// Exact numeric with precision and scale.
    Fixed,
    /// Double precision floating point.
    Real,
    /// Character data, including large text.
    Text,
    Binary,
    Boolean,
    Date,
    Time,
    TimestampNtz,
    TimestampLtz,
    TimestampTz,
}

impl LogicalType {
    /// Server-side type name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Fixed => "NUMBER",
            Self::Real => "DOUBLE",
            Self::Text => "VARCHAR",
            Self::Binary => "BINARY",
            Self::Boolean => "BOOLEAN",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::TimestampNtz => "TIMESTAMP_NTZ",
            Self::TimestampLtz => "TIMESTAMP_LTZ",
            Self::TimestampTz => "TIMESTAMP_TZ",
        }
    }

    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Fixed | Self::Real)
    }

    #[must_use]
    pub const fn is_temporal(self) -> bool {
        matches!(
            self,
            Self::Date | Self::Time | Self::TimestampNtz | Self::TimestampLtz | Self::TimestampTz
        )
    }

    #[must_use]
    pub const fn is_timestamp(self) -> bool {
        matches!(
            self,
            Self::TimestampNtz | Self::TimestampLtz | Self::TimestampTz
        )
    }

    /// Values of this type occupy a fixed number of bytes.
    #[must_use]
    pub const fn is_fixed_width(self) -> bool {
        !matches!(self, Self::Text | Self::Binary)
    }
}

impl FromStr for LogicalType {
    type Err = CursorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "fixed" | "number" | "decimal" | "numeric" | "integer" | "int" | "bigint" => {
                Self::Fixed
            }
            "real" | "double" | "float" => Self::Real,
            "text" | "varchar" | "string" | "char" | "clob" => Self::Text,
            "binary" | "varbinary" => Self::Binary,
            "boolean" => Self::Boolean,
            "date" => Self::Date,
            "time" => Self::Time,
            "timestamp_ntz" | "timestamp" | "datetime" => Self::TimestampNtz,
            "timestamp_ltz" => Self::TimestampLtz,
            "timestamp_tz" => Self::TimestampTz,
            other => {
                return Err(CursorError::invalid_argument(format!(
                    "unsupported column type: {other}"
                )));
            }
        })
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Client-side presentation of a column, with standard SQL type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    BigInt,
    Decimal,
    Double,
    Varchar,
    Binary,
    Boolean,
    Date,
    Time,
    Timestamp,
    TimestampWithTimezone,
}

impl SqlType {
    /// Numeric type code as used by standard database client APIs.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::BigInt => -5,
            Self::Decimal => 3,
            Self::Double => 8,
            Self::Varchar => 12,
            Self::Binary => -2,
            Self::Boolean => 16,
            Self::Date => 91,
            Self::Time => 92,
            Self::Timestamp => 93,
            Self::TimestampWithTimezone => 2014,
        }
    }

    /// Name of the Rust type `get_object` produces for this presentation.
    #[must_use]
    pub const fn value_type_name(self) -> &'static str {
        match self {
            Self::BigInt => "i64",
            Self::Decimal => "bigdecimal::BigDecimal",
            Self::Double => "f64",
            Self::Varchar => "String",
            Self::Binary => "Vec<u8>",
            Self::Boolean => "bool",
            Self::Date => "chunkcursor::Date",
            Self::Time => "chunkcursor::Time",
            Self::Timestamp | Self::TimestampWithTimezone => "chunkcursor::Timestamp",
        }
    }
}
