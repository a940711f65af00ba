//! Logical type to Arrow type mapping.
//!
//! | Logical type | Arrow type | Notes |
//! |--------------|------------|-------|
//! | FIXED(p, 0), p <= 18 | Int64 | |
//! | FIXED(p, s) | Decimal128(p, s) | precision capped at 38 |
//! | REAL | Float64 | |
//! | TEXT | Utf8 | |
//! | BINARY | Binary | |
//! | BOOLEAN | Boolean | |
//! | DATE | Date32 | days since epoch |
//! | TIME | Time64(Nanosecond) | |
//! | TIMESTAMP_NTZ | Timestamp(Nanosecond, None) | |
//! | TIMESTAMP_LTZ/TZ | Timestamp(Nanosecond, "UTC") | |

use arrow_schema::{DataType, Field, Schema, TimeUnit};
use chunkcursor::{ColumnDescriptor, LogicalType, ResultSetMetadata};

/// Widest FIXED precision that still fits an `Int64` column.
pub const MAX_INT64_PRECISION: u32 = 18;

const MAX_DECIMAL128_PRECISION: u8 = 38;

/// Arrow type a column is encoded with.
#[must_use]
pub fn logical_type_to_arrow(column: &ColumnDescriptor) -> DataType {
    match column.logical_type() {
        LogicalType::Fixed => {
            if column.scale() == 0 && column.precision() <= MAX_INT64_PRECISION {
                DataType::Int64
            } else {
                let precision = u8::try_from(column.precision())
                    .unwrap_or(MAX_DECIMAL128_PRECISION)
                    .clamp(1, MAX_DECIMAL128_PRECISION);
                DataType::Decimal128(precision, column.scale())
            }
        }
        LogicalType::Real => DataType::Float64,
        LogicalType::Text => DataType::Utf8,
        LogicalType::Binary => DataType::Binary,
        LogicalType::Boolean => DataType::Boolean,
        LogicalType::Date => DataType::Date32,
        LogicalType::Time => DataType::Time64(TimeUnit::Nanosecond),
        LogicalType::TimestampNtz => DataType::Timestamp(TimeUnit::Nanosecond, None),
        LogicalType::TimestampLtz | LogicalType::TimestampTz => {
            DataType::Timestamp(TimeUnit::Nanosecond, Some("UTC".into()))
        }
    }
}

#[must_use]
pub fn column_to_field(column: &ColumnDescriptor) -> Field {
    Field::new(
        column.label(),
        logical_type_to_arrow(column),
        column.is_nullable(),
    )
}

/// Arrow schema for a whole result.
#[must_use]
pub fn schema_for(metadata: &ResultSetMetadata) -> Schema {
    Schema::new(
        metadata
            .columns()
            .iter()
            .map(column_to_field)
            .collect::<Vec<_>>(),
    )
}
