//! Arrow IPC stream encoder for decoded rows.
//!
//! Produces payloads in the layout [`crate::ArrowChunkDecoder`] reads, with
//! column types from [`crate::mapping`]. Used to build fixtures and to
//! re-export cursor rows as Arrow.

use std::sync::Arc;

use arrow::ipc::writer::StreamWriter;
use arrow_array::{
    ArrayRef, BinaryArray, BooleanArray, Date32Array, Decimal128Array, Float64Array, Int64Array,
    RecordBatch, StringArray, Time64NanosecondArray, TimestampNanosecondArray,
};
use arrow_schema::{DataType, TimeUnit};
use chunkcursor::types::Row;
use chunkcursor::{Cell, ColumnDescriptor, ResultSetMetadata};

use crate::error::{ArrowDecodeError, Result};
use crate::mapping::{logical_type_to_arrow, schema_for};

/// Encode `rows` as one IPC stream with a single record batch.
pub fn encode_stream(metadata: &ResultSetMetadata, rows: &[Row]) -> Result<Vec<u8>> {
    let width = metadata.column_count();
    if let Some(row) = rows.iter().find(|row| row.len() != width) {
        return Err(ArrowDecodeError::schema_mismatch(width, row.len()));
    }

    let arrays = metadata
        .columns()
        .iter()
        .enumerate()
        .map(|(j, column)| {
            let cells: Vec<&Cell> = rows.iter().map(|row| &row[j]).collect();
            column_array(&cells, column)
        })
        .collect::<Result<Vec<_>>>()?;

    let schema = Arc::new(schema_for(metadata));
    let batch = RecordBatch::try_new(Arc::clone(&schema), arrays)?;

    let mut writer = StreamWriter::try_new(Vec::new(), &schema)?;
    writer.write(&batch)?;
    writer.finish()?;
    Ok(writer.into_inner()?)
}

fn values<'a, T>(
    cells: &[&'a Cell],
    column: &ColumnDescriptor,
    extract: impl Fn(&'a Cell) -> Option<T>,
) -> Result<Vec<Option<T>>> {
    cells
        .iter()
        .map(|&cell| match cell {
            Cell::Null => Ok(None),
            other => extract(other).map(Some).ok_or_else(|| {
                ArrowDecodeError::value_conversion(
                    column.label(),
                    format!("cannot encode {other:?} as {}", column.logical_type().name()),
                )
            }),
        })
        .collect()
}

fn rescale(unscaled: i128, from: i8, to: i8) -> Option<i128> {
    let shift = u32::try_from(i32::from(to) - i32::from(from)).ok()?;
    unscaled.checked_mul(10_i128.checked_pow(shift)?)
}

fn column_array(cells: &[&Cell], column: &ColumnDescriptor) -> Result<ArrayRef> {
    let array: ArrayRef = match logical_type_to_arrow(column) {
        DataType::Int64 => Arc::new(Int64Array::from(values(cells, column, |c| match c {
            Cell::Int(v) => Some(*v),
            Cell::Decimal { unscaled, scale: 0 } => i64::try_from(*unscaled).ok(),
            _ => None,
        })?)),
        DataType::Decimal128(precision, scale) => {
            let unscaled = values(cells, column, |c| match c {
                Cell::Int(v) => rescale(i128::from(*v), 0, scale),
                Cell::Decimal {
                    unscaled,
                    scale: from,
                } => rescale(*unscaled, *from, scale),
                _ => None,
            })?;
            Arc::new(Decimal128Array::from(unscaled).with_precision_and_scale(precision, scale)?)
        }
        DataType::Float64 => Arc::new(Float64Array::from(values(cells, column, |c| match c {
            Cell::Double(v) => Some(*v),
            _ => None,
        })?)),
        DataType::Utf8 => Arc::new(StringArray::from(values(cells, column, |c| match c {
            Cell::Text(s) => Some(s.as_str()),
            _ => None,
        })?)),
        DataType::Binary => Arc::new(BinaryArray::from(values(cells, column, |c| match c {
            Cell::Binary(b) => Some(b.as_slice()),
            _ => None,
        })?)),
        DataType::Boolean => Arc::new(BooleanArray::from(values(cells, column, |c| match c {
            Cell::Boolean(b) => Some(*b),
            _ => None,
        })?)),
        DataType::Date32 => Arc::new(Date32Array::from(values(cells, column, |c| match c {
            Cell::Date(d) => Some(d.days_since_epoch()),
            _ => None,
        })?)),
        DataType::Time64(TimeUnit::Nanosecond) => {
            Arc::new(Time64NanosecondArray::from(values(cells, column, |c| {
                match c {
                    Cell::Time(t) => Some(t.nanos_since_midnight()),
                    _ => None,
                }
            })?))
        }
        DataType::Timestamp(TimeUnit::Nanosecond, tz) => {
            let nanos = values(cells, column, |c| match c {
                Cell::Timestamp(ts) => Some(ts.nanos_since_epoch()),
                _ => None,
            })?;
            Arc::new(TimestampNanosecondArray::from(nanos).with_timezone_opt(tz))
        }
        other => return Err(ArrowDecodeError::unsupported_type(column.label(), other)),
    };
    Ok(array)
}
