//! Arrow IPC stream decoder.
//!
//! Each chunk payload is one IPC stream holding any number of record batches
//! whose columns line up with the result's columns. Integer columns of a
//! scaled FIXED type carry the unscaled value and become [`Cell::Decimal`].

use std::io::Cursor;

use arrow::ipc::reader::StreamReader;
use arrow_array::cast::AsArray;
use arrow_array::types::{
    Date32Type, Date64Type, Decimal128Type, Float32Type, Float64Type, Int8Type, Int16Type, Int32Type,
    Int64Type, Time32MillisecondType, Time32SecondType, Time64MicrosecondType,
    Time64NanosecondType, TimestampMicrosecondType, TimestampMillisecondType,
    TimestampNanosecondType, TimestampSecondType, UInt8Type, UInt16Type, UInt32Type, UInt64Type,
};
use arrow_array::{Array, ArrowPrimitiveType, RecordBatch};
use arrow_schema::{DataType, TimeUnit};
use chunkcursor::types::Row;
use chunkcursor::{
    Cell, ChunkDecoder, ColumnDescriptor, Date, LogicalType, ResultSetMetadata, RowBatch, Time,
    Timestamp,
};

use crate::error::{ArrowDecodeError, Result};

const MILLIS_PER_DAY: i64 = 86_400_000;

/// [`ChunkDecoder`] for the columnar binary layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArrowChunkDecoder;

impl ChunkDecoder for ArrowChunkDecoder {
    fn decode(
        &self,
        payload: &[u8],
        metadata: &ResultSetMetadata,
    ) -> chunkcursor::Result<RowBatch> {
        Ok(decode_stream(payload, metadata)?)
    }
}

/// Decode one IPC stream into rows. An empty payload is an empty chunk.
pub fn decode_stream(payload: &[u8], metadata: &ResultSetMetadata) -> Result<RowBatch> {
    if payload.is_empty() {
        return Ok(RowBatch::default());
    }

    let reader = StreamReader::try_new(Cursor::new(payload), None)?;
    let mut rows = Vec::new();
    for batch in reader {
        append_batch(&batch?, metadata, &mut rows)?;
    }

    tracing::trace!(
        query_id = metadata.query_id(),
        rows = rows.len(),
        "decoded arrow chunk"
    );
    Ok(RowBatch::new(rows))
}

fn append_batch(
    batch: &RecordBatch,
    metadata: &ResultSetMetadata,
    rows: &mut Vec<Row>,
) -> Result<()> {
    if batch.num_columns() != metadata.column_count() {
        return Err(ArrowDecodeError::schema_mismatch(
            metadata.column_count(),
            batch.num_columns(),
        ));
    }

    let columns = batch
        .columns()
        .iter()
        .zip(metadata.columns())
        .map(|(array, column)| column_cells(array.as_ref(), column))
        .collect::<Result<Vec<_>>>()?;

    let mut columns: Vec<_> = columns.into_iter().map(Vec::into_iter).collect();
    rows.reserve(batch.num_rows());
    for _ in 0..batch.num_rows() {
        rows.push(
            columns
                .iter_mut()
                .map(|cells| cells.next().unwrap_or(Cell::Null))
                .collect(),
        );
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════
// Column conversion
// ═══════════════════════════════════════════════════════════════════════════

fn cells<F>(array: &dyn Array, convert: F) -> Result<Vec<Cell>>
where
    F: Fn(usize) -> Result<Cell>,
{
    (0..array.len())
        .map(|i| if array.is_null(i) { Ok(Cell::Null) } else { convert(i) })
        .collect()
}

/// Integer column, rescaled when the column is a scaled FIXED.
fn integer_cells<T>(array: &dyn Array, column: &ColumnDescriptor) -> Result<Vec<Cell>>
where
    T: ArrowPrimitiveType,
    T::Native: Into<i128>,
{
    let values = array.as_primitive::<T>();
    let scale = column.scale();
    let scaled = column.logical_type() == LogicalType::Fixed && scale > 0;
    cells(array, |i| {
        let value: i128 = values.value(i).into();
        if scaled {
            return Ok(Cell::Decimal {
                unscaled: value,
                scale,
            });
        }
        i64::try_from(value).map(Cell::Int).map_err(|_| {
            ArrowDecodeError::value_conversion(column.label(), format!("{value} overflows i64"))
        })
    })
}

fn time_cells<T>(
    array: &dyn Array,
    column: &ColumnDescriptor,
    nanos_per_unit: i64,
) -> Result<Vec<Cell>>
where
    T: ArrowPrimitiveType,
    T::Native: Into<i64>,
{
    let values = array.as_primitive::<T>();
    cells(array, |i| {
        let value: i64 = values.value(i).into();
        Time::from_nanos(value.saturating_mul(nanos_per_unit))
            .map(Cell::Time)
            .map_err(|e| ArrowDecodeError::value_conversion(column.label(), e.to_string()))
    })
}

fn timestamp_cells<T>(
    array: &dyn Array,
    column: &ColumnDescriptor,
    nanos_per_unit: i64,
) -> Result<Vec<Cell>>
where
    T: ArrowPrimitiveType<Native = i64>,
{
    let values = array.as_primitive::<T>();
    cells(array, |i| {
        values
            .value(i)
            .checked_mul(nanos_per_unit)
            .map(|nanos| Cell::Timestamp(Timestamp::from_nanos(nanos)))
            .ok_or_else(|| {
                ArrowDecodeError::value_conversion(column.label(), "timestamp out of range")
            })
    })
}

const fn nanos_per(unit: &TimeUnit) -> i64 {
    match unit {
        TimeUnit::Second => 1_000_000_000,
        TimeUnit::Millisecond => 1_000_000,
        TimeUnit::Microsecond => 1_000,
        TimeUnit::Nanosecond => 1,
    }
}

/// Convert one Arrow column into cells for `column`.
pub fn column_cells(array: &dyn Array, column: &ColumnDescriptor) -> Result<Vec<Cell>> {
    match array.data_type() {
        DataType::Int8 => integer_cells::<Int8Type>(array, column),
        DataType::Int16 => integer_cells::<Int16Type>(array, column),
        DataType::Int32 => integer_cells::<Int32Type>(array, column),
        DataType::Int64 => integer_cells::<Int64Type>(array, column),
        DataType::UInt8 => integer_cells::<UInt8Type>(array, column),
        DataType::UInt16 => integer_cells::<UInt16Type>(array, column),
        DataType::UInt32 => integer_cells::<UInt32Type>(array, column),
        DataType::UInt64 => integer_cells::<UInt64Type>(array, column),

        DataType::Decimal128(_, scale) => {
            let values = array.as_primitive::<Decimal128Type>();
            let scale = *scale;
            cells(array, |i| {
                Ok(Cell::Decimal {
                    unscaled: values.value(i),
                    scale,
                })
            })
        }

        DataType::Float32 => {
            let values = array.as_primitive::<Float32Type>();
            cells(array, |i| Ok(Cell::Double(f64::from(values.value(i)))))
        }
        DataType::Float64 => {
            let values = array.as_primitive::<Float64Type>();
            cells(array, |i| Ok(Cell::Double(values.value(i))))
        }

        DataType::Utf8 => {
            let values = array.as_string::<i32>();
            cells(array, |i| Ok(Cell::Text(values.value(i).to_owned())))
        }
        DataType::LargeUtf8 => {
            let values = array.as_string::<i64>();
            cells(array, |i| Ok(Cell::Text(values.value(i).to_owned())))
        }

        DataType::Binary => {
            let values = array.as_binary::<i32>();
            cells(array, |i| Ok(Cell::Binary(values.value(i).to_vec())))
        }
        DataType::LargeBinary => {
            let values = array.as_binary::<i64>();
            cells(array, |i| Ok(Cell::Binary(values.value(i).to_vec())))
        }
        DataType::FixedSizeBinary(_) => {
            let values = array.as_fixed_size_binary();
            cells(array, |i| Ok(Cell::Binary(values.value(i).to_vec())))
        }

        DataType::Boolean => {
            let values = array.as_boolean();
            cells(array, |i| Ok(Cell::Boolean(values.value(i))))
        }

        DataType::Date32 => {
            let values = array.as_primitive::<Date32Type>();
            cells(array, |i| Ok(Cell::Date(Date::from_days(values.value(i)))))
        }
        DataType::Date64 => {
            let values = array.as_primitive::<Date64Type>();
            cells(array, |i| {
                let days = values.value(i).div_euclid(MILLIS_PER_DAY);
                i32::try_from(days)
                    .map(|days| Cell::Date(Date::from_days(days)))
                    .map_err(|_| {
                        ArrowDecodeError::value_conversion(column.label(), "date out of range")
                    })
            })
        }

        DataType::Time32(unit @ TimeUnit::Second) => {
            time_cells::<Time32SecondType>(array, column, nanos_per(unit))
        }
        DataType::Time32(unit @ TimeUnit::Millisecond) => {
            time_cells::<Time32MillisecondType>(array, column, nanos_per(unit))
        }
        DataType::Time64(unit @ TimeUnit::Microsecond) => {
            time_cells::<Time64MicrosecondType>(array, column, nanos_per(unit))
        }
        DataType::Time64(unit @ TimeUnit::Nanosecond) => {
            time_cells::<Time64NanosecondType>(array, column, nanos_per(unit))
        }

        DataType::Timestamp(unit, _) => {
            let factor = nanos_per(unit);
            match unit {
                TimeUnit::Second => timestamp_cells::<TimestampSecondType>(array, column, factor),
                TimeUnit::Millisecond => {
                    timestamp_cells::<TimestampMillisecondType>(array, column, factor)
                }
                TimeUnit::Microsecond => {
                    timestamp_cells::<TimestampMicrosecondType>(array, column, factor)
                }
                TimeUnit::Nanosecond => {
                    timestamp_cells::<TimestampNanosecondType>(array, column, factor)
                }
            }
        }

        DataType::Null => Ok(vec![Cell::Null; array.len()]),

        other => Err(ArrowDecodeError::unsupported_type(column.label(), other)),
    }
}
