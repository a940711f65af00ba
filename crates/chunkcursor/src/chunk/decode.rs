//! Chunk payload decoding.

use std::sync::Arc;

use serde_json::Value;

use super::fetch::QueryResultFormat;
use crate::error::{CursorError, Result};
use crate::metadata::{ColumnDescriptor, ResultSetMetadata};
use crate::types::temporal::parse_epoch_seconds;
use crate::types::{Cell, Date, LogicalType, Row, RowBatch, Time, Timestamp};

/// Turns one chunk payload into a row batch.
pub trait ChunkDecoder: Send + Sync {
    fn decode(&self, payload: &[u8], metadata: &ResultSetMetadata) -> Result<RowBatch>;
}

/// Pick the built-in decoder for a payload format.
///
/// Columnar payloads are decoded outside this crate; pass such a decoder to
/// the cursor directly.
pub fn decoder_for(format: QueryResultFormat) -> Result<Arc<dyn ChunkDecoder>> {
    match format {
        QueryResultFormat::Json => Ok(Arc::new(JsonRowDecoder)),
        QueryResultFormat::Arrow => Err(CursorError::invalid_argument(
            "no built-in decoder for arrow payloads; use chunkcursor-arrow",
        )),
    }
}

/// Decoder for the row-oriented text layout.
///
/// A payload is a comma-separated list of JSON arrays, one per row, without
/// the enclosing brackets. Values are strings or `null`:
///
/// - exact and approximate numerics and text stay textual
/// - binary is hex
/// - dates are days since the epoch
/// - times and timestamps are `seconds[.fraction]` since midnight or epoch,
///   optionally followed by a space and a zone suffix
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRowDecoder;

impl ChunkDecoder for JsonRowDecoder {
    fn decode(&self, payload: &[u8], metadata: &ResultSetMetadata) -> Result<RowBatch> {
        let body = std::str::from_utf8(payload)
            .map_err(|e| CursorError::decode(format!("payload is not UTF-8: {e}")))?
            .trim();
        if body.is_empty() {
            return Ok(RowBatch::default());
        }

        let raw: Vec<Vec<Value>> = serde_json::from_str(&format!("[{body}]"))?;
        let columns = metadata.columns();

        let rows = raw
            .into_iter()
            .enumerate()
            .map(|(row_index, values)| {
                if values.len() != columns.len() {
                    return Err(CursorError::decode(format!(
                        "row {row_index} has {} values, expected {}",
                        values.len(),
                        columns.len()
                    )));
                }
                values
                    .into_iter()
                    .zip(columns)
                    .map(|(value, column)| decode_value(value, column))
                    .collect::<Result<Row>>()
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(RowBatch::new(rows))
    }
}

fn decode_value(value: Value, column: &ColumnDescriptor) -> Result<Cell> {
    let text = match value {
        Value::Null => return Ok(Cell::Null),
        Value::String(s) => s,
        Value::Bool(b) if column.logical_type() == LogicalType::Boolean => {
            return Ok(Cell::Boolean(b));
        }
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => {
            return Err(CursorError::decode(format!(
                "column {}: unexpected JSON value {other}",
                column.label()
            )));
        }
    };
    decode_text(text, column)
}

fn decode_text(text: String, column: &ColumnDescriptor) -> Result<Cell> {
    let invalid = |what: &str| {
        CursorError::decode(format!(
            "column {}: invalid {what} value '{text}'",
            column.label()
        ))
    };

    match column.logical_type() {
        LogicalType::Fixed | LogicalType::Real | LogicalType::Text => Ok(Cell::Text(text)),
        LogicalType::Binary => hex::decode(&text)
            .map(Cell::Binary)
            .map_err(|_| invalid("binary")),
        LogicalType::Boolean => match text.to_ascii_lowercase().as_str() {
            "1" | "true" => Ok(Cell::Boolean(true)),
            "0" | "false" => Ok(Cell::Boolean(false)),
            _ => Err(invalid("boolean")),
        },
        LogicalType::Date => text
            .trim()
            .parse::<i32>()
            .map(|days| Cell::Date(Date::from_days(days)))
            .map_err(|_| invalid("date")),
        LogicalType::Time => {
            let nanos = parse_epoch_seconds(epoch_part(&text)).map_err(|_| invalid("time"))?;
            Time::from_nanos(nanos)
                .map(Cell::Time)
                .map_err(|_| invalid("time"))
        }
        LogicalType::TimestampNtz | LogicalType::TimestampLtz | LogicalType::TimestampTz => {
            parse_epoch_seconds(epoch_part(&text))
                .map(|nanos| Cell::Timestamp(Timestamp::from_nanos(nanos)))
                .map_err(|_| invalid("timestamp"))
        }
    }
}

fn epoch_part(text: &str) -> &str {
    text.split_whitespace().next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionPolicy;
    use crate::metadata::ColumnSchema;

    fn metadata(types: &[LogicalType]) -> ResultSetMetadata {
        let schema: Vec<_> = types
            .iter()
            .enumerate()
            .map(|(i, t)| ColumnSchema::new(format!("C{}", i + 1), *t))
            .collect();
        ResultSetMetadata::from_schema("q", &schema, &SessionPolicy::default()).unwrap()
    }

    #[test]
    fn test_decode_rows_without_outer_brackets() {
        let md = metadata(&[LogicalType::Fixed, LogicalType::Text]);
        let batch = JsonRowDecoder
            .decode(br#"["1","a"],["2",null]"#, &md)
            .unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.row(0).unwrap()[0], Cell::Text("1".into()));
        assert_eq!(batch.row(1).unwrap()[1], Cell::Null);
        assert!(batch.byte_size() > 0);
    }

    #[test]
    fn test_decode_empty_payload() {
        let md = metadata(&[LogicalType::Fixed]);
        let batch = JsonRowDecoder.decode(b"  \n", &md).unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn test_decode_typed_columns() {
        let md = metadata(&[
            LogicalType::Binary,
            LogicalType::Boolean,
            LogicalType::Date,
            LogicalType::Time,
            LogicalType::TimestampTz,
        ]);
        let payload = br#"["ABCD12","1","17148","45296.500000000","1481587200.000000000 1440"]"#;
        let batch = JsonRowDecoder.decode(payload, &md).unwrap();
        let row = batch.row(0).unwrap();

        assert_eq!(row[0], Cell::Binary(vec![0xAB, 0xCD, 0x12]));
        assert_eq!(row[1], Cell::Boolean(true));
        assert_eq!(row[2], Cell::Date(Date::from_days(17148)));
        assert_eq!(
            row[3],
            Cell::Time(Time::from_nanos(45_296_500_000_000).unwrap())
        );
        assert_eq!(
            row[4],
            Cell::Timestamp(Timestamp::from_nanos(1_481_587_200_000_000_000))
        );
    }

    #[test]
    fn test_decode_tolerates_json_scalars() {
        let md = metadata(&[LogicalType::Fixed, LogicalType::Boolean]);
        let batch = JsonRowDecoder.decode(b"[42,false]", &md).unwrap();
        let row = batch.row(0).unwrap();
        assert_eq!(row[0], Cell::Text("42".into()));
        assert_eq!(row[1], Cell::Boolean(false));
    }

    #[test]
    fn test_decode_errors() {
        let md = metadata(&[LogicalType::Fixed, LogicalType::Fixed]);
        assert!(JsonRowDecoder.decode(br#"["1"]"#, &md).unwrap_err().is_decode());
        assert!(JsonRowDecoder.decode(b"[\"1\",", &md).unwrap_err().is_decode());

        let md = metadata(&[LogicalType::Binary]);
        assert!(JsonRowDecoder.decode(br#"["XYZ"]"#, &md).unwrap_err().is_decode());

        let md = metadata(&[LogicalType::Boolean]);
        assert!(JsonRowDecoder.decode(br#"["maybe"]"#, &md).unwrap_err().is_decode());

        let md = metadata(&[LogicalType::Text]);
        assert!(JsonRowDecoder.decode(br#"[{"a":1}]"#, &md).unwrap_err().is_decode());
    }

    #[test]
    fn test_decoder_for() {
        assert!(decoder_for(QueryResultFormat::Json).is_ok());
        let err = decoder_for(QueryResultFormat::Arrow).err().unwrap();
        assert!(err.is_invalid_argument());
    }
}
