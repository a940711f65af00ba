//! Result set metadata.
//!
//! Built once per result from the schema header. Every per-column property,
//! including the presentation type, is fixed at construction and does not
//! follow later changes to the session policy.

use serde::Deserialize;

use crate::config::SessionPolicy;
use crate::error::{CursorError, Result};
use crate::types::{LogicalType, SqlType};

/// Declared length of unbounded text columns, in characters.
pub const MAX_TEXT_LENGTH: u64 = 16_777_216;

/// Declared length of unbounded binary columns, in bytes.
pub const MAX_BINARY_LENGTH: u64 = 8_388_608;

/// Default precision of exact numerics declared without one.
pub const MAX_FIXED_PRECISION: u32 = 38;

const DOUBLE_PRECISION: u32 = 15;
const DOUBLE_DISPLAY_SIZE: u64 = 24;
const BOOLEAN_DISPLAY_SIZE: u64 = 5;
const DATE_DISPLAY_SIZE: u64 = 10;
const TIME_DISPLAY_SIZE: u64 = 8;
const TIMESTAMP_DISPLAY_SIZE: u64 = 29;
const TIMESTAMP_TZ_DISPLAY_SIZE: u64 = 35;

/// Column as declared in the schema header.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub logical_type: LogicalType,
    #[serde(default)]
    pub precision: Option<u32>,
    #[serde(default)]
    pub scale: Option<i8>,
    #[serde(default)]
    pub length: Option<u64>,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

const fn default_nullable() -> bool {
    true
}

impl ColumnSchema {
    /// Nullable column of the given type with no declared sizes.
    #[must_use]
    pub fn new(name: impl Into<String>, logical_type: LogicalType) -> Self {
        Self {
            name: name.into(),
            logical_type,
            precision: None,
            scale: None,
            length: None,
            nullable: true,
        }
    }

    #[must_use]
    pub const fn with_precision(mut self, precision: u32, scale: i8) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    #[must_use]
    pub const fn with_length(mut self, length: u64) -> Self {
        self.length = Some(length);
        self
    }

    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

/// Immutable per-column description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    ordinal: usize,
    label: String,
    logical_type: LogicalType,
    sql_type: SqlType,
    precision: u32,
    scale: i8,
    length: Option<u64>,
    nullable: bool,
    display_size: u64,
}

impl ColumnDescriptor {
    fn build(ordinal: usize, schema: &ColumnSchema, policy: &SessionPolicy) -> Result<Self> {
        let scale = schema.scale.unwrap_or(0);
        if scale < 0 {
            return Err(CursorError::invalid_argument(format!(
                "column {}: negative scale {scale}",
                schema.name
            )));
        }

        let sql_type = presentation_type(schema.logical_type, scale, policy);
        let precision = declared_precision(schema);
        let display_size = display_size(schema, precision, scale);

        Ok(Self {
            ordinal,
            label: schema.name.clone(),
            logical_type: schema.logical_type,
            sql_type,
            precision,
            scale,
            length: schema.length,
            nullable: schema.nullable,
            display_size,
        })
    }

    /// 1-based position in the row.
    #[must_use]
    pub const fn ordinal(&self) -> usize {
        self.ordinal
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub const fn logical_type(&self) -> LogicalType {
        self.logical_type
    }

    #[must_use]
    pub const fn sql_type(&self) -> SqlType {
        self.sql_type
    }

    #[must_use]
    pub const fn precision(&self) -> u32 {
        self.precision
    }

    #[must_use]
    pub const fn scale(&self) -> i8 {
        self.scale
    }

    /// Declared length for text and binary columns.
    #[must_use]
    pub const fn length(&self) -> Option<u64> {
        self.length
    }

    #[must_use]
    pub const fn is_nullable(&self) -> bool {
        self.nullable
    }

    #[must_use]
    pub const fn is_fixed_width(&self) -> bool {
        self.logical_type.is_fixed_width()
    }

    #[must_use]
    pub const fn display_size(&self) -> u64 {
        self.display_size
    }

    #[must_use]
    pub const fn is_case_sensitive(&self) -> bool {
        matches!(self.logical_type, LogicalType::Text)
    }

    #[must_use]
    pub const fn is_signed(&self) -> bool {
        self.logical_type.is_numeric()
    }
}

fn presentation_type(logical: LogicalType, scale: i8, policy: &SessionPolicy) -> SqlType {
    match logical {
        LogicalType::Fixed if scale == 0 && policy.treat_decimal_as_int => SqlType::BigInt,
        LogicalType::Fixed => SqlType::Decimal,
        LogicalType::Real => SqlType::Double,
        LogicalType::Text => SqlType::Varchar,
        LogicalType::Binary => SqlType::Binary,
        LogicalType::Boolean => SqlType::Boolean,
        LogicalType::Date => SqlType::Date,
        LogicalType::Time => SqlType::Time,
        LogicalType::TimestampNtz | LogicalType::TimestampLtz => SqlType::Timestamp,
        LogicalType::TimestampTz => SqlType::TimestampWithTimezone,
    }
}

fn declared_precision(schema: &ColumnSchema) -> u32 {
    let length = |max: u64| u32::try_from(schema.length.unwrap_or(max)).unwrap_or(u32::MAX);
    match schema.logical_type {
        LogicalType::Fixed => schema.precision.unwrap_or(MAX_FIXED_PRECISION),
        LogicalType::Real => DOUBLE_PRECISION,
        LogicalType::Text => length(MAX_TEXT_LENGTH),
        LogicalType::Binary => length(MAX_BINARY_LENGTH),
        LogicalType::Boolean => 1,
        LogicalType::Date => DATE_DISPLAY_SIZE as u32,
        LogicalType::Time => TIME_DISPLAY_SIZE as u32,
        LogicalType::TimestampNtz | LogicalType::TimestampLtz => TIMESTAMP_DISPLAY_SIZE as u32,
        LogicalType::TimestampTz => TIMESTAMP_TZ_DISPLAY_SIZE as u32,
    }
}

fn display_size(schema: &ColumnSchema, precision: u32, scale: i8) -> u64 {
    match schema.logical_type {
        // sign, plus the decimal point when there is a fraction
        LogicalType::Fixed if scale == 0 => u64::from(precision) + 1,
        LogicalType::Fixed => u64::from(precision) + 2,
        LogicalType::Real => DOUBLE_DISPLAY_SIZE,
        LogicalType::Text => schema.length.unwrap_or(MAX_TEXT_LENGTH),
        LogicalType::Binary => 2 * schema.length.unwrap_or(MAX_BINARY_LENGTH),
        LogicalType::Boolean => BOOLEAN_DISPLAY_SIZE,
        LogicalType::Date => DATE_DISPLAY_SIZE,
        LogicalType::Time => TIME_DISPLAY_SIZE,
        LogicalType::TimestampNtz | LogicalType::TimestampLtz => TIMESTAMP_DISPLAY_SIZE,
        LogicalType::TimestampTz => TIMESTAMP_TZ_DISPLAY_SIZE,
    }
}

/// Column descriptors of one result, addressed by 1-based index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSetMetadata {
    query_id: String,
    columns: Vec<ColumnDescriptor>,
}

impl ResultSetMetadata {
    /// Build descriptors from the schema header under `policy`.
    pub fn from_schema(
        query_id: impl Into<String>,
        schema: &[ColumnSchema],
        policy: &SessionPolicy,
    ) -> Result<Self> {
        let columns = schema
            .iter()
            .enumerate()
            .map(|(i, column)| ColumnDescriptor::build(i + 1, column, policy))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            query_id: query_id.into(),
            columns,
        })
    }

    #[must_use]
    pub fn query_id(&self) -> &str {
        &self.query_id
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// All descriptors in ordinal order.
    #[must_use]
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// Descriptor at 1-based `index`.
    pub fn column(&self, index: usize) -> Result<&ColumnDescriptor> {
        index
            .checked_sub(1)
            .and_then(|i| self.columns.get(i))
            .ok_or_else(|| CursorError::index_out_of_bounds(index, self.columns.len()))
    }

    pub fn column_label(&self, index: usize) -> Result<&str> {
        self.column(index).map(ColumnDescriptor::label)
    }

    pub fn column_logical_type(&self, index: usize) -> Result<LogicalType> {
        self.column(index).map(ColumnDescriptor::logical_type)
    }

    pub fn column_type(&self, index: usize) -> Result<SqlType> {
        self.column(index).map(ColumnDescriptor::sql_type)
    }

    /// Numeric type code of the presentation type.
    pub fn column_type_code(&self, index: usize) -> Result<i32> {
        self.column_type(index).map(SqlType::code)
    }

    /// Server-side type name.
    pub fn column_type_name(&self, index: usize) -> Result<&'static str> {
        self.column_logical_type(index).map(LogicalType::name)
    }

    /// Name of the type `get_object` returns for this column.
    pub fn column_class_name(&self, index: usize) -> Result<&'static str> {
        self.column_type(index).map(SqlType::value_type_name)
    }

    pub fn precision(&self, index: usize) -> Result<u32> {
        self.column(index).map(ColumnDescriptor::precision)
    }

    pub fn scale(&self, index: usize) -> Result<i8> {
        self.column(index).map(ColumnDescriptor::scale)
    }

    pub fn is_nullable(&self, index: usize) -> Result<bool> {
        self.column(index).map(ColumnDescriptor::is_nullable)
    }

    pub fn display_size(&self, index: usize) -> Result<u64> {
        self.column(index).map(ColumnDescriptor::display_size)
    }

    pub fn is_case_sensitive(&self, index: usize) -> Result<bool> {
        self.column(index).map(ColumnDescriptor::is_case_sensitive)
    }

    pub fn is_signed(&self, index: usize) -> Result<bool> {
        self.column(index).map(ColumnDescriptor::is_signed)
    }

    pub fn is_fixed_width(&self, index: usize) -> Result<bool> {
        self.column(index).map(ColumnDescriptor::is_fixed_width)
    }

    pub fn is_read_only(&self, index: usize) -> Result<bool> {
        self.column(index).map(|_| true)
    }

    pub fn is_auto_increment(&self, index: usize) -> Result<bool> {
        self.column(index).map(|_| false)
    }

    pub fn is_currency(&self, index: usize) -> Result<bool> {
        self.column(index).map(|_| false)
    }

    pub fn is_searchable(&self, index: usize) -> Result<bool> {
        self.column(index).map(|_| true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> Vec<ColumnSchema> {
        vec![
            ColumnSchema::new("C1", LogicalType::Fixed).with_precision(20, 5),
            ColumnSchema::new("C2", LogicalType::Fixed).with_precision(38, 0),
            ColumnSchema::new("C3", LogicalType::Fixed).with_precision(25, 15),
            ColumnSchema::new("C4", LogicalType::Text),
            ColumnSchema::new("C5", LogicalType::Text).with_length(30),
            ColumnSchema::new("C6", LogicalType::Text).with_length(1),
            ColumnSchema::new("C7", LogicalType::Date),
            ColumnSchema::new("C8", LogicalType::Time),
            ColumnSchema::new("C9", LogicalType::Real).not_null(),
        ]
    }

    fn metadata(policy: &SessionPolicy) -> ResultSetMetadata {
        ResultSetMetadata::from_schema("q1", &sample_schema(), policy).unwrap()
    }

    #[test]
    fn test_display_sizes() {
        let md = metadata(&SessionPolicy::default());
        let sizes: Vec<u64> = (1..=md.column_count())
            .map(|i| md.display_size(i).unwrap())
            .collect();
        assert_eq!(sizes, vec![22, 39, 27, 16_777_216, 30, 1, 10, 8, 24]);
    }

    #[test]
    fn test_presentation_type_follows_policy() {
        let md = metadata(&SessionPolicy::default());
        assert_eq!(md.column_type(1).unwrap(), SqlType::Decimal);
        assert_eq!(md.column_type(2).unwrap(), SqlType::BigInt);
        assert_eq!(md.column_type_code(2).unwrap(), -5);

        let md = metadata(&SessionPolicy::default().treat_decimal_as_int(false));
        assert_eq!(md.column_type(2).unwrap(), SqlType::Decimal);
        assert_eq!(md.column_type_code(2).unwrap(), 3);
    }

    #[test]
    fn test_flags() {
        let md = metadata(&SessionPolicy::default());
        assert!(!md.is_case_sensitive(1).unwrap());
        assert!(md.is_case_sensitive(4).unwrap());
        assert!(md.is_signed(1).unwrap());
        assert!(md.is_signed(9).unwrap());
        assert!(!md.is_signed(4).unwrap());
        assert!(md.is_read_only(1).unwrap());
        assert!(!md.is_auto_increment(1).unwrap());
        assert!(!md.is_currency(1).unwrap());
        assert!(md.is_searchable(1).unwrap());
        assert!(md.is_nullable(1).unwrap());
        assert!(!md.is_nullable(9).unwrap());
        assert!(md.is_fixed_width(1).unwrap());
        assert!(!md.is_fixed_width(4).unwrap());
    }

    #[test]
    fn test_precision_and_names() {
        let md = metadata(&SessionPolicy::default());
        assert_eq!(md.precision(1).unwrap(), 20);
        assert_eq!(md.scale(1).unwrap(), 5);
        assert_eq!(md.precision(5).unwrap(), 30);
        assert_eq!(md.precision(9).unwrap(), 15);
        assert_eq!(md.column_type_name(1).unwrap(), "NUMBER");
        assert_eq!(md.column_class_name(9).unwrap(), "f64");
        assert_eq!(md.column_label(3).unwrap(), "C3");
        assert_eq!(md.query_id(), "q1");
    }

    #[test]
    fn test_index_out_of_bounds() {
        let md = metadata(&SessionPolicy::default());
        for index in [0, 10] {
            let err = md.column_label(index).unwrap_err();
            assert!(err.is_index_out_of_bounds());
            assert_eq!(err.vendor_code(), Some(200_032));
        }
    }

    #[test]
    fn test_negative_scale_rejected() {
        let schema = vec![ColumnSchema::new("C", LogicalType::Fixed).with_precision(10, -1)];
        let err = ResultSetMetadata::from_schema("q", &schema, &SessionPolicy::default());
        assert!(err.unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_timestamp_display_sizes() {
        let schema = vec![
            ColumnSchema::new("A", LogicalType::TimestampNtz),
            ColumnSchema::new("B", LogicalType::TimestampTz),
            ColumnSchema::new("C", LogicalType::Binary).with_length(16),
        ];
        let md = ResultSetMetadata::from_schema("q", &schema, &SessionPolicy::default()).unwrap();
        assert_eq!(md.display_size(1).unwrap(), 29);
        assert_eq!(md.display_size(2).unwrap(), 35);
        assert_eq!(md.display_size(3).unwrap(), 32);
        assert_eq!(md.column_type(2).unwrap(), SqlType::TimestampWithTimezone);
    }
}
