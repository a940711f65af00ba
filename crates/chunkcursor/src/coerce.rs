//! Conversion of raw cells into accessor target types.
//!
//! The set of targets is closed: [`FromCell`] is sealed, and each
//! implementation decides what a null cell becomes. Numeric targets get a
//! zero value, every other target is an `Option`.

use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::{FromPrimitive, ToPrimitive, Zero};

use crate::config::{BinaryOutputFormat, SessionPolicy};
use crate::error::{CursorError, Result};
use crate::metadata::ColumnDescriptor;
use crate::types::{Cell, Date, SqlType, SqlValue, Time, Timestamp};

const NANOS_PER_DAY: i64 = 86_400 * 1_000_000_000;
const MAX_I64_DIGITS: i128 = 19;

pub(crate) mod private {
    /// Marker trait that seals [`super::FromCell`].
    pub trait Sealed {}
}

/// Accessor target types.
///
/// # Sealed
///
/// This trait cannot be implemented outside this crate.
pub trait FromCell: private::Sealed + Sized {
    /// Value returned for a null cell.
    fn null_value() -> Self;

    /// Convert a non-null cell.
    fn from_cell(cell: &Cell, column: &ColumnDescriptor, policy: &SessionPolicy) -> Result<Self>;
}

/// Applies the session policy to cell conversions.
#[derive(Debug, Clone, Default)]
pub struct ColumnTypeCoercer {
    policy: SessionPolicy,
}

impl ColumnTypeCoercer {
    #[must_use]
    pub const fn new(policy: SessionPolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub const fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    /// Convert `cell` to `T`, returning the value and whether the cell was null.
    pub fn coerce<T: FromCell>(&self, cell: &Cell, column: &ColumnDescriptor) -> Result<(T, bool)> {
        if cell.is_null() {
            return Ok((T::null_value(), true));
        }
        T::from_cell(cell, column, &self.policy).map(|value| (value, false))
    }
}

fn unsupported(cell: &Cell, column: &ColumnDescriptor, target: &str) -> CursorError {
    CursorError::decode(format!(
        "column {}: cannot convert {} value {} to {target}",
        column.label(),
        column.logical_type(),
        describe(cell)
    ))
}

fn out_of_range(cell: &Cell, column: &ColumnDescriptor, target: &str) -> CursorError {
    CursorError::decode(format!(
        "column {}: value {} out of range for {target}",
        column.label(),
        describe(cell)
    ))
}

fn describe(cell: &Cell) -> String {
    match cell {
        Cell::Null => "NULL".to_owned(),
        Cell::Text(s) => format!("'{s}'"),
        Cell::Int(v) => v.to_string(),
        Cell::Decimal { unscaled, scale } => format_scaled(*unscaled, *scale),
        Cell::Double(v) => format_double(*v),
        Cell::Boolean(b) => format_bool(*b).to_owned(),
        Cell::Binary(b) => format!("0x{}", hex::encode_upper(b)),
        Cell::Date(d) => d.to_string(),
        Cell::Time(t) => t.to_string(),
        Cell::Timestamp(ts) => ts.to_string(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Rendering
// ═══════════════════════════════════════════════════════════════════════════

/// Render `unscaled * 10^-scale` in plain notation, keeping every scale digit.
fn format_scaled(unscaled: i128, scale: i8) -> String {
    let digits = unscaled.unsigned_abs().to_string();
    let sign = if unscaled < 0 { "-" } else { "" };

    if scale <= 0 {
        let zeros = if unscaled == 0 { 0 } else { usize::from(scale.unsigned_abs()) };
        return format!("{sign}{digits}{}", "0".repeat(zeros));
    }

    let scale = usize::from(scale.unsigned_abs());
    let padded = format!("{digits:0>width$}", width = scale + 1);
    let (whole, fraction) = padded.split_at(padded.len() - scale);
    format!("{sign}{whole}.{fraction}")
}

fn format_double(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_owned()
    } else if value.is_infinite() {
        if value > 0.0 { "Infinity" } else { "-Infinity" }.to_owned()
    } else {
        value.to_string()
    }
}

const fn format_bool(value: bool) -> &'static str {
    if value { "TRUE" } else { "FALSE" }
}

fn format_binary(bytes: &[u8], format: BinaryOutputFormat) -> String {
    match format {
        BinaryOutputFormat::Hex => hex::encode_upper(bytes),
        BinaryOutputFormat::Base64 => BASE64.encode(bytes),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Parsing
// ═══════════════════════════════════════════════════════════════════════════

/// Special float spellings accepted in textual cells, case-insensitive.
fn parse_float_token(s: &str) -> Option<f64> {
    match s.to_ascii_lowercase().as_str() {
        "inf" | "+inf" | "infinity" | "+infinity" => Some(f64::INFINITY),
        "-inf" | "-infinity" => Some(f64::NEG_INFINITY),
        "nan" => Some(f64::NAN),
        _ => None,
    }
}

fn parse_f64(s: &str) -> Option<f64> {
    let s = s.trim();
    parse_float_token(s).or_else(|| s.parse().ok())
}

fn parse_f32(s: &str) -> Option<f32> {
    let s = s.trim();
    parse_float_token(s)
        .map(|v| v as f32)
        .or_else(|| s.parse().ok())
}

fn scaled_to_decimal(unscaled: i128, scale: i8) -> BigDecimal {
    BigDecimal::new(BigInt::from(unscaled), i64::from(scale))
}

// ═══════════════════════════════════════════════════════════════════════════
// Intermediate conversions
// ═══════════════════════════════════════════════════════════════════════════

fn to_decimal(cell: &Cell, column: &ColumnDescriptor) -> Result<BigDecimal> {
    match cell {
        Cell::Int(v) => Ok(BigDecimal::from(*v)),
        Cell::Decimal { unscaled, scale } => Ok(scaled_to_decimal(*unscaled, *scale)),
        Cell::Double(v) => {
            BigDecimal::from_f64(*v).ok_or_else(|| out_of_range(cell, column, "decimal"))
        }
        Cell::Text(s) => {
            BigDecimal::from_str(s.trim()).map_err(|_| unsupported(cell, column, "decimal"))
        }
        Cell::Boolean(b) => Ok(BigDecimal::from(i64::from(*b))),
        _ => Err(unsupported(cell, column, "decimal")),
    }
}

/// Integer view of a cell, truncating fractions toward zero.
fn to_i64(cell: &Cell, column: &ColumnDescriptor) -> Result<i64> {
    match cell {
        Cell::Int(v) => Ok(*v),
        Cell::Decimal { unscaled, scale } => {
            let truncated = if *scale > 0 {
                10_i128
                    .checked_pow(u32::from(scale.unsigned_abs()))
                    .map_or(Some(0), |divisor| Some(unscaled / divisor))
            } else {
                10_i128
                    .checked_pow(u32::from(scale.unsigned_abs()))
                    .and_then(|factor| unscaled.checked_mul(factor))
            };
            truncated
                .and_then(|v| i64::try_from(v).ok())
                .ok_or_else(|| out_of_range(cell, column, "i64"))
        }
        Cell::Double(v) => {
            let truncated = v.trunc();
            if truncated.is_finite() && truncated >= i64::MIN as f64 && truncated < i64::MAX as f64
            {
                Ok(truncated as i64)
            } else {
                Err(out_of_range(cell, column, "i64"))
            }
        }
        Cell::Text(s) => {
            let s = s.trim();
            if let Ok(v) = s.parse::<i64>() {
                return Ok(v);
            }
            let decimal =
                BigDecimal::from_str(s).map_err(|_| unsupported(cell, column, "integer"))?;
            if decimal.is_zero() {
                return Ok(0);
            }
            // Rescaling materializes 10^|exponent|; bound the integer part first.
            let (_, exponent) = decimal.as_bigint_and_exponent();
            let integer_digits = i128::from(decimal.digits()) - i128::from(exponent);
            if integer_digits > MAX_I64_DIGITS {
                return Err(out_of_range(cell, column, "i64"));
            }
            if integer_digits <= 0 {
                return Ok(0);
            }
            decimal
                .with_scale(0)
                .to_i64()
                .ok_or_else(|| out_of_range(cell, column, "i64"))
        }
        Cell::Boolean(b) => Ok(i64::from(*b)),
        _ => Err(unsupported(cell, column, "integer")),
    }
}

fn narrow<T: TryFrom<i64>>(cell: &Cell, column: &ColumnDescriptor, target: &str) -> Result<T> {
    let wide = to_i64(cell, column)?;
    T::try_from(wide).map_err(|_| out_of_range(cell, column, target))
}

fn to_f64(cell: &Cell, column: &ColumnDescriptor) -> Result<f64> {
    match cell {
        Cell::Double(v) => Ok(*v),
        Cell::Int(v) => Ok(*v as f64),
        Cell::Decimal { unscaled, scale } => scaled_to_decimal(*unscaled, *scale)
            .to_f64()
            .ok_or_else(|| out_of_range(cell, column, "f64")),
        Cell::Text(s) => parse_f64(s).ok_or_else(|| unsupported(cell, column, "f64")),
        Cell::Boolean(b) => Ok(f64::from(u8::from(*b))),
        _ => Err(unsupported(cell, column, "f64")),
    }
}

fn to_bool(cell: &Cell, column: &ColumnDescriptor) -> Result<bool> {
    match cell {
        Cell::Boolean(b) => Ok(*b),
        Cell::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(unsupported(cell, column, "bool")),
        },
        Cell::Int(_) | Cell::Decimal { .. } | Cell::Double(_) => match to_f64(cell, column)? {
            v if v == 0.0 => Ok(false),
            v if (v - 1.0).abs() < f64::EPSILON => Ok(true),
            _ => Err(out_of_range(cell, column, "bool")),
        },
        _ => Err(unsupported(cell, column, "bool")),
    }
}

fn to_string(cell: &Cell, policy: &SessionPolicy) -> String {
    match cell {
        Cell::Null => String::new(),
        Cell::Text(s) => s.clone(),
        Cell::Int(v) => v.to_string(),
        Cell::Decimal { unscaled, scale } => format_scaled(*unscaled, *scale),
        Cell::Double(v) => format_double(*v),
        Cell::Boolean(b) => format_bool(*b).to_owned(),
        Cell::Binary(b) => format_binary(b, policy.binary_output_format),
        Cell::Date(d) => d.to_string(),
        Cell::Time(t) => t.to_string(),
        Cell::Timestamp(ts) => ts.to_string(),
    }
}

fn to_bytes(cell: &Cell, column: &ColumnDescriptor) -> Result<Vec<u8>> {
    match cell {
        Cell::Binary(b) => Ok(b.clone()),
        Cell::Text(s) => Ok(s.as_bytes().to_vec()),
        _ => Err(unsupported(cell, column, "bytes")),
    }
}

fn to_date(cell: &Cell, column: &ColumnDescriptor) -> Result<Date> {
    match cell {
        Cell::Date(d) => Ok(*d),
        Cell::Timestamp(ts) => Ok(ts.date()),
        Cell::Text(s) => Date::parse_iso(s).map_err(|_| unsupported(cell, column, "date")),
        _ => Err(unsupported(cell, column, "date")),
    }
}

fn to_time(cell: &Cell, column: &ColumnDescriptor) -> Result<Time> {
    match cell {
        Cell::Time(t) => Ok(*t),
        Cell::Timestamp(ts) => Ok(ts.time()),
        Cell::Text(s) => Time::parse_iso(s).map_err(|_| unsupported(cell, column, "time")),
        _ => Err(unsupported(cell, column, "time")),
    }
}

fn to_timestamp(cell: &Cell, column: &ColumnDescriptor) -> Result<Timestamp> {
    match cell {
        Cell::Timestamp(ts) => Ok(*ts),
        Cell::Date(d) => i64::from(d.days_since_epoch())
            .checked_mul(NANOS_PER_DAY)
            .map(Timestamp::from_nanos)
            .ok_or_else(|| out_of_range(cell, column, "timestamp")),
        Cell::Text(s) => {
            Timestamp::parse_iso(s).map_err(|_| unsupported(cell, column, "timestamp"))
        }
        _ => Err(unsupported(cell, column, "timestamp")),
    }
}

fn to_value(cell: &Cell, column: &ColumnDescriptor, policy: &SessionPolicy) -> Result<SqlValue> {
    Ok(match column.sql_type() {
        SqlType::BigInt => SqlValue::BigInt(to_i64(cell, column)?),
        SqlType::Decimal => SqlValue::Decimal(to_decimal(cell, column)?),
        SqlType::Double => SqlValue::Double(to_f64(cell, column)?),
        SqlType::Varchar => SqlValue::Text(to_string(cell, policy)),
        SqlType::Binary => SqlValue::Bytes(to_bytes(cell, column)?),
        SqlType::Boolean => SqlValue::Boolean(to_bool(cell, column)?),
        SqlType::Date => SqlValue::Date(to_date(cell, column)?),
        SqlType::Time => SqlValue::Time(to_time(cell, column)?),
        SqlType::Timestamp | SqlType::TimestampWithTimezone => {
            SqlValue::Timestamp(to_timestamp(cell, column)?)
        }
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// Sealed Implementations
// ═══════════════════════════════════════════════════════════════════════════

macro_rules! impl_narrow_integer {
    ($($ty:ty),*) => {
        $(
            impl private::Sealed for $ty {}
            impl FromCell for $ty {
                fn null_value() -> Self {
                    0
                }

                fn from_cell(cell: &Cell, column: &ColumnDescriptor, _: &SessionPolicy) -> Result<Self> {
                    narrow(cell, column, stringify!($ty))
                }
            }
        )*
    };
}

impl_narrow_integer!(i8, i16, i32);

impl private::Sealed for i64 {}
impl FromCell for i64 {
    fn null_value() -> Self {
        0
    }

    fn from_cell(cell: &Cell, column: &ColumnDescriptor, _: &SessionPolicy) -> Result<Self> {
        to_i64(cell, column)
    }
}

impl private::Sealed for f64 {}
impl FromCell for f64 {
    fn null_value() -> Self {
        0.0
    }

    fn from_cell(cell: &Cell, column: &ColumnDescriptor, _: &SessionPolicy) -> Result<Self> {
        to_f64(cell, column)
    }
}

impl private::Sealed for f32 {}
impl FromCell for f32 {
    fn null_value() -> Self {
        0.0
    }

    fn from_cell(cell: &Cell, column: &ColumnDescriptor, _: &SessionPolicy) -> Result<Self> {
        match cell {
            Cell::Text(s) => parse_f32(s).ok_or_else(|| unsupported(cell, column, "f32")),
            _ => to_f64(cell, column).map(|v| v as Self),
        }
    }
}

impl private::Sealed for bool {}
impl FromCell for bool {
    fn null_value() -> Self {
        false
    }

    fn from_cell(cell: &Cell, column: &ColumnDescriptor, _: &SessionPolicy) -> Result<Self> {
        to_bool(cell, column)
    }
}

impl private::Sealed for Option<String> {}
impl FromCell for Option<String> {
    fn null_value() -> Self {
        None
    }

    fn from_cell(cell: &Cell, _: &ColumnDescriptor, policy: &SessionPolicy) -> Result<Self> {
        Ok(Some(to_string(cell, policy)))
    }
}

impl private::Sealed for Option<BigDecimal> {}
impl FromCell for Option<BigDecimal> {
    fn null_value() -> Self {
        None
    }

    fn from_cell(cell: &Cell, column: &ColumnDescriptor, _: &SessionPolicy) -> Result<Self> {
        to_decimal(cell, column).map(Some)
    }
}

impl private::Sealed for Option<Vec<u8>> {}
impl FromCell for Option<Vec<u8>> {
    fn null_value() -> Self {
        None
    }

    fn from_cell(cell: &Cell, column: &ColumnDescriptor, _: &SessionPolicy) -> Result<Self> {
        to_bytes(cell, column).map(Some)
    }
}

impl private::Sealed for Option<Date> {}
impl FromCell for Option<Date> {
    fn null_value() -> Self {
        None
    }

    fn from_cell(cell: &Cell, column: &ColumnDescriptor, _: &SessionPolicy) -> Result<Self> {
        to_date(cell, column).map(Some)
    }
}

impl private::Sealed for Option<Time> {}
impl FromCell for Option<Time> {
    fn null_value() -> Self {
        None
    }

    fn from_cell(cell: &Cell, column: &ColumnDescriptor, _: &SessionPolicy) -> Result<Self> {
        to_time(cell, column).map(Some)
    }
}

impl private::Sealed for Option<Timestamp> {}
impl FromCell for Option<Timestamp> {
    fn null_value() -> Self {
        None
    }

    fn from_cell(cell: &Cell, column: &ColumnDescriptor, _: &SessionPolicy) -> Result<Self> {
        to_timestamp(cell, column).map(Some)
    }
}

impl private::Sealed for Option<SqlValue> {}
impl FromCell for Option<SqlValue> {
    fn null_value() -> Self {
        None
    }

    fn from_cell(cell: &Cell, column: &ColumnDescriptor, policy: &SessionPolicy) -> Result<Self> {
        to_value(cell, column, policy).map(Some)
    }
}
