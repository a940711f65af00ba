//! Decoded cells and row batches.

use std::mem::size_of;

use super::temporal::{Date, Time, Timestamp};

/// One decoded raw value.
///
/// Row-oriented text payloads keep numeric and character data as
/// [`Cell::Text`] and leave parsing to the accessor; columnar payloads produce
/// typed variants directly.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Text(String),
    Int(i64),
    /// Exact numeric stored as `unscaled * 10^-scale`.
    Decimal {
        unscaled: i128,
        scale: i8,
    },
    Double(f64),
    Boolean(bool),
    Binary(Vec<u8>),
    Date(Date),
    Time(Time),
    Timestamp(Timestamp),
}

impl Cell {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Approximate heap plus inline footprint, used for memory accounting.
    #[must_use]
    pub fn byte_size(&self) -> u64 {
        let heap = match self {
            Self::Text(s) => s.capacity(),
            Self::Binary(b) => b.capacity(),
            _ => 0,
        };
        (size_of::<Self>() + heap) as u64
    }
}

/// A single decoded row.
pub type Row = Vec<Cell>;

/// The decoded rows of one chunk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowBatch {
    rows: Vec<Row>,
    byte_size: u64,
}

impl RowBatch {
    /// Build a batch and compute its memory footprint.
    #[must_use]
    pub fn new(rows: Vec<Row>) -> Self {
        let byte_size = rows
            .iter()
            .map(|row| {
                size_of::<Row>() as u64 + row.iter().map(Cell::byte_size).sum::<u64>()
            })
            .sum();
        Self { rows, byte_size }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row at `offset`, 0-based.
    #[must_use]
    pub fn row(&self, offset: usize) -> Option<&[Cell]> {
        self.rows.get(offset).map(Vec::as_slice)
    }

    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Decoded footprint in bytes.
    #[must_use]
    pub const fn byte_size(&self) -> u64 {
        self.byte_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_batch() {
        let batch = RowBatch::new(Vec::new());
        assert!(batch.is_empty());
        assert_eq!(batch.byte_size(), 0);
        assert!(batch.row(0).is_none());
    }

    #[test]
    fn test_batch_size_accounts_for_heap() {
        let small = RowBatch::new(vec![vec![Cell::Int(1)]]);
        let large = RowBatch::new(vec![vec![Cell::Text("x".repeat(1000))]]);
        assert!(large.byte_size() >= small.byte_size() + 1000);
    }

    #[test]
    fn test_row_access() {
        let batch = RowBatch::new(vec![
            vec![Cell::Int(1), Cell::Null],
            vec![Cell::Int(2), Cell::Boolean(true)],
        ]);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.row(1).unwrap()[1], Cell::Boolean(true));
        assert!(batch.row(0).unwrap()[1].is_null());
    }
}
