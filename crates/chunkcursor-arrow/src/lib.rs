//! Arrow IPC support for chunkcursor.
//!
//! Results in the columnar binary layout arrive as one Arrow IPC stream per
//! chunk. [`ArrowChunkDecoder`] turns those streams into engine rows and plugs
//! into a cursor in place of the built-in text decoder.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use chunkcursor::ResultCursor;
//! use chunkcursor_arrow::ArrowChunkDecoder;
//!
//! let cursor = ResultCursor::open(
//!     descriptor,
//!     fetcher,
//!     Arc::new(ArrowChunkDecoder),
//!     budget,
//!     &config,
//!     telemetry,
//! )?;
//! ```
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod mapping;

pub use decoder::{ArrowChunkDecoder, column_cells, decode_stream};
pub use encoder::encode_stream;
pub use error::{ArrowDecodeError, Result};
pub use mapping::{column_to_field, logical_type_to_arrow, schema_for};
