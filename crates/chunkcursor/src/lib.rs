//! Chunked result materialization for SQL clients.
//!
//! A query result arrives as a schema header plus a list of remote chunk
//! handles. This crate downloads and decodes those chunks ahead of the
//! consumer under a shared memory budget, and exposes the rows through a
//! forward-only [`ResultCursor`] with typed, null-aware accessors.
//!
//! # Features
//!
//! - Bounded prefetch with retry of transient fetch failures
//! - Session-scoped [`MemoryBudget`] accounting for in-flight and decoded chunks
//! - Label lookup with a per-cursor memo and configurable case policy
//! - Client-side timing telemetry
//! - `metrics`: export download counters and latency histograms
//! - `test-utils`: in-memory chunk transport for tests and benchmarks
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use chunkcursor::{ClientConfig, MemoryBudget, ResultCursor, TelemetryRecorder, decoder_for};
//!
//! let config = ClientConfig::builder().memory_limit(256 * 1024 * 1024).build()?;
//! let budget = MemoryBudget::new(config.downloader.memory_limit);
//! let decoder = decoder_for(descriptor.format)?;
//! let mut cursor = ResultCursor::open(
//!     descriptor,
//!     fetcher,
//!     decoder,
//!     budget,
//!     &config,
//!     Arc::new(TelemetryRecorder::default()),
//! )?;
//! while cursor.advance().await? {
//!     let id = cursor.get_i64("ID")?;
//! }
//! ```
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod chunk;
pub mod coerce;
pub mod config;
pub mod cursor;
pub mod error;
pub mod lob;
pub mod metadata;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod resolver;
pub mod telemetry;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod types;

pub use chunk::{
    ChunkDecoder, ChunkDownloader, ChunkFetcher, ChunkHandle, ChunkState, DownloadStatistics,
    FetchError, JsonRowDecoder, MemoryBudget, QueryResultDescriptor, QueryResultFormat,
    RetryPolicy, ScheduleOutcome, decoder_for,
};
pub use coerce::{ColumnTypeCoercer, FromCell};
pub use config::{BinaryOutputFormat, ClientConfig, ConfigBuilder, DownloaderConfig, SessionPolicy};
pub use cursor::{CursorState, ResultCursor};
pub use error::{CursorError, Result};
pub use lob::{CharacterStream, LargeTextHandle, TextEncoding};
pub use metadata::{ColumnDescriptor, ColumnSchema, ResultSetMetadata};
pub use resolver::{ColumnNameResolver, ColumnRef, MemoStats};
pub use telemetry::{TelemetryEvent, TelemetryField, TelemetryRecorder, TelemetrySink, TracingSink};
pub use types::{Cell, Date, LogicalType, RowBatch, SqlType, SqlValue, Time, Timestamp};
