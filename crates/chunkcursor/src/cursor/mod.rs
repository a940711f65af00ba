//! Forward-only cursor over a chunked result.
//!
//! The cursor walks rows in (chunk, offset) order. Crossing into a new chunk
//! releases the drained one, acquires the next from the
//! [`ChunkDownloader`] and schedules prefetch beyond it.

use std::sync::Arc;
use std::time::Instant;

use bigdecimal::BigDecimal;

use crate::chunk::{
    ChunkDecoder, ChunkDownloader, ChunkFetcher, DownloadStatistics, MemoryBudget,
    QueryResultDescriptor,
};
use crate::coerce::{ColumnTypeCoercer, FromCell};
use crate::config::ClientConfig;
use crate::error::{CursorError, Result};
use crate::lob::{CharacterStream, LargeTextHandle};
use crate::metadata::{ColumnDescriptor, ResultSetMetadata};
use crate::resolver::{ColumnNameResolver, ColumnRef, MemoStats};
use crate::telemetry::{TelemetryField, TelemetryRecorder};
use crate::types::{Cell, Date, RowBatch, SqlValue, Time, Timestamp};

#[cfg(test)]
mod tests;

/// Position of a cursor in its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    BeforeFirst,
    OnRow,
    AfterLast,
    Closed,
}

/// Remembers whether the last typed accessor read a null.
#[derive(Debug, Default)]
struct NullTracker {
    last_was_null: std::cell::Cell<bool>,
}

impl NullTracker {
    fn set(&self, was_null: bool) {
        self.last_was_null.set(was_null);
    }

    fn get(&self) -> bool {
        self.last_was_null.get()
    }
}

/// Telemetry fields already emitted by this cursor.
#[derive(Debug, Default)]
struct Recorded {
    first_result: bool,
    last_result: bool,
    chunk_totals: bool,
}

#[derive(Debug)]
struct CurrentChunk {
    index: usize,
    batch: Arc<RowBatch>,
    offset: usize,
}

/// Forward-only, typed, null-aware row cursor.
#[derive(Debug)]
pub struct ResultCursor {
    metadata: Arc<ResultSetMetadata>,
    resolver: ColumnNameResolver,
    coercer: ColumnTypeCoercer,
    downloader: ChunkDownloader,
    telemetry: Arc<TelemetryRecorder>,
    state: CursorState,
    /// Rows passed so far; the current row's 1-based number while on a row.
    position: u64,
    total_rows: Option<u64>,
    next_chunk: usize,
    current: Option<CurrentChunk>,
    failure: Option<CursorError>,
    nulls: NullTracker,
    opened_at: Instant,
    recorded: Recorded,
}

impl ResultCursor {
    /// Open a cursor over `descriptor` and start prefetching its first chunks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(
        descriptor: QueryResultDescriptor,
        fetcher: Arc<dyn ChunkFetcher>,
        decoder: Arc<dyn ChunkDecoder>,
        budget: MemoryBudget,
        config: &ClientConfig,
        telemetry: Arc<TelemetryRecorder>,
    ) -> Result<Self> {
        let QueryResultDescriptor {
            query_id,
            columns,
            chunks,
            total_rows,
            ..
        } = descriptor;

        let metadata = Arc::new(ResultSetMetadata::from_schema(
            query_id,
            &columns,
            &config.session,
        )?);
        let resolver = ColumnNameResolver::new(
            metadata.columns().iter().map(ColumnDescriptor::label),
            config.session.column_case_insensitive,
        );
        let downloader = ChunkDownloader::new(
            chunks,
            fetcher,
            decoder,
            Arc::clone(&metadata),
            budget,
            config.downloader.clone(),
        )?;

        if downloader.chunk_count() > 0 {
            downloader.schedule(0);
            downloader.prefetch_from(0);
        }

        tracing::debug!(
            query_id = metadata.query_id(),
            columns = metadata.column_count(),
            chunks = downloader.chunk_count(),
            total_rows,
            "result cursor opened"
        );

        Ok(Self {
            metadata,
            resolver,
            coercer: ColumnTypeCoercer::new(config.session.clone()),
            downloader,
            telemetry,
            state: CursorState::BeforeFirst,
            position: 0,
            total_rows,
            next_chunk: 0,
            current: None,
            failure: None,
            nulls: NullTracker::default(),
            opened_at: Instant::now(),
            recorded: Recorded::default(),
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Navigation
    // ═══════════════════════════════════════════════════════════════════════

    /// Move to the next row. Returns `false` once the result is exhausted.
    ///
    /// After the end, or after `close`, this keeps returning `Ok(false)`. A
    /// chunk that failed permanently makes every later call return the same
    /// error.
    pub async fn advance(&mut self) -> Result<bool> {
        if matches!(self.state, CursorState::Closed | CursorState::AfterLast) {
            return Ok(false);
        }
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }

        if let Some(current) = &mut self.current
            && current.offset + 1 < current.batch.len()
            && self.state == CursorState::OnRow
        {
            current.offset += 1;
            self.enter_row();
            return Ok(true);
        }

        loop {
            if let Some(drained) = self.current.take() {
                self.downloader.release(drained.index);
            }
            if self.next_chunk >= self.downloader.chunk_count() {
                self.enter_after_last();
                return Ok(false);
            }

            let index = self.next_chunk;
            let batch = match self.downloader.acquire(index).await {
                Ok(batch) => batch,
                Err(err) => {
                    tracing::error!(
                        query_id = self.metadata.query_id(),
                        chunk = index,
                        error = %err,
                        "cursor failed"
                    );
                    self.failure = Some(err.clone());
                    return Err(err);
                }
            };
            self.next_chunk += 1;
            self.downloader.prefetch_from(index);

            let empty = batch.is_empty();
            self.current = Some(CurrentChunk {
                index,
                batch,
                offset: 0,
            });
            if !empty {
                self.enter_row();
                return Ok(true);
            }
        }
    }

    fn enter_row(&mut self) {
        self.state = CursorState::OnRow;
        self.position += 1;
        if self.position == 1 && !self.recorded.first_result {
            self.recorded.first_result = true;
            self.telemetry.record(
                TelemetryField::ClientTimeConsumeFirstResult,
                self.metadata.query_id(),
                self.opened_at.elapsed(),
            );
        }
    }

    fn enter_after_last(&mut self) {
        self.state = CursorState::AfterLast;
        self.total_rows = Some(self.position);
        if !self.recorded.last_result {
            self.recorded.last_result = true;
            self.telemetry.record(
                TelemetryField::ClientTimeConsumeLastResult,
                self.metadata.query_id(),
                self.opened_at.elapsed(),
            );
        }
        self.record_chunk_totals();
        tracing::debug!(
            query_id = self.metadata.query_id(),
            rows = self.position,
            "result exhausted"
        );
    }

    fn record_chunk_totals(&mut self) {
        if self.recorded.chunk_totals {
            return;
        }
        self.recorded.chunk_totals = true;

        let stats = self.downloader.statistics();
        let query_id = self.metadata.query_id();
        self.telemetry.record(
            TelemetryField::ClientTimeWaitingForChunks,
            query_id,
            stats.wait_time,
        );
        self.telemetry.record(
            TelemetryField::ClientTimeDownloadingChunks,
            query_id,
            stats.download_time,
        );
        self.telemetry.record(
            TelemetryField::ClientTimeParsingChunks,
            query_id,
            stats.parse_time,
        );
    }

    /// Release every chunk and clear the label memo. Idempotent.
    pub fn close(&mut self) {
        if self.state == CursorState::Closed {
            return;
        }
        self.record_chunk_totals();
        self.current = None;
        self.downloader.close();
        self.resolver.clear();
        self.state = CursorState::Closed;
        tracing::debug!(query_id = self.metadata.query_id(), "result cursor closed");
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Position predicates
    // ═══════════════════════════════════════════════════════════════════════

    #[must_use]
    pub const fn state(&self) -> CursorState {
        self.state
    }

    const fn is_on_row(&self) -> bool {
        matches!(self.state, CursorState::OnRow) && self.failure.is_none()
    }

    #[must_use]
    pub const fn is_before_first(&self) -> bool {
        matches!(self.state, CursorState::BeforeFirst)
    }

    #[must_use]
    pub const fn is_first(&self) -> bool {
        self.is_on_row() && self.position == 1
    }

    /// True only when no further row can exist.
    ///
    /// Without a known total this stays false until the current row is the
    /// last row of the last chunk.
    #[must_use]
    pub fn is_last(&self) -> bool {
        if !self.is_on_row() {
            return false;
        }
        if self.total_rows == Some(self.position) {
            return true;
        }
        self.current.as_ref().is_some_and(|current| {
            current.index + 1 == self.downloader.chunk_count()
                && current.offset + 1 == current.batch.len()
        })
    }

    #[must_use]
    pub const fn is_after_last(&self) -> bool {
        matches!(self.state, CursorState::AfterLast)
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self.state, CursorState::Closed)
    }

    /// 1-based number of the current row, 0 when not on a row.
    #[must_use]
    pub const fn current_row_number(&self) -> u64 {
        if self.is_on_row() { self.position } else { 0 }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Metadata and diagnostics
    // ═══════════════════════════════════════════════════════════════════════

    #[must_use]
    pub fn metadata(&self) -> &ResultSetMetadata {
        &self.metadata
    }

    #[must_use]
    pub fn query_id(&self) -> &str {
        self.metadata.query_id()
    }

    /// 1-based index of the column labelled `name`.
    pub fn find_column(&self, name: &str) -> Result<usize> {
        if self.is_closed() {
            return Err(CursorError::closed());
        }
        self.resolver.resolve_label(name)
    }

    #[must_use]
    pub fn download_statistics(&self) -> DownloadStatistics {
        self.downloader.statistics()
    }

    #[must_use]
    pub fn memo_stats(&self) -> MemoStats {
        self.resolver.memo_stats()
    }

    /// Whether the most recent typed accessor read a null.
    ///
    /// Only successful reads update this flag; an accessor that fails leaves
    /// the previous answer in place.
    #[must_use]
    pub fn was_null(&self) -> bool {
        self.nulls.get()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Typed accessors
    // ═══════════════════════════════════════════════════════════════════════

    fn cell(&self, column: ColumnRef<'_>) -> Result<(&Cell, &ColumnDescriptor)> {
        if self.is_closed() {
            return Err(CursorError::closed());
        }
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }

        let index = self.resolver.resolve(column)?;
        let current = match (&self.current, self.state) {
            (Some(current), CursorState::OnRow) => current,
            _ => return Err(CursorError::no_current_row()),
        };
        let descriptor = self.metadata.column(index)?;
        let cell = current
            .batch
            .row(current.offset)
            .and_then(|row| row.get(index - 1))
            .ok_or_else(|| {
                CursorError::decode(format!(
                    "row {} has no value for column {index}",
                    self.position
                ))
            })?;
        Ok((cell, descriptor))
    }

    /// Read the current row's `column` as `T`.
    pub fn get<'a, T: FromCell>(&self, column: impl Into<ColumnRef<'a>>) -> Result<T> {
        let (cell, descriptor) = self.cell(column.into())?;
        let (value, was_null) = self.coercer.coerce::<T>(cell, descriptor)?;
        self.nulls.set(was_null);
        Ok(value)
    }

    pub fn get_string<'a>(&self, column: impl Into<ColumnRef<'a>>) -> Result<Option<String>> {
        self.get(column)
    }

    pub fn get_i8<'a>(&self, column: impl Into<ColumnRef<'a>>) -> Result<i8> {
        self.get(column)
    }

    pub fn get_i16<'a>(&self, column: impl Into<ColumnRef<'a>>) -> Result<i16> {
        self.get(column)
    }

    pub fn get_i32<'a>(&self, column: impl Into<ColumnRef<'a>>) -> Result<i32> {
        self.get(column)
    }

    pub fn get_i64<'a>(&self, column: impl Into<ColumnRef<'a>>) -> Result<i64> {
        self.get(column)
    }

    pub fn get_f32<'a>(&self, column: impl Into<ColumnRef<'a>>) -> Result<f32> {
        self.get(column)
    }

    pub fn get_f64<'a>(&self, column: impl Into<ColumnRef<'a>>) -> Result<f64> {
        self.get(column)
    }

    pub fn get_bool<'a>(&self, column: impl Into<ColumnRef<'a>>) -> Result<bool> {
        self.get(column)
    }

    pub fn get_decimal<'a>(&self, column: impl Into<ColumnRef<'a>>) -> Result<Option<BigDecimal>> {
        self.get(column)
    }

    pub fn get_bytes<'a>(&self, column: impl Into<ColumnRef<'a>>) -> Result<Option<Vec<u8>>> {
        self.get(column)
    }

    pub fn get_date<'a>(&self, column: impl Into<ColumnRef<'a>>) -> Result<Option<Date>> {
        self.get(column)
    }

    pub fn get_time<'a>(&self, column: impl Into<ColumnRef<'a>>) -> Result<Option<Time>> {
        self.get(column)
    }

    pub fn get_timestamp<'a>(&self, column: impl Into<ColumnRef<'a>>) -> Result<Option<Timestamp>> {
        self.get(column)
    }

    /// Value typed by the column's presentation type.
    pub fn get_object<'a>(&self, column: impl Into<ColumnRef<'a>>) -> Result<Option<SqlValue>> {
        self.get(column)
    }

    pub fn get_large_text<'a>(
        &self,
        column: impl Into<ColumnRef<'a>>,
    ) -> Result<Option<LargeTextHandle>> {
        self.get_string(column)
            .map(|value| value.map(LargeTextHandle::new))
    }

    pub fn get_character_stream<'a>(
        &self,
        column: impl Into<ColumnRef<'a>>,
    ) -> Result<Option<CharacterStream>> {
        self.get_large_text(column)
            .map(|text| text.as_ref().map(LargeTextHandle::character_stream))
    }
}

impl Drop for ResultCursor {
    fn drop(&mut self) {
        self.close();
    }
}
