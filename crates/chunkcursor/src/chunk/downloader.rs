//! Background chunk downloader.
//!
//! Each chunk has a `watch` channel carrying its [`ChunkState`]. Fetch tasks
//! run on the tokio runtime that was current when the downloader was built,
//! bounded by a semaphore. Every state transition and every change to the
//! per-chunk charge table happens under one mutex, so each charged byte is
//! returned to the [`MemoryBudget`] exactly once.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{Semaphore, watch};
use tokio_util::sync::CancellationToken;

use super::budget::MemoryBudget;
use super::decode::ChunkDecoder;
use super::fetch::{ChunkFetcher, ChunkHandle};
use super::retry::{RetryDisposition, RetryError};
use crate::config::DownloaderConfig;
use crate::error::{CursorError, Result};
use crate::metadata::ResultSetMetadata;
use crate::types::RowBatch;

/// Lifecycle of one chunk.
#[derive(Debug, Clone)]
pub enum ChunkState {
    Pending,
    Fetching,
    Ready(Arc<RowBatch>),
    /// Handed to the consumer, still charged.
    Consumed(Arc<RowBatch>),
    Released,
    Failed(CursorError),
}

impl ChunkState {
    const fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending | Self::Fetching)
    }
}

/// Result of a [`ChunkDownloader::schedule`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// A fetch task was started.
    Scheduled,
    /// No budget headroom; retried when memory is released.
    Deferred,
    /// The chunk is already fetching, fetched, released or failed.
    AlreadyActive,
    /// Index out of range, or the downloader is closed.
    Unavailable,
}

/// Counters accumulated over the downloader's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadStatistics {
    pub chunks_fetched: u64,
    pub retries: u64,
    pub failures: u64,
    pub bytes_downloaded: u64,
    /// Sum of per-chunk fetch time, retries included.
    pub download_time: Duration,
    /// Sum of per-chunk decode time.
    pub parse_time: Duration,
    /// Time the consumer spent blocked in `acquire`.
    pub wait_time: Duration,
}

#[derive(Debug, Default)]
struct Counters {
    fetched: AtomicU64,
    retries: AtomicU64,
    failures: AtomicU64,
    bytes: AtomicU64,
    download_micros: AtomicU64,
    parse_micros: AtomicU64,
    wait_micros: AtomicU64,
}

fn add_elapsed(counter: &AtomicU64, since: Instant) {
    let micros = u64::try_from(since.elapsed().as_micros()).unwrap_or(u64::MAX);
    counter.fetch_add(micros, Ordering::Relaxed);
}

#[derive(Debug)]
struct Table {
    /// Bytes currently charged to the budget per chunk.
    charged: Vec<u64>,
    deferred: VecDeque<usize>,
    closed: bool,
}

struct Shared {
    handles: Vec<ChunkHandle>,
    fetcher: Arc<dyn ChunkFetcher>,
    decoder: Arc<dyn ChunkDecoder>,
    metadata: Arc<ResultSetMetadata>,
    budget: MemoryBudget,
    config: DownloaderConfig,
    slots: Vec<watch::Sender<ChunkState>>,
    table: Mutex<Table>,
    permits: Semaphore,
    cancel: CancellationToken,
    runtime: Handle,
    counters: Counters,
}

/// Fetches and decodes the chunks of one result ahead of the consumer.
pub struct ChunkDownloader {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for ChunkDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkDownloader")
            .field("chunks", &self.shared.handles.len())
            .field("config", &self.shared.config)
            .field("budget", &self.shared.budget)
            .finish_non_exhaustive()
    }
}

impl ChunkDownloader {
    /// Build a downloader for `handles`.
    ///
    /// Must be called from within a tokio runtime; fetch tasks are spawned on
    /// it.
    pub fn new(
        handles: Vec<ChunkHandle>,
        fetcher: Arc<dyn ChunkFetcher>,
        decoder: Arc<dyn ChunkDecoder>,
        metadata: Arc<ResultSetMetadata>,
        budget: MemoryBudget,
        config: DownloaderConfig,
    ) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| CursorError::runtime(format!("chunk downloader needs a tokio runtime: {e}")))?;

        let slots = handles
            .iter()
            .map(|_| watch::Sender::new(ChunkState::Pending))
            .collect();
        let table = Table {
            charged: vec![0; handles.len()],
            deferred: VecDeque::new(),
            closed: false,
        };
        let permits = Semaphore::new(config.max_concurrent_fetches.max(1));

        tracing::debug!(
            query_id = metadata.query_id(),
            chunks = handles.len(),
            lookahead = config.prefetch_lookahead,
            max_concurrent = config.max_concurrent_fetches,
            "chunk downloader created"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                handles,
                fetcher,
                decoder,
                metadata,
                budget,
                config,
                slots,
                table: Mutex::new(table),
                permits,
                cancel: CancellationToken::new(),
                runtime,
                counters: Counters::default(),
            }),
        })
    }

    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.shared.handles.len()
    }

    /// Declared metadata of chunk `index`.
    #[must_use]
    pub fn handle(&self, index: usize) -> Option<&ChunkHandle> {
        self.shared.handles.get(index)
    }

    /// Current state of chunk `index`.
    #[must_use]
    pub fn state(&self, index: usize) -> Option<ChunkState> {
        self.shared
            .slots
            .get(index)
            .map(|slot| ChunkState::clone(&slot.borrow()))
    }

    /// Start fetching chunk `index` if it is pending and the budget allows.
    pub fn schedule(&self, index: usize) -> ScheduleOutcome {
        self.shared.schedule(index, false)
    }

    /// Wait for chunk `index` and return its rows.
    ///
    /// A pending chunk is scheduled regardless of the budget. Failures are
    /// returned on every call for the same chunk.
    pub async fn acquire(&self, index: usize) -> Result<Arc<RowBatch>> {
        let shared = &self.shared;
        let Some(slot) = shared.slots.get(index) else {
            return Err(CursorError::invalid_argument(format!(
                "chunk index {index} out of range (chunks: {})",
                shared.handles.len()
            )));
        };
        let closed = shared.table.lock().closed;
        if closed {
            return Err(CursorError::closed());
        }

        shared.schedule(index, true);

        let started = Instant::now();
        let mut rx = slot.subscribe();
        let state = {
            let current = rx
                .wait_for(ChunkState::is_settled)
                .await
                .map_err(|_| CursorError::runtime("chunk state channel closed"))?;
            ChunkState::clone(&current)
        };
        add_elapsed(&shared.counters.wait_micros, started);

        match state {
            ChunkState::Ready(batch) => {
                let _table = shared.table.lock();
                if matches!(*slot.borrow(), ChunkState::Ready(_)) {
                    slot.send_replace(ChunkState::Consumed(Arc::clone(&batch)));
                }
                Ok(batch)
            }
            ChunkState::Consumed(batch) => Ok(batch),
            ChunkState::Failed(err) => Err(err),
            ChunkState::Released if shared.table.lock().closed => Err(CursorError::closed()),
            ChunkState::Released => Err(CursorError::invalid_argument(format!(
                "chunk {index} was already released"
            ))),
            ChunkState::Pending | ChunkState::Fetching => {
                Err(CursorError::runtime("chunk state did not settle"))
            }
        }
    }

    /// Drop chunk `index` and return its memory. Repeat calls are no-ops.
    pub fn release(&self, index: usize) {
        self.shared.release(index);
    }

    /// Schedule the chunks after `index`, up to the configured lookahead.
    ///
    /// Deferred requests are retried first.
    pub fn prefetch_from(&self, index: usize) {
        self.shared.drain_deferred();
        let lookahead = self.shared.config.prefetch_lookahead;
        for next in index.saturating_add(1)..=index.saturating_add(lookahead) {
            if self.shared.schedule(next, false) == ScheduleOutcome::Unavailable {
                break;
            }
        }
    }

    /// Cancel outstanding fetches and release every chunk. Idempotent.
    pub fn close(&self) {
        self.shared.close();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.table.lock().closed
    }

    /// Snapshot of the accumulated counters.
    #[must_use]
    pub fn statistics(&self) -> DownloadStatistics {
        let c = &self.shared.counters;
        DownloadStatistics {
            chunks_fetched: c.fetched.load(Ordering::Relaxed),
            retries: c.retries.load(Ordering::Relaxed),
            failures: c.failures.load(Ordering::Relaxed),
            bytes_downloaded: c.bytes.load(Ordering::Relaxed),
            download_time: Duration::from_micros(c.download_micros.load(Ordering::Relaxed)),
            parse_time: Duration::from_micros(c.parse_micros.load(Ordering::Relaxed)),
            wait_time: Duration::from_micros(c.wait_micros.load(Ordering::Relaxed)),
        }
    }
}

impl Drop for ChunkDownloader {
    fn drop(&mut self) {
        self.shared.close();
    }
}

impl Shared {
    fn schedule(self: &Arc<Self>, index: usize, forced: bool) -> ScheduleOutcome {
        let mut table = self.table.lock();
        let Some(slot) = self.slots.get(index) else {
            return ScheduleOutcome::Unavailable;
        };
        if table.closed {
            return ScheduleOutcome::Unavailable;
        }
        if !matches!(*slot.borrow(), ChunkState::Pending) {
            return ScheduleOutcome::AlreadyActive;
        }

        let declared = self.handles[index].uncompressed_size;
        if forced {
            self.budget.charge(declared);
        } else if let Err(err) = self.budget.try_charge(declared) {
            if !table.deferred.contains(&index) {
                table.deferred.push_back(index);
            }
            tracing::debug!(chunk = index, error = %err, "chunk fetch deferred");
            return ScheduleOutcome::Deferred;
        }

        table.deferred.retain(|&i| i != index);
        table.charged[index] = declared;
        slot.send_replace(ChunkState::Fetching);
        drop(table);

        tracing::debug!(chunk = index, declared_bytes = declared, forced, "chunk fetch scheduled");
        self.spawn_fetch(index);
        ScheduleOutcome::Scheduled
    }

    fn spawn_fetch(self: &Arc<Self>, index: usize) {
        let shared = Arc::clone(self);
        self.runtime.spawn(async move {
            let outcome = tokio::select! {
                () = shared.cancel.cancelled() => {
                    tracing::debug!(chunk = index, "chunk fetch cancelled");
                    return;
                }
                outcome = shared.fetch_and_decode(index) => outcome,
            };
            shared.complete(index, outcome);
        });
    }

    async fn fetch_and_decode(&self, index: usize) -> Result<Arc<RowBatch>> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| CursorError::closed())?;
        let handle = &self.handles[index];

        let started = Instant::now();
        let payload = self
            .config
            .retry
            .run(
                || self.fetcher.fetch(handle),
                |err| {
                    if err.is_transient() {
                        RetryDisposition::Retry
                    } else {
                        RetryDisposition::Stop
                    }
                },
                |attempt, err| {
                    self.counters.retries.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(chunk = index, attempt, error = %err, "retrying chunk fetch");
                },
            )
            .await
            .map_err(|err| {
                let transient = matches!(err, RetryError::AttemptsExceeded(_));
                CursorError::fetch(index, transient, err.into_inner().to_string())
            });
        #[cfg(feature = "metrics")]
        let download_time = started.elapsed();
        add_elapsed(&self.counters.download_micros, started);
        let payload = payload?;
        self.counters
            .bytes
            .fetch_add(payload.len() as u64, Ordering::Relaxed);

        let started = Instant::now();
        let batch = self.decoder.decode(&payload, &self.metadata);
        add_elapsed(&self.counters.parse_micros, started);

        #[cfg(feature = "metrics")]
        crate::metrics::record_chunk_fetch(download_time, started.elapsed(), payload.len() as u64);

        batch.map(Arc::new)
    }

    fn complete(self: &Arc<Self>, index: usize, outcome: Result<Arc<RowBatch>>) {
        let mut table = self.table.lock();
        let slot = &self.slots[index];
        if !matches!(*slot.borrow(), ChunkState::Fetching) {
            // released or closed while the fetch was running
            return;
        }

        let charged = table.charged[index];
        let freed = match outcome {
            Ok(batch) => {
                let actual = batch.byte_size();
                self.budget.adjust(charged, actual);
                table.charged[index] = actual;
                self.counters.fetched.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    chunk = index,
                    rows = batch.len(),
                    declared_bytes = charged,
                    decoded_bytes = actual,
                    "chunk ready"
                );
                slot.send_replace(ChunkState::Ready(batch));
                actual < charged
            }
            Err(err) => {
                self.budget.uncharge(charged);
                table.charged[index] = 0;
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                tracing::error!(chunk = index, error = %err, "chunk failed");
                #[cfg(feature = "metrics")]
                crate::metrics::record_chunk_failure();
                slot.send_replace(ChunkState::Failed(err));
                true
            }
        };
        drop(table);

        if freed {
            self.drain_deferred();
        }
    }

    fn release(self: &Arc<Self>, index: usize) {
        {
            let mut table = self.table.lock();
            let Some(slot) = self.slots.get(index) else {
                return;
            };
            if matches!(*slot.borrow(), ChunkState::Released) {
                return;
            }
            let charged = std::mem::take(&mut table.charged[index]);
            self.budget.uncharge(charged);
            table.deferred.retain(|&i| i != index);
            slot.send_replace(ChunkState::Released);
            tracing::debug!(chunk = index, bytes = charged, "chunk released");
        }
        self.drain_deferred();
    }

    fn drain_deferred(self: &Arc<Self>) {
        let waiting: Vec<usize> = self.table.lock().deferred.drain(..).collect();
        for index in waiting {
            self.schedule(index, false);
        }
    }

    fn close(&self) {
        let mut table = self.table.lock();
        if table.closed {
            return;
        }
        table.closed = true;
        self.cancel.cancel();
        self.permits.close();

        let mut returned = 0;
        for (charged, slot) in table.charged.iter_mut().zip(&self.slots) {
            returned += std::mem::take(charged);
            if !matches!(*slot.borrow(), ChunkState::Released) {
                slot.send_replace(ChunkState::Released);
            }
        }
        self.budget.uncharge(returned);
        table.deferred.clear();

        tracing::debug!(
            query_id = self.metadata.query_id(),
            bytes = returned,
            "chunk downloader closed"
        );
    }
}
