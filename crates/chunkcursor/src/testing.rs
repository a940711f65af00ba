//! In-memory chunk transport for tests and benchmarks.
//!
//! Available with the `test-utils` feature.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::chunk::fetch::{
    ChunkFetcher, ChunkHandle, FetchError, QueryResultDescriptor, QueryResultFormat,
};
use crate::metadata::ColumnSchema;

const URL_PREFIX: &str = "mem://chunk/";

#[derive(Debug, Clone, Copy)]
enum FailurePlan {
    Transient { remaining: usize },
    Permanent,
}

/// Serves pre-built payloads by chunk index.
///
/// Failures and latency can be injected per chunk.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFetcher {
    payloads: Arc<Vec<Vec<u8>>>,
    row_counts: Vec<u64>,
    declared_size: Option<u64>,
    delay: Option<Duration>,
    chunk_delays: HashMap<usize, Duration>,
    failures: Arc<Mutex<HashMap<usize, FailurePlan>>>,
    fetches: Arc<Vec<AtomicUsize>>,
}

impl InMemoryFetcher {
    /// One chunk per payload, in order.
    pub fn from_payloads<I, P>(payloads: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Vec<u8>>,
    {
        let payloads: Vec<Vec<u8>> = payloads.into_iter().map(Into::into).collect();
        let row_counts = payloads.iter().map(|p| count_rows(p)).collect();
        let fetches = payloads.iter().map(|_| AtomicUsize::new(0)).collect();
        Self {
            payloads: Arc::new(payloads),
            row_counts,
            fetches: Arc::new(fetches),
            ..Self::default()
        }
    }

    /// Declare every chunk as `bytes` large instead of its payload length.
    #[must_use]
    pub const fn with_declared_size(mut self, bytes: u64) -> Self {
        self.declared_size = Some(bytes);
        self
    }

    /// Sleep for `delay` before answering each fetch.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sleep for `delay` before answering fetches of chunk `index` only.
    #[must_use]
    pub fn with_chunk_delay(mut self, index: usize, delay: Duration) -> Self {
        self.chunk_delays.insert(index, delay);
        self
    }

    /// Fail the first `times` fetches of chunk `index` with a transient error.
    #[must_use]
    pub fn fail_transient(self, index: usize, times: usize) -> Self {
        self.failures
            .lock()
            .insert(index, FailurePlan::Transient { remaining: times });
        self
    }

    /// Fail every fetch of chunk `index` with a permanent error.
    #[must_use]
    pub fn fail_permanent(self, index: usize) -> Self {
        self.failures.lock().insert(index, FailurePlan::Permanent);
        self
    }

    /// Handles addressing the payloads of this fetcher.
    #[must_use]
    pub fn handles(&self) -> Vec<ChunkHandle> {
        self.payloads
            .iter()
            .zip(&self.row_counts)
            .enumerate()
            .map(|(i, (payload, rows))| {
                ChunkHandle::new(
                    format!("{URL_PREFIX}{i}"),
                    *rows,
                    self.declared_size.unwrap_or(payload.len() as u64),
                )
            })
            .collect()
    }

    /// Descriptor of a row-oriented text result served by this fetcher.
    #[must_use]
    pub fn descriptor(&self, query_id: &str, columns: Vec<ColumnSchema>) -> QueryResultDescriptor {
        QueryResultDescriptor {
            query_id: query_id.to_owned(),
            format: QueryResultFormat::Json,
            columns,
            chunks: self.handles(),
            total_rows: None,
        }
    }

    /// Number of fetch calls made for chunk `index`.
    #[must_use]
    pub fn fetch_count(&self, index: usize) -> usize {
        self.fetches
            .get(index)
            .map_or(0, |count| count.load(Ordering::SeqCst))
    }

    fn index_of(handle: &ChunkHandle) -> Result<usize, FetchError> {
        handle
            .url
            .strip_prefix(URL_PREFIX)
            .and_then(|i| i.parse().ok())
            .ok_or_else(|| FetchError::Permanent(format!("unknown chunk url: {}", handle.url)))
    }
}

#[async_trait]
impl ChunkFetcher for InMemoryFetcher {
    async fn fetch(&self, handle: &ChunkHandle) -> Result<Vec<u8>, FetchError> {
        let index = Self::index_of(handle)?;
        if let Some(count) = self.fetches.get(index) {
            count.fetch_add(1, Ordering::SeqCst);
        }

        if let Some(delay) = self.chunk_delays.get(&index).copied().or(self.delay) {
            tokio::time::sleep(delay).await;
        }

        {
            let mut failures = self.failures.lock();
            match failures.get_mut(&index) {
                Some(FailurePlan::Permanent) => {
                    return Err(FetchError::Permanent(format!("chunk {index} is gone")));
                }
                Some(FailurePlan::Transient { remaining }) if *remaining > 0 => {
                    *remaining -= 1;
                    return Err(FetchError::Transient(format!("chunk {index} timed out")));
                }
                _ => {}
            }
        }

        self.payloads
            .get(index)
            .cloned()
            .ok_or_else(|| FetchError::Permanent(format!("chunk {index} out of range")))
    }
}

/// Render rows in the row-oriented text layout.
#[must_use]
pub fn json_rows(rows: &[Vec<Option<&str>>]) -> String {
    rows.iter()
        .map(|row| {
            serde_json::Value::Array(
                row.iter()
                    .map(|cell| {
                        cell.map_or(serde_json::Value::Null, |v| {
                            serde_json::Value::String(v.to_owned())
                        })
                    })
                    .collect(),
            )
            .to_string()
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn count_rows(payload: &[u8]) -> u64 {
    std::str::from_utf8(payload)
        .ok()
        .map(str::trim)
        .filter(|body| !body.is_empty())
        .and_then(|body| serde_json::from_str::<Vec<serde_json::Value>>(&format!("[{body}]")).ok())
        .map_or(0, |rows| rows.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_rows_layout() {
        let payload = json_rows(&[vec![Some("1"), None], vec![Some("2"), Some("b")]]);
        assert_eq!(payload, r#"["1",null],["2","b"]"#);
    }

    #[test]
    fn test_handles_carry_row_counts() {
        let fetcher = InMemoryFetcher::from_payloads([
            json_rows(&[vec![Some("1")], vec![Some("2")]]),
            String::new(),
        ]);
        let handles = fetcher.handles();
        assert_eq!(handles.len(), 2);
        assert_eq!(handles[0].row_count, 2);
        assert_eq!(handles[1].row_count, 0);
        assert_eq!(handles[1].url, "mem://chunk/1");
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let fetcher = InMemoryFetcher::from_payloads(["[\"1\"]", "[\"2\"]"])
            .fail_transient(0, 1)
            .fail_permanent(1);
        let handles = fetcher.handles();

        assert!(fetcher.fetch(&handles[0]).await.unwrap_err().is_transient());
        assert_eq!(fetcher.fetch(&handles[0]).await.unwrap(), b"[\"1\"]");
        assert!(!fetcher.fetch(&handles[1]).await.unwrap_err().is_transient());
        assert_eq!(fetcher.fetch_count(0), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunk_delay_applies_to_one_chunk() {
        let fetcher = InMemoryFetcher::from_payloads(["[\"1\"]", "[\"2\"]"])
            .with_chunk_delay(0, Duration::from_secs(5));
        let handles = fetcher.handles();

        let start = tokio::time::Instant::now();
        fetcher.fetch(&handles[1]).await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
        fetcher.fetch(&handles[0]).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(5));
    }
}
