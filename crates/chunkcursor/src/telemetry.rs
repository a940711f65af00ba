//! Client-side timing telemetry.
//!
//! Cursors append [`TelemetryEvent`]s to a shared [`TelemetryRecorder`];
//! `flush` hands the buffered events to a [`TelemetrySink`] in one batch.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;

use crate::config::ClientConfig;
use crate::error::Result;

/// Fixed set of measured fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryField {
    /// Open to first row.
    ClientTimeConsumeFirstResult,
    /// Open to end of result.
    ClientTimeConsumeLastResult,
    /// Time the consumer was blocked on chunks.
    ClientTimeWaitingForChunks,
    /// Total chunk download time.
    ClientTimeDownloadingChunks,
    /// Total chunk decode time.
    ClientTimeParsingChunks,
}

impl TelemetryField {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ClientTimeConsumeFirstResult => "client_time_consume_first_result",
            Self::ClientTimeConsumeLastResult => "client_time_consume_last_result",
            Self::ClientTimeWaitingForChunks => "client_time_waiting_for_chunks",
            Self::ClientTimeDownloadingChunks => "client_time_downloading_chunks",
            Self::ClientTimeParsingChunks => "client_time_parsing_chunks",
        }
    }
}

impl fmt::Display for TelemetryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One timing measurement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TelemetryEvent {
    #[serde(rename = "type")]
    pub field: TelemetryField,
    pub query_id: String,
    pub value_ms: u64,
    /// Wall-clock milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
}

impl TelemetryEvent {
    #[must_use]
    pub fn now(field: TelemetryField, query_id: impl Into<String>, value: Duration) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
        Self {
            field,
            query_id: query_id.into(),
            value_ms: u64::try_from(value.as_millis()).unwrap_or(u64::MAX),
            timestamp_ms,
        }
    }
}

/// Destination of flushed telemetry batches.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn send(&self, events: Vec<TelemetryEvent>) -> Result<()>;
}

/// Serializes batches to JSON and emits them as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait]
impl TelemetrySink for TracingSink {
    async fn send(&self, events: Vec<TelemetryEvent>) -> Result<()> {
        let payload = serde_json::to_string(&events)?;
        tracing::info!(target: "chunkcursor::telemetry", count = events.len(), %payload, "telemetry flushed");
        Ok(())
    }
}

/// Ordered, unbounded buffer of telemetry events.
pub struct TelemetryRecorder {
    enabled: bool,
    buffer: Mutex<Vec<TelemetryEvent>>,
    sink: Arc<dyn TelemetrySink>,
}

impl fmt::Debug for TelemetryRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelemetryRecorder")
            .field("enabled", &self.enabled)
            .field("buffered", &self.buffer.lock().len())
            .finish_non_exhaustive()
    }
}

impl Default for TelemetryRecorder {
    fn default() -> Self {
        Self::new(true, Arc::new(TracingSink))
    }
}

impl TelemetryRecorder {
    #[must_use]
    pub fn new(enabled: bool, sink: Arc<dyn TelemetrySink>) -> Self {
        Self {
            enabled,
            buffer: Mutex::new(Vec::new()),
            sink,
        }
    }

    /// Recorder that drops every event.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(false, Arc::new(TracingSink))
    }

    /// Recorder honoring `config.telemetry_enabled`.
    #[must_use]
    pub fn from_config(config: &ClientConfig, sink: Arc<dyn TelemetrySink>) -> Self {
        Self::new(config.telemetry_enabled, sink)
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Append a measurement for `query_id`.
    pub fn record(&self, field: TelemetryField, query_id: &str, value: Duration) {
        if !self.enabled {
            return;
        }
        let event = TelemetryEvent::now(field, query_id, value);
        #[cfg(feature = "metrics")]
        crate::metrics::record_client_time(field, event.value_ms);
        tracing::trace!(field = %field, query_id, value_ms = event.value_ms, "telemetry recorded");
        self.buffer.lock().push(event);
    }

    /// Snapshot of the buffered events.
    #[must_use]
    pub fn log_buffer(&self) -> Vec<TelemetryEvent> {
        self.buffer.lock().clone()
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Send every buffered event to the sink and return how many were sent.
    ///
    /// An empty buffer does not reach the sink. Events are put back in front
    /// of newer ones if the sink fails.
    pub async fn flush(&self) -> Result<usize> {
        let events = std::mem::take(&mut *self.buffer.lock());
        if events.is_empty() {
            return Ok(0);
        }

        let count = events.len();
        if let Err(err) = self.sink.send(events.clone()).await {
            tracing::warn!(error = %err, count, "telemetry flush failed");
            let mut buffer = self.buffer.lock();
            let newer = std::mem::replace(&mut *buffer, events);
            buffer.extend(newer);
            return Err(err);
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::CursorError;

    #[derive(Default)]
    struct CollectingSink {
        calls: AtomicUsize,
        events: Mutex<Vec<TelemetryEvent>>,
        fail: bool,
    }

    #[async_trait]
    impl TelemetrySink for CollectingSink {
        async fn send(&self, events: Vec<TelemetryEvent>) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(CursorError::runtime("sink unavailable"));
            }
            self.events.lock().extend(events);
            Ok(())
        }
    }

    #[test]
    fn test_field_names() {
        assert_eq!(
            TelemetryField::ClientTimeConsumeFirstResult.to_string(),
            "client_time_consume_first_result"
        );
        assert_eq!(
            TelemetryField::ClientTimeParsingChunks.as_str(),
            "client_time_parsing_chunks"
        );
    }

    #[test]
    fn test_event_serializes_field_name() {
        let event = TelemetryEvent {
            field: TelemetryField::ClientTimeWaitingForChunks,
            query_id: "q1".into(),
            value_ms: 12,
            timestamp_ms: 1,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "client_time_waiting_for_chunks");
        assert_eq!(json["value_ms"], 12);
    }

    #[tokio::test]
    async fn test_flush_drains_in_order() {
        let sink = Arc::new(CollectingSink::default());
        let recorder = TelemetryRecorder::new(true, sink.clone());

        recorder.record(TelemetryField::ClientTimeConsumeFirstResult, "q", Duration::from_millis(5));
        recorder.record(TelemetryField::ClientTimeConsumeLastResult, "q", Duration::from_millis(9));
        assert_eq!(recorder.log_buffer().len(), 2);

        assert_eq!(recorder.flush().await.unwrap(), 2);
        assert_eq!(recorder.pending(), 0);

        let sent = sink.events.lock().clone();
        assert_eq!(sent[0].field, TelemetryField::ClientTimeConsumeFirstResult);
        assert_eq!(sent[1].value_ms, 9);
    }

    #[tokio::test]
    async fn test_flush_empty_is_noop() {
        let sink = Arc::new(CollectingSink::default());
        let recorder = TelemetryRecorder::new(true, sink.clone());

        assert_eq!(recorder.flush().await.unwrap(), 0);
        assert_eq!(sink.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_disabled_recorder_drops_events() {
        let recorder = TelemetryRecorder::disabled();
        recorder.record(TelemetryField::ClientTimeParsingChunks, "q", Duration::from_millis(1));
        assert_eq!(recorder.pending(), 0);
        assert!(!recorder.is_enabled());
    }

    #[tokio::test]
    async fn test_failed_flush_keeps_events() {
        let sink = Arc::new(CollectingSink {
            fail: true,
            ..CollectingSink::default()
        });
        let recorder = TelemetryRecorder::new(true, sink);
        recorder.record(TelemetryField::ClientTimeParsingChunks, "q", Duration::from_millis(1));

        assert!(recorder.flush().await.is_err());
        assert_eq!(recorder.pending(), 1);
    }

    #[test]
    fn test_from_config_honors_switch() {
        let config = ClientConfig {
            telemetry_enabled: false,
            ..ClientConfig::default()
        };
        let recorder = TelemetryRecorder::from_config(&config, Arc::new(TracingSink));
        assert!(!recorder.is_enabled());
        assert!(TelemetryRecorder::from_config(&ClientConfig::default(), Arc::new(TracingSink)).is_enabled());
    }

    #[tokio::test]
    async fn test_tracing_sink_accepts_batch() {
        let recorder = TelemetryRecorder::default();
        recorder.record(TelemetryField::ClientTimeDownloadingChunks, "q", Duration::from_millis(3));
        assert_eq!(recorder.flush().await.unwrap(), 1);
    }
}
