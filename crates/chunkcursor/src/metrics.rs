//! Metrics emitted through the `metrics` facade.
//!
//! No recorder is installed here; the embedding application decides where
//! the values go.

use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};

use crate::telemetry::TelemetryField;

const METRIC_CHUNKS_FETCHED: &str = "chunkcursor_chunks_fetched_total";
const METRIC_CHUNK_FAILURES: &str = "chunkcursor_chunk_failures_total";
const METRIC_CHUNK_BYTES: &str = "chunkcursor_chunk_bytes_total";
const METRIC_DOWNLOAD_DURATION: &str = "chunkcursor_chunk_download_seconds";
const METRIC_PARSE_DURATION: &str = "chunkcursor_chunk_parse_seconds";
const METRIC_CLIENT_TIME: &str = "chunkcursor_client_time_milliseconds";

/// Register descriptions for every metric this crate emits.
pub fn describe_metrics() {
    describe_counter!(METRIC_CHUNKS_FETCHED, "Total chunks fetched and decoded");
    describe_counter!(METRIC_CHUNK_FAILURES, "Total chunks that failed permanently");
    describe_counter!(METRIC_CHUNK_BYTES, "Total payload bytes downloaded");
    describe_histogram!(METRIC_DOWNLOAD_DURATION, "Chunk download duration in seconds");
    describe_histogram!(METRIC_PARSE_DURATION, "Chunk decode duration in seconds");
    describe_histogram!(METRIC_CLIENT_TIME, "Client-side timing telemetry by field");
}

pub(crate) fn record_chunk_fetch(download: Duration, parse: Duration, bytes: u64) {
    counter!(METRIC_CHUNKS_FETCHED).increment(1);
    counter!(METRIC_CHUNK_BYTES).increment(bytes);
    histogram!(METRIC_DOWNLOAD_DURATION).record(download.as_secs_f64());
    histogram!(METRIC_PARSE_DURATION).record(parse.as_secs_f64());
}

pub(crate) fn record_chunk_failure() {
    counter!(METRIC_CHUNK_FAILURES).increment(1);
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn record_client_time(field: TelemetryField, value_ms: u64) {
    histogram!(METRIC_CLIENT_TIME, "field" => field.as_str()).record(value_ms as f64);
}
