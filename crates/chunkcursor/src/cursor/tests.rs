use std::sync::Arc;
use std::time::Duration;

use bigdecimal::BigDecimal;
use tokio_test::{assert_err, assert_ok};

use super::*;
use crate::chunk::{JsonRowDecoder, RetryPolicy};
use crate::config::{DownloaderConfig, SessionPolicy};
use crate::metadata::ColumnSchema;
use crate::telemetry::TelemetryEvent;
use crate::testing::{InMemoryFetcher, json_rows};
use crate::types::LogicalType;

fn schema() -> Vec<ColumnSchema> {
    vec![
        ColumnSchema::new("ID", LogicalType::Fixed).with_precision(38, 0),
        ColumnSchema::new("Name", LogicalType::Text).with_length(64),
        ColumnSchema::new("Amount", LogicalType::Fixed).with_precision(10, 2),
    ]
}

fn chunk(rows: &[(i64, Option<&str>)]) -> String {
    let rows: Vec<Vec<Option<String>>> = rows
        .iter()
        .map(|(id, name)| {
            vec![
                Some(id.to_string()),
                name.map(str::to_owned),
                Some(format!("{id}.50")),
            ]
        })
        .collect();
    let borrowed: Vec<Vec<Option<&str>>> = rows
        .iter()
        .map(|row| row.iter().map(Option::as_deref).collect())
        .collect();
    json_rows(&borrowed)
}

struct Harness {
    cursor: ResultCursor,
    budget: MemoryBudget,
    telemetry: Arc<TelemetryRecorder>,
}

fn open_with(fetcher: InMemoryFetcher, config: &ClientConfig, total_rows: Option<u64>) -> Harness {
    let mut descriptor = fetcher.descriptor("01a2-query", schema());
    descriptor.total_rows = total_rows;
    let budget = MemoryBudget::new(config.downloader.memory_limit);
    let telemetry = Arc::new(TelemetryRecorder::default());
    let cursor = ResultCursor::open(
        descriptor,
        Arc::new(fetcher),
        Arc::new(JsonRowDecoder),
        budget.clone(),
        config,
        Arc::clone(&telemetry),
    )
    .unwrap();
    Harness {
        cursor,
        budget,
        telemetry,
    }
}

fn open(payloads: Vec<String>) -> Harness {
    open_with(
        InMemoryFetcher::from_payloads(payloads),
        &ClientConfig::default(),
        None,
    )
}

fn fields(events: &[TelemetryEvent]) -> Vec<TelemetryField> {
    events.iter().map(|e| e.field).collect()
}

#[tokio::test]
async fn test_single_chunk_positions() {
    let mut h = open(vec![chunk(&[(1, Some("a")), (2, Some("b")), (3, Some("c"))])]);
    let cursor = &mut h.cursor;

    assert!(cursor.is_before_first());
    assert_eq!(cursor.current_row_number(), 0);

    assert!(cursor.advance().await.unwrap());
    assert!(cursor.is_first());
    assert!(!cursor.is_last());
    assert_eq!(cursor.get_i32(1).unwrap(), 1);

    assert!(cursor.advance().await.unwrap());
    assert!(!cursor.is_last());

    assert!(cursor.advance().await.unwrap());
    assert!(cursor.is_last());
    assert_eq!(cursor.current_row_number(), 3);

    assert!(!cursor.advance().await.unwrap());
    assert!(cursor.is_after_last());
    assert!(!cursor.is_last());
    assert_eq!(cursor.current_row_number(), 0);
}

#[tokio::test]
async fn test_rows_cross_chunks_and_skip_empty_ones() {
    let mut h = open(vec![
        chunk(&[(1, Some("a")), (2, None)]),
        String::new(),
        chunk(&[(3, Some("c"))]),
        String::new(),
    ]);

    let mut ids = Vec::new();
    while h.cursor.advance().await.unwrap() {
        ids.push(h.cursor.get_i64("ID").unwrap());
    }
    assert_eq!(ids, vec![1, 2, 3]);
    assert!(h.cursor.is_after_last());
    assert_eq!(h.budget.current_usage(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rows_keep_chunk_order_when_later_chunks_finish_first() {
    let fetcher = InMemoryFetcher::from_payloads(vec![
        chunk(&[(1, Some("a")), (2, Some("b"))]),
        chunk(&[(3, Some("c"))]),
        chunk(&[(4, Some("d"))]),
    ])
    .with_chunk_delay(0, Duration::from_millis(200));
    let counts = fetcher.clone();
    let config = ClientConfig {
        downloader: DownloaderConfig::default()
            .prefetch_lookahead(3)
            .max_concurrent_fetches(4),
        ..ClientConfig::default()
    };
    let mut h = open_with(fetcher, &config, None);

    assert!(h.cursor.advance().await.unwrap());
    assert_eq!(counts.fetch_count(1), 1);
    assert_eq!(counts.fetch_count(2), 1);

    let mut ids = vec![h.cursor.get_i64("ID").unwrap()];
    while h.cursor.advance().await.unwrap() {
        ids.push(h.cursor.get_i64("ID").unwrap());
    }
    assert_eq!(ids, vec![1, 2, 3, 4]);

    h.cursor.close();
    assert_eq!(h.budget.current_usage(), 0);
}

#[tokio::test]
async fn test_is_last_uses_known_total() {
    let fetcher = InMemoryFetcher::from_payloads(vec![
        chunk(&[(1, Some("a"))]),
        chunk(&[(2, Some("b"))]),
        String::new(),
    ]);
    let mut h = open_with(fetcher, &ClientConfig::default(), Some(2));

    assert!(h.cursor.advance().await.unwrap());
    assert!(!h.cursor.is_last());
    assert!(h.cursor.advance().await.unwrap());
    assert!(h.cursor.is_last());
}

#[tokio::test]
async fn test_is_last_stays_false_before_trailing_empty_chunk() {
    let mut h = open(vec![chunk(&[(1, Some("a"))]), String::new()]);

    assert!(h.cursor.advance().await.unwrap());
    assert!(!h.cursor.is_last());
    assert!(!h.cursor.advance().await.unwrap());
    assert!(h.cursor.is_after_last());
}

#[tokio::test]
async fn test_empty_result() {
    let mut h = open(Vec::new());
    assert!(!h.cursor.advance().await.unwrap());
    assert!(h.cursor.is_after_last());
    assert!(!h.cursor.is_first());
}

#[tokio::test]
async fn test_advance_after_end_and_close_is_idempotent() {
    let mut h = open(vec![chunk(&[(1, Some("a"))])]);

    assert!(assert_ok!(h.cursor.advance().await));
    assert!(!assert_ok!(h.cursor.advance().await));
    assert!(!assert_ok!(h.cursor.advance().await));

    h.cursor.close();
    h.cursor.close();
    assert!(h.cursor.is_closed());
    assert!(!assert_ok!(h.cursor.advance().await));
}

#[tokio::test]
async fn test_access_errors_by_state() {
    let mut h = open(vec![chunk(&[(1, Some("a"))])]);

    let err = assert_err!(h.cursor.get_string(1));
    assert!(err.is_no_current_row());

    h.cursor.advance().await.unwrap();
    let err = assert_err!(h.cursor.get_string(4));
    assert!(err.is_index_out_of_bounds());
    let err = assert_err!(h.cursor.get_string(0));
    assert!(err.is_index_out_of_bounds());
    let err = assert_err!(h.cursor.get_string("missing"));
    assert!(err.is_column_not_found());

    h.cursor.advance().await.unwrap();
    let err = assert_err!(h.cursor.get_string(1));
    assert!(err.is_no_current_row());

    h.cursor.close();
    let err = assert_err!(h.cursor.get_string(1));
    assert!(err.is_closed());
    let err = assert_err!(h.cursor.find_column("ID"));
    assert!(err.is_closed());
}

#[tokio::test]
async fn test_was_null_tracks_last_read() {
    let mut h = open(vec![chunk(&[(7, None)])]);
    let cursor = &mut h.cursor;
    cursor.advance().await.unwrap();

    assert_eq!(cursor.get_string(2).unwrap(), None);
    assert!(cursor.was_null());
    assert_eq!(cursor.get_i32(1).unwrap(), 7);
    assert!(!cursor.was_null());

    assert_eq!(cursor.get_i8(2).unwrap(), 0);
    assert!(cursor.was_null());
    assert_eq!(cursor.get_i16(2).unwrap(), 0);
    assert_eq!(cursor.get_i64(2).unwrap(), 0);
    assert!(cursor.get_f32(2).unwrap().abs() < f32::EPSILON);
    assert!(cursor.get_f64(2).unwrap().abs() < f64::EPSILON);
    assert!(!cursor.get_bool(2).unwrap());
    assert!(cursor.get_decimal(2).unwrap().is_none());
    assert!(cursor.get_bytes(2).unwrap().is_none());
    assert!(cursor.get_date(2).unwrap().is_none());
    assert!(cursor.get_time(2).unwrap().is_none());
    assert!(cursor.get_timestamp(2).unwrap().is_none());
    assert!(cursor.get_object(2).unwrap().is_none());
    assert!(cursor.get_large_text(2).unwrap().is_none());
    assert!(cursor.get_character_stream(2).unwrap().is_none());
    assert!(cursor.was_null());

    assert!(assert_err!(cursor.get_date(1)).is_decode());
    assert!(cursor.was_null());
    assert_eq!(cursor.get_i64(1).unwrap(), 7);
    assert!(assert_err!(cursor.get_date(1)).is_decode());
    assert!(!cursor.was_null());
}

#[tokio::test]
async fn test_typed_access_by_label() {
    let mut h = open(vec![chunk(&[(42, Some("hello world"))])]);
    let cursor = &mut h.cursor;
    cursor.advance().await.unwrap();

    assert_eq!(
        cursor.get_decimal("Amount").unwrap(),
        Some("42.50".parse::<BigDecimal>().unwrap())
    );
    assert_eq!(cursor.get_string("Amount").unwrap().as_deref(), Some("42.50"));
    assert_eq!(cursor.get_object("ID").unwrap(), Some(SqlValue::BigInt(42)));

    let text = cursor.get_large_text("Name").unwrap().unwrap();
    assert_eq!(text.length(), 11);
    let mut stream = cursor.get_character_stream("Name").unwrap().unwrap();
    assert_eq!(stream.read_to_string(), "hello world");

    assert_eq!(cursor.find_column("Name").unwrap(), 2);
    assert!(cursor.memo_stats().hits > 0);
}

#[tokio::test]
async fn test_case_insensitive_labels() {
    let config = ClientConfig {
        session: SessionPolicy::default().column_case_insensitive(true),
        ..ClientConfig::default()
    };
    let fetcher = InMemoryFetcher::from_payloads(vec![chunk(&[(5, Some("x"))])]);
    let mut h = open_with(fetcher, &config, None);
    h.cursor.advance().await.unwrap();

    assert_eq!(h.cursor.get_i32("id").unwrap(), 5);
    assert_eq!(h.cursor.get_string("NAME").unwrap().as_deref(), Some("x"));
}

#[tokio::test]
async fn test_close_returns_budget_to_baseline() {
    let fetcher = InMemoryFetcher::from_payloads(
        (0..6).map(|c| chunk(&[(c, Some("row")), (c + 100, Some("row"))])),
    );
    let mut h = open_with(fetcher, &ClientConfig::default(), None);

    h.cursor.advance().await.unwrap();
    assert!(h.budget.current_usage() > 0);

    h.cursor.close();
    assert_eq!(h.budget.current_usage(), 0);
}

#[tokio::test]
async fn test_drop_returns_budget_to_baseline() {
    let fetcher = InMemoryFetcher::from_payloads((0..4).map(|c| chunk(&[(c, Some("r"))])));
    let h = open_with(fetcher, &ClientConfig::default(), None);
    let budget = h.budget.clone();
    let Harness { mut cursor, .. } = h;

    cursor.advance().await.unwrap();
    drop(cursor);
    assert_eq!(budget.current_usage(), 0);
}

#[tokio::test]
async fn test_failed_chunk_error_repeats() {
    let fetcher = InMemoryFetcher::from_payloads(vec![
        chunk(&[(1, Some("a"))]),
        chunk(&[(2, Some("b"))]),
    ])
    .fail_permanent(1);
    let config = ClientConfig {
        downloader: DownloaderConfig::default().retry(RetryPolicy::no_retry()),
        ..ClientConfig::default()
    };
    let mut h = open_with(fetcher, &config, None);

    assert!(h.cursor.advance().await.unwrap());
    let first = assert_err!(h.cursor.advance().await);
    assert!(first.is_fetch());
    assert_eq!(first.chunk_index(), Some(1));

    let second = assert_err!(h.cursor.advance().await);
    assert_eq!(first.to_string(), second.to_string());
    assert!(!h.cursor.is_after_last());
    assert_eq!(h.cursor.current_row_number(), 0);
    assert!(assert_err!(h.cursor.get_string(1)).is_fetch());

    h.cursor.close();
    assert_eq!(h.budget.current_usage(), 0);
}

#[tokio::test]
async fn test_transient_failures_are_invisible_to_consumer() {
    let fetcher = InMemoryFetcher::from_payloads(vec![chunk(&[(1, Some("a"))])])
        .fail_transient(0, 2);
    let config = ClientConfig {
        downloader: DownloaderConfig::default().retry(RetryPolicy::new(
            3,
            Duration::from_millis(1),
            Duration::from_millis(1),
        )),
        ..ClientConfig::default()
    };
    let mut h = open_with(fetcher, &config, None);

    assert!(h.cursor.advance().await.unwrap());
    assert_eq!(h.cursor.get_i32(1).unwrap(), 1);
    assert_eq!(h.cursor.download_statistics().retries, 2);
}

#[tokio::test]
async fn test_telemetry_after_full_consumption() {
    let mut h = open(vec![chunk(&[(1, Some("a"))]), chunk(&[(2, Some("b"))])]);
    while h.cursor.advance().await.unwrap() {}
    h.cursor.close();

    let recorded = fields(&h.telemetry.log_buffer());
    assert_eq!(
        recorded,
        vec![
            TelemetryField::ClientTimeConsumeFirstResult,
            TelemetryField::ClientTimeConsumeLastResult,
            TelemetryField::ClientTimeWaitingForChunks,
            TelemetryField::ClientTimeDownloadingChunks,
            TelemetryField::ClientTimeParsingChunks,
        ]
    );
    assert!(
        h.telemetry
            .log_buffer()
            .iter()
            .all(|e| e.query_id == "01a2-query")
    );
}

#[tokio::test]
async fn test_telemetry_on_early_close() {
    let mut h = open(vec![chunk(&[(1, Some("a")), (2, Some("b"))])]);
    h.cursor.advance().await.unwrap();
    h.cursor.close();
    h.cursor.close();

    let recorded = fields(&h.telemetry.log_buffer());
    assert_eq!(
        recorded,
        vec![
            TelemetryField::ClientTimeConsumeFirstResult,
            TelemetryField::ClientTimeWaitingForChunks,
            TelemetryField::ClientTimeDownloadingChunks,
            TelemetryField::ClientTimeParsingChunks,
        ]
    );
}

#[tokio::test]
async fn test_disabled_telemetry_records_nothing() {
    let fetcher = InMemoryFetcher::from_payloads(vec![chunk(&[(1, Some("a"))])]);
    let descriptor = fetcher.descriptor("q", schema());
    let telemetry = Arc::new(TelemetryRecorder::disabled());
    let mut cursor = ResultCursor::open(
        descriptor,
        Arc::new(fetcher),
        Arc::new(JsonRowDecoder),
        MemoryBudget::new(u64::MAX),
        &ClientConfig::default(),
        Arc::clone(&telemetry),
    )
    .unwrap();

    while cursor.advance().await.unwrap() {}
    cursor.close();
    assert_eq!(telemetry.pending(), 0);
}

#[tokio::test]
async fn test_metadata_exposed() {
    let h = open(vec![chunk(&[(1, Some("a"))])]);
    let metadata = h.cursor.metadata();
    assert_eq!(h.cursor.query_id(), "01a2-query");
    assert_eq!(metadata.column_count(), 3);
    assert_eq!(metadata.column_label(2).unwrap(), "Name");
    assert_eq!(metadata.scale(3).unwrap(), 2);
}

#[test]
fn test_open_requires_runtime() {
    let fetcher = InMemoryFetcher::from_payloads(vec![chunk(&[(1, Some("a"))])]);
    let descriptor = fetcher.descriptor("q", schema());
    let err = ResultCursor::open(
        descriptor,
        Arc::new(fetcher),
        Arc::new(JsonRowDecoder),
        MemoryBudget::new(u64::MAX),
        &ClientConfig::default(),
        Arc::new(TelemetryRecorder::disabled()),
    )
    .unwrap_err();
    assert!(err.is_runtime());
}
