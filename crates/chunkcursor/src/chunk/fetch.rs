//! Query result descriptors and the chunk transport seam.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::metadata::ColumnSchema;

/// Failure reported by a [`ChunkFetcher`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Worth retrying: timeouts, throttling, dropped connections.
    #[error("transient fetch failure: {0}")]
    Transient(String),
    /// Retrying cannot help: missing object, expired locator, bad credentials.
    #[error("permanent fetch failure: {0}")]
    Permanent(String),
}

impl FetchError {
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Opaque locator of one chunk plus the sizes the server declared for it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkHandle {
    pub url: String,
    pub row_count: u64,
    pub uncompressed_size: u64,
    #[serde(default)]
    pub compressed_size: Option<u64>,
}

impl ChunkHandle {
    #[must_use]
    pub fn new(url: impl Into<String>, row_count: u64, uncompressed_size: u64) -> Self {
        Self {
            url: url.into(),
            row_count,
            uncompressed_size,
            compressed_size: None,
        }
    }
}

/// Payload layout of every chunk of one result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryResultFormat {
    /// Comma-separated JSON arrays, one per row.
    #[default]
    Json,
    /// Arrow IPC stream.
    Arrow,
}

/// What the query service returns for an executed statement.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResultDescriptor {
    pub query_id: String,
    #[serde(default)]
    pub format: QueryResultFormat,
    pub columns: Vec<ColumnSchema>,
    #[serde(default)]
    pub chunks: Vec<ChunkHandle>,
    #[serde(default)]
    pub total_rows: Option<u64>,
}

/// Transport for chunk payloads.
///
/// Implementations classify their own failures; transient ones are retried
/// by the downloader's retry policy.
#[async_trait]
pub trait ChunkFetcher: Send + Sync {
    async fn fetch(&self, handle: &ChunkHandle) -> Result<Vec<u8>, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LogicalType;

    #[test]
    fn test_descriptor_deserialize() {
        let json = r#"{
            "queryId": "01a2-b3",
            "format": "arrow",
            "columns": [
                {"name": "C1", "type": "fixed", "precision": 38, "scale": 0, "nullable": true}
            ],
            "chunks": [
                {"url": "s3://bucket/0", "rowCount": 10, "uncompressedSize": 512}
            ],
            "totalRows": 10
        }"#;

        let descriptor: QueryResultDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(descriptor.query_id, "01a2-b3");
        assert_eq!(descriptor.format, QueryResultFormat::Arrow);
        assert_eq!(descriptor.columns[0].logical_type, LogicalType::Fixed);
        assert_eq!(descriptor.chunks[0].row_count, 10);
        assert_eq!(descriptor.chunks[0].compressed_size, None);
        assert_eq!(descriptor.total_rows, Some(10));
    }

    #[test]
    fn test_descriptor_defaults() {
        let json = r#"{"queryId": "q", "columns": []}"#;
        let descriptor: QueryResultDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(descriptor.format, QueryResultFormat::Json);
        assert!(descriptor.chunks.is_empty());
        assert!(descriptor.total_rows.is_none());
    }

    #[test]
    fn test_fetch_error_classification() {
        assert!(FetchError::Transient("503".into()).is_transient());
        assert!(!FetchError::Permanent("404".into()).is_transient());
    }
}
