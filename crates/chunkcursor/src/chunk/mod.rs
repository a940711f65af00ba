//! Chunk transport, decoding, memory accounting and background download.

pub mod budget;
pub mod decode;
pub mod downloader;
pub mod fetch;
pub mod retry;

pub use budget::MemoryBudget;
pub use decode::{ChunkDecoder, JsonRowDecoder, decoder_for};
pub use downloader::{ChunkDownloader, ChunkState, DownloadStatistics, ScheduleOutcome};
pub use fetch::{ChunkFetcher, ChunkHandle, FetchError, QueryResultDescriptor, QueryResultFormat};
pub use retry::{RetryDisposition, RetryError, RetryPolicy};
