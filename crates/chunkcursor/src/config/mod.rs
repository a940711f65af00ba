//! Client configuration: session policy switches and downloader tuning.
//!
//! Sources are applied in order: defaults, TOML file, environment variables.
//!
//! ```rust,ignore
//! use chunkcursor::config::{ConfigBuilder, env, file};
//!
//! let mut builder = ConfigBuilder::new();
//! if let Some(path) = file::find_config_file() {
//!     builder = file::load_from_file(&path, builder)?;
//! }
//! let config = env::load_from_env(builder)?.build()?;
//! ```

mod builder;
pub mod env;
pub mod file;

use std::fmt;
use std::str::FromStr;

pub use builder::ConfigBuilder;

use crate::chunk::retry::RetryPolicy;
use crate::error::CursorError;

/// Default memory budget for chunk payloads (1536 MiB).
pub const DEFAULT_MEMORY_LIMIT: u64 = 1536 * 1024 * 1024;

/// Default number of chunks prefetched ahead of the one being consumed.
pub const DEFAULT_PREFETCH_LOOKAHEAD: usize = 2;

/// Default number of concurrently running chunk fetches.
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 4;

/// How binary cells are rendered when read as strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BinaryOutputFormat {
    /// Uppercase hexadecimal without separators.
    #[default]
    Hex,
    /// Standard base64 with padding.
    Base64,
}

impl FromStr for BinaryOutputFormat {
    type Err = CursorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hex" => Ok(Self::Hex),
            "base64" => Ok(Self::Base64),
            other => Err(CursorError::config(format!(
                "unknown binary output format: {other}"
            ))),
        }
    }
}

impl fmt::Display for BinaryOutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hex => f.write_str("HEX"),
            Self::Base64 => f.write_str("BASE64"),
        }
    }
}

/// Session-wide switches snapshotted when a result is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPolicy {
    /// Present exact numerics with scale 0 as integers instead of decimals.
    pub treat_decimal_as_int: bool,
    /// Resolve column labels ignoring case.
    pub column_case_insensitive: bool,
    /// Rendering of binary cells read as strings.
    pub binary_output_format: BinaryOutputFormat,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            treat_decimal_as_int: true,
            column_case_insensitive: false,
            binary_output_format: BinaryOutputFormat::Hex,
        }
    }
}

impl SessionPolicy {
    /// Enable or disable integer presentation of zero-scale exact numerics.
    #[must_use]
    pub const fn treat_decimal_as_int(mut self, enabled: bool) -> Self {
        self.treat_decimal_as_int = enabled;
        self
    }

    /// Enable or disable case-insensitive column label lookup.
    #[must_use]
    pub const fn column_case_insensitive(mut self, enabled: bool) -> Self {
        self.column_case_insensitive = enabled;
        self
    }

    /// Set the binary output format.
    #[must_use]
    pub const fn binary_output_format(mut self, format: BinaryOutputFormat) -> Self {
        self.binary_output_format = format;
        self
    }
}

/// Tuning for the background chunk downloader.
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    /// Number of chunks scheduled ahead of the one being consumed.
    pub prefetch_lookahead: usize,
    /// Upper bound on concurrently running fetch tasks.
    pub max_concurrent_fetches: usize,
    /// Byte limit for a budget created from this configuration.
    pub memory_limit: u64,
    /// Retry policy for transient fetch failures.
    pub retry: RetryPolicy,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            prefetch_lookahead: DEFAULT_PREFETCH_LOOKAHEAD,
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            memory_limit: DEFAULT_MEMORY_LIMIT,
            retry: RetryPolicy::default(),
        }
    }
}

impl DownloaderConfig {
    /// Set the prefetch lookahead.
    #[must_use]
    pub const fn prefetch_lookahead(mut self, lookahead: usize) -> Self {
        self.prefetch_lookahead = lookahead;
        self
    }

    /// Set the concurrent fetch limit (at least one).
    #[must_use]
    pub fn max_concurrent_fetches(mut self, max: usize) -> Self {
        self.max_concurrent_fetches = max.max(1);
        self
    }

    /// Set the memory limit.
    #[must_use]
    pub const fn memory_limit(mut self, bytes: u64) -> Self {
        self.memory_limit = bytes;
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Complete client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub session: SessionPolicy,
    pub downloader: DownloaderConfig,
    pub telemetry_enabled: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            session: SessionPolicy::default(),
            downloader: DownloaderConfig::default(),
            telemetry_enabled: true,
        }
    }
}

impl ClientConfig {
    #[must_use]
    pub const fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}
