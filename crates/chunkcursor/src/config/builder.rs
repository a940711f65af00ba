//! Configuration builder

use std::time::Duration;

use super::{BinaryOutputFormat, ClientConfig, DownloaderConfig, SessionPolicy};
use crate::chunk::retry::RetryPolicy;
use crate::error::{CursorError, Result};

/// Incrementally assembled [`ClientConfig`].
///
/// Every setter overrides the previous value, so later sources win.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    treat_decimal_as_int: Option<bool>,
    column_case_insensitive: Option<bool>,
    binary_output_format: Option<BinaryOutputFormat>,
    prefetch_lookahead: Option<usize>,
    max_concurrent_fetches: Option<usize>,
    memory_limit: Option<u64>,
    max_attempts: Option<usize>,
    base_delay: Option<Duration>,
    max_delay: Option<Duration>,
    telemetry_enabled: Option<bool>,
}

impl ConfigBuilder {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            treat_decimal_as_int: None,
            column_case_insensitive: None,
            binary_output_format: None,
            prefetch_lookahead: None,
            max_concurrent_fetches: None,
            memory_limit: None,
            max_attempts: None,
            base_delay: None,
            max_delay: None,
            telemetry_enabled: None,
        }
    }

    #[must_use]
    pub const fn treat_decimal_as_int(mut self, enabled: bool) -> Self {
        self.treat_decimal_as_int = Some(enabled);
        self
    }

    #[must_use]
    pub const fn column_case_insensitive(mut self, enabled: bool) -> Self {
        self.column_case_insensitive = Some(enabled);
        self
    }

    #[must_use]
    pub const fn binary_output_format(mut self, format: BinaryOutputFormat) -> Self {
        self.binary_output_format = Some(format);
        self
    }

    #[must_use]
    pub const fn prefetch_lookahead(mut self, lookahead: usize) -> Self {
        self.prefetch_lookahead = Some(lookahead);
        self
    }

    #[must_use]
    pub const fn max_concurrent_fetches(mut self, max: usize) -> Self {
        self.max_concurrent_fetches = Some(max);
        self
    }

    #[must_use]
    pub const fn memory_limit(mut self, bytes: u64) -> Self {
        self.memory_limit = Some(bytes);
        self
    }

    #[must_use]
    pub const fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    #[must_use]
    pub const fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = Some(delay);
        self
    }

    #[must_use]
    pub const fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    #[must_use]
    pub const fn telemetry_enabled(mut self, enabled: bool) -> Self {
        self.telemetry_enabled = Some(enabled);
        self
    }

    /// Validate and produce the final configuration.
    pub fn build(self) -> Result<ClientConfig> {
        if self.max_concurrent_fetches == Some(0) {
            return Err(CursorError::config(
                "max_concurrent_fetches must be greater than 0",
            ));
        }
        if self.memory_limit == Some(0) {
            return Err(CursorError::config("memory_limit must be greater than 0"));
        }
        if self.max_attempts == Some(0) {
            return Err(CursorError::config("max_attempts must be greater than 0"));
        }

        let session_defaults = SessionPolicy::default();
        let session = SessionPolicy {
            treat_decimal_as_int: self
                .treat_decimal_as_int
                .unwrap_or(session_defaults.treat_decimal_as_int),
            column_case_insensitive: self
                .column_case_insensitive
                .unwrap_or(session_defaults.column_case_insensitive),
            binary_output_format: self
                .binary_output_format
                .unwrap_or(session_defaults.binary_output_format),
        };

        let retry_defaults = RetryPolicy::default();
        let retry = RetryPolicy::new(
            self.max_attempts.unwrap_or(retry_defaults.max_attempts),
            self.base_delay.unwrap_or(retry_defaults.base_delay),
            self.max_delay.unwrap_or(retry_defaults.max_delay),
        );

        let downloader_defaults = DownloaderConfig::default();
        let downloader = DownloaderConfig {
            prefetch_lookahead: self
                .prefetch_lookahead
                .unwrap_or(downloader_defaults.prefetch_lookahead),
            max_concurrent_fetches: self
                .max_concurrent_fetches
                .unwrap_or(downloader_defaults.max_concurrent_fetches),
            memory_limit: self
                .memory_limit
                .unwrap_or(downloader_defaults.memory_limit),
            retry,
        };

        Ok(ClientConfig {
            session,
            downloader,
            telemetry_enabled: self.telemetry_enabled.unwrap_or(true),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_defaults() {
        let config = ConfigBuilder::new().build().unwrap();
        assert_eq!(config.session, SessionPolicy::default());
        assert_eq!(config.downloader.prefetch_lookahead, 2);
        assert!(config.telemetry_enabled);
    }

    #[test]
    fn test_later_setter_wins() {
        let config = ConfigBuilder::new()
            .column_case_insensitive(true)
            .column_case_insensitive(false)
            .binary_output_format(BinaryOutputFormat::Base64)
            .build()
            .unwrap();

        assert!(!config.session.column_case_insensitive);
        assert_eq!(
            config.session.binary_output_format,
            BinaryOutputFormat::Base64
        );
    }

    #[test]
    fn test_zero_limits_rejected() {
        let err = ConfigBuilder::new()
            .max_concurrent_fetches(0)
            .build()
            .unwrap_err();
        assert!(err.is_config());

        let err = ConfigBuilder::new().memory_limit(0).build().unwrap_err();
        assert!(err.to_string().contains("memory_limit"));

        assert!(ConfigBuilder::new().max_attempts(0).build().is_err());
    }

    #[test]
    fn test_retry_settings_flow_into_policy() {
        let config = ConfigBuilder::new()
            .max_attempts(2)
            .base_delay(Duration::from_millis(5))
            .max_delay(Duration::from_millis(20))
            .build()
            .unwrap();

        assert_eq!(config.downloader.retry.max_attempts, 2);
        assert_eq!(config.downloader.retry.base_delay, Duration::from_millis(5));
        assert_eq!(config.downloader.retry.max_delay, Duration::from_millis(20));
    }
}
