//! TOML configuration file loading

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use super::builder::ConfigBuilder;
use crate::error::{CursorError, Result};

/// Configuration file locations checked in order
const CONFIG_PATHS: &[&str] = &[
    "./chunkcursor.toml",
    "~/.config/chunkcursor/config.toml",
    "/etc/chunkcursor/config.toml",
];

/// Find the first existing configuration file
pub fn find_config_file() -> Option<PathBuf> {
    for path_str in CONFIG_PATHS {
        let path = if path_str.starts_with('~') {
            if let Ok(home) = std::env::var("HOME") {
                PathBuf::from(path_str.replacen('~', &home, 1))
            } else {
                continue;
            }
        } else {
            PathBuf::from(path_str)
        };

        if path.exists() {
            return Some(path);
        }
    }
    None
}

/// Load configuration from a TOML file
pub fn load_from_file(path: &Path, builder: ConfigBuilder) -> Result<ConfigBuilder> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        CursorError::config(format!(
            "Failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;

    load_from_str(&content, builder).map_err(|e| {
        CursorError::config(format!("Failed to parse config file {}: {e}", path.display()))
    })
}

/// Apply TOML text to a builder
pub fn load_from_str(content: &str, builder: ConfigBuilder) -> Result<ConfigBuilder> {
    let file_config: FileConfig =
        toml::from_str(content).map_err(|e| CursorError::config(e.to_string()))?;
    apply_file_config(builder, file_config)
}

fn apply_file_config(mut builder: ConfigBuilder, config: FileConfig) -> Result<ConfigBuilder> {
    if let Some(session) = config.session {
        if let Some(enabled) = session.treat_decimal_as_int {
            builder = builder.treat_decimal_as_int(enabled);
        }

        if let Some(enabled) = session.column_case_insensitive {
            builder = builder.column_case_insensitive(enabled);
        }

        if let Some(format) = session.binary_output_format {
            builder = builder.binary_output_format(format.parse()?);
        }
    }

    if let Some(downloader) = config.downloader {
        if let Some(lookahead) = downloader.prefetch_lookahead {
            builder = builder.prefetch_lookahead(lookahead);
        }

        if let Some(max) = downloader.max_concurrent_fetches {
            builder = builder.max_concurrent_fetches(max);
        }

        if let Some(limit) = downloader.memory_limit {
            builder = builder.memory_limit(limit);
        }

        if let Some(retry) = downloader.retry {
            if let Some(attempts) = retry.max_attempts {
                builder = builder.max_attempts(attempts);
            }

            if let Some(ms) = retry.base_delay_ms {
                builder = builder.base_delay(Duration::from_millis(ms));
            }

            if let Some(ms) = retry.max_delay_ms {
                builder = builder.max_delay(Duration::from_millis(ms));
            }
        }
    }

    if let Some(telemetry) = config.telemetry
        && let Some(enabled) = telemetry.enabled
    {
        builder = builder.telemetry_enabled(enabled);
    }

    Ok(builder)
}

/// Root configuration file structure
#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    session: Option<SessionFileConfig>,
    downloader: Option<DownloaderFileConfig>,
    telemetry: Option<TelemetryFileConfig>,
}

#[derive(Debug, Deserialize)]
struct SessionFileConfig {
    treat_decimal_as_int: Option<bool>,
    column_case_insensitive: Option<bool>,
    binary_output_format: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DownloaderFileConfig {
    prefetch_lookahead: Option<usize>,
    max_concurrent_fetches: Option<usize>,
    memory_limit: Option<u64>,
    retry: Option<RetryFileConfig>,
}

#[derive(Debug, Deserialize)]
struct RetryFileConfig {
    max_attempts: Option<usize>,
    base_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TelemetryFileConfig {
    enabled: Option<bool>,
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::config::BinaryOutputFormat;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[session]
treat_decimal_as_int = false
column_case_insensitive = true
binary_output_format = "base64"

[downloader]
prefetch_lookahead = 3
max_concurrent_fetches = 8
memory_limit = 1048576

[downloader.retry]
max_attempts = 2
base_delay_ms = 10
max_delay_ms = 50

[telemetry]
enabled = false
"#;

        let config: FileConfig = toml::from_str(toml_content).unwrap();
        assert!(config.session.is_some());
        assert!(config.downloader.is_some());
        assert!(config.telemetry.is_some());

        let built = load_from_str(toml_content, ConfigBuilder::new())
            .unwrap()
            .build()
            .unwrap();
        assert!(!built.session.treat_decimal_as_int);
        assert!(built.session.column_case_insensitive);
        assert_eq!(
            built.session.binary_output_format,
            BinaryOutputFormat::Base64
        );
        assert_eq!(built.downloader.prefetch_lookahead, 3);
        assert_eq!(built.downloader.max_concurrent_fetches, 8);
        assert_eq!(built.downloader.memory_limit, 1_048_576);
        assert_eq!(built.downloader.retry.max_attempts, 2);
        assert_eq!(
            built.downloader.retry.max_delay,
            Duration::from_millis(50)
        );
        assert!(!built.telemetry_enabled);
    }

    #[test]
    fn test_parse_minimal_config() {
        let toml_content = r"
[session]
column_case_insensitive = true
";

        let config: FileConfig = toml::from_str(toml_content).unwrap();
        assert!(config.session.is_some());
        assert!(config.downloader.is_none());
        assert!(config.telemetry.is_none());
    }

    #[test]
    fn test_load_from_file_success() {
        let temp_file = create_temp_config(
            r"
[downloader]
prefetch_lookahead = 1
",
        );

        let config = load_from_file(temp_file.path(), ConfigBuilder::new())
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(config.downloader.prefetch_lookahead, 1);
        assert!(config.session.treat_decimal_as_int);
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(
            Path::new("/nonexistent/path/chunkcursor.toml"),
            ConfigBuilder::new(),
        );
        let err = result.unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_load_from_file_invalid_toml() {
        let temp_file = create_temp_config("this is not valid toml {{{{");

        let err = load_from_file(temp_file.path(), ConfigBuilder::new()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_invalid_binary_format_rejected() {
        let result = load_from_str(
            r#"
[session]
binary_output_format = "octal"
"#,
            ConfigBuilder::new(),
        );
        assert!(result.is_err());
    }
}
