//! Environment variable loading for configuration

use std::env;
use std::str::FromStr;

use super::builder::ConfigBuilder;
use crate::error::{CursorError, Result};

/// Environment variable names
mod vars {
    pub const TREAT_DECIMAL_AS_INT: &str = "CHUNKCURSOR_TREAT_DECIMAL_AS_INT";
    pub const COLUMN_CASE_INSENSITIVE: &str = "CHUNKCURSOR_COLUMN_CASE_INSENSITIVE";
    pub const BINARY_OUTPUT_FORMAT: &str = "CHUNKCURSOR_BINARY_OUTPUT_FORMAT";
    pub const PREFETCH_LOOKAHEAD: &str = "CHUNKCURSOR_PREFETCH_LOOKAHEAD";
    pub const MAX_CONCURRENT_FETCHES: &str = "CHUNKCURSOR_MAX_CONCURRENT_FETCHES";
    pub const MEMORY_LIMIT: &str = "CHUNKCURSOR_MEMORY_LIMIT";
    pub const MAX_RETRIES: &str = "CHUNKCURSOR_MAX_RETRIES";
    pub const TELEMETRY_ENABLED: &str = "CHUNKCURSOR_TELEMETRY_ENABLED";
}

/// Load configuration overrides from environment variables
pub fn load_from_env(mut builder: ConfigBuilder) -> Result<ConfigBuilder> {
    if let Ok(val) = env::var(vars::TREAT_DECIMAL_AS_INT) {
        builder = builder.treat_decimal_as_int(parse_bool(&val));
    }

    if let Ok(val) = env::var(vars::COLUMN_CASE_INSENSITIVE) {
        builder = builder.column_case_insensitive(parse_bool(&val));
    }

    if let Ok(val) = env::var(vars::BINARY_OUTPUT_FORMAT) {
        builder = builder.binary_output_format(val.parse()?);
    }

    if let Ok(val) = env::var(vars::PREFETCH_LOOKAHEAD) {
        builder = builder.prefetch_lookahead(parse_number(vars::PREFETCH_LOOKAHEAD, &val)?);
    }

    if let Ok(val) = env::var(vars::MAX_CONCURRENT_FETCHES) {
        builder =
            builder.max_concurrent_fetches(parse_number(vars::MAX_CONCURRENT_FETCHES, &val)?);
    }

    if let Ok(val) = env::var(vars::MEMORY_LIMIT) {
        builder = builder.memory_limit(parse_number(vars::MEMORY_LIMIT, &val)?);
    }

    if let Ok(val) = env::var(vars::MAX_RETRIES) {
        builder = builder.max_attempts(parse_number(vars::MAX_RETRIES, &val)?);
    }

    if let Ok(val) = env::var(vars::TELEMETRY_ENABLED) {
        builder = builder.telemetry_enabled(parse_bool(&val));
    }

    Ok(builder)
}

fn parse_bool(s: &str) -> bool {
    matches!(s.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

fn parse_number<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CursorError::config(format!("Invalid {name}: {value}")))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::config::BinaryOutputFormat;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn with_env_vars<F, R>(vars: &[(&str, &str)], f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = ENV_MUTEX.lock().unwrap();

        let old_values: Vec<_> = vars.iter().map(|(k, _)| (*k, env::var(k).ok())).collect();

        for (key, value) in vars {
            // SAFETY: We hold a mutex lock to ensure no concurrent modifications
            unsafe { env::set_var(key, value) };
        }

        let result = f();

        for (key, old_value) in old_values {
            match old_value {
                // SAFETY: We hold a mutex lock to ensure no concurrent modifications
                Some(v) => unsafe { env::set_var(key, v) },
                None => unsafe { env::remove_var(key) },
            }
        }

        result
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(parse_bool("TRUE"));
        assert!(parse_bool("1"));
        assert!(parse_bool("on"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool(""));
    }

    #[test]
    fn test_load_session_switches() {
        with_env_vars(
            &[
                (vars::TREAT_DECIMAL_AS_INT, "false"),
                (vars::COLUMN_CASE_INSENSITIVE, "yes"),
                (vars::BINARY_OUTPUT_FORMAT, "BAse64"),
            ],
            || {
                let config = load_from_env(ConfigBuilder::new())
                    .unwrap()
                    .build()
                    .unwrap();
                assert!(!config.session.treat_decimal_as_int);
                assert!(config.session.column_case_insensitive);
                assert_eq!(
                    config.session.binary_output_format,
                    BinaryOutputFormat::Base64
                );
            },
        );
    }

    #[test]
    fn test_load_downloader_settings() {
        with_env_vars(
            &[
                (vars::PREFETCH_LOOKAHEAD, "5"),
                (vars::MAX_CONCURRENT_FETCHES, "2"),
                (vars::MEMORY_LIMIT, "4096"),
                (vars::MAX_RETRIES, "7"),
            ],
            || {
                let config = load_from_env(ConfigBuilder::new())
                    .unwrap()
                    .build()
                    .unwrap();
                assert_eq!(config.downloader.prefetch_lookahead, 5);
                assert_eq!(config.downloader.max_concurrent_fetches, 2);
                assert_eq!(config.downloader.memory_limit, 4096);
                assert_eq!(config.downloader.retry.max_attempts, 7);
            },
        );
    }

    #[test]
    fn test_env_overrides_earlier_sources() {
        with_env_vars(&[(vars::TELEMETRY_ENABLED, "0")], || {
            let builder = ConfigBuilder::new().telemetry_enabled(true);
            let config = load_from_env(builder).unwrap().build().unwrap();
            assert!(!config.telemetry_enabled);
        });
    }

    #[test]
    fn test_invalid_number_is_config_error() {
        with_env_vars(&[(vars::MEMORY_LIMIT, "lots")], || {
            let err = load_from_env(ConfigBuilder::new()).unwrap_err();
            assert!(err.is_config());
            assert!(err.to_string().contains(vars::MEMORY_LIMIT));
        });
    }
}
