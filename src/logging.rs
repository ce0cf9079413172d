//! Structured logging setup
//!
//! Provides JSON-formatted and human-readable logging with optional file
//! output in addition to STDOUT. `RUST_LOG` takes precedence over the
//! configured level.

use crate::config::LoggingConfig;
use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging based on configuration.
///
/// # Arguments
///
/// * `config` - Logging configuration
///
/// # Errors
///
/// Returns error if the level is not a valid filter, the log file cannot be
/// opened, or a global subscriber is already installed
///
/// # Examples
///
/// ```no_run
/// use kafkasub::config::LoggingConfig;
/// use kafkasub::logging::init_logging;
///
/// let config = LoggingConfig {
///     level: "debug".to_string(),
///     json_format: true,
///     file_path: None,
///     include_payload: false,
/// };
///
/// init_logging(&config).unwrap();
/// ```
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let registry = tracing_subscriber::registry().with(build_filter(&config.level)?);
    let file = config.file_path.as_deref().map(open_log_file).transpose()?;

    let installed = if config.json_format {
        let stdout_layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true);
        let file_layer = file.map(|file| {
            fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_writer(Arc::new(file))
        });
        registry.with(stdout_layer).with(file_layer).try_init()
    } else {
        let stdout_layer = fmt::layer().with_target(true).with_level(true);
        let file_layer = file.map(|file| {
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_ansi(false)
                .with_writer(Arc::new(file))
        });
        registry.with(stdout_layer).with(file_layer).try_init()
    };

    installed.context("Failed to install tracing subscriber")
}

/// Builds the event filter, preferring `RUST_LOG` when it is set.
pub fn build_filter(level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level)
            .with_context(|| format!("Invalid log level '{}'", level)),
    }
}

fn open_log_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_build_filter_accepts_levels() {
        std::env::remove_var("RUST_LOG");
        for level in ["trace", "debug", "info", "warn", "error", "kafkasub=debug,rdkafka=warn"] {
            assert!(build_filter(level).is_ok(), "level {:?} rejected", level);
        }
    }

    #[test]
    #[serial]
    fn test_build_filter_rejects_garbage() {
        std::env::remove_var("RUST_LOG");
        assert!(build_filter("kafkasub=loud").is_err());
    }

    #[test]
    fn test_open_log_file_appends() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("kafkasub.log");
        std::fs::write(&path, "first\n").unwrap();

        let mut file = open_log_file(&path).unwrap();
        std::io::Write::write_all(&mut file, b"second\n").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn test_open_log_file_missing_dir() {
        let result = open_log_file(Path::new("/nonexistent/kafkasub/out.log"));
        assert!(result.is_err());
    }
}
