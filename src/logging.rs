//! Tracing setup
//!
//! Console logs go to stderr so JSON results on stdout stay clean. A second,
//! non-ANSI layer writes everything at debug level to daily-rolling
//! `test_execution.log.YYYY-MM-DD` files.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LogLevel;

pub const LOG_FILE_PREFIX: &str = "test_execution.log";

#[derive(Debug, Clone)]
pub struct LogOptions {
    pub level: LogLevel,
    /// Directory for the rolling log file; `None` disables file logging
    pub log_dir: Option<PathBuf>,
}

/// Console filter: `RUST_LOG` wins, otherwise `cukeprobe=<level>`
pub fn console_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("cukeprobe={}", level.as_filter())))
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop and must live until
/// the process exits.
pub fn init(options: &LogOptions) -> Result<Option<WorkerGuard>> {
    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(console_filter(options.level));

    let (file, guard) = match &options.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(EnvFilter::new("cukeprobe=debug"));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

#[cfg(test)]
#[path = "logging_test.rs"]
mod logging_test;
