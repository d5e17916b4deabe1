//! Log sinks — console plus an optional rotating file
//!
//! Console verbosity follows `RUST_LOG` (default `info`). The file sink is
//! written through a non-blocking worker: when the worker falls behind, lines
//! are dropped rather than stalling reconciliation. The returned [`LogGuard`]
//! flushes pending lines when dropped, so `main` holds it until exit.

use anyhow::{Context, Result};
use tracing::level_filters::LevelFilter;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::defaults::{LOG_FILE_PREFIX, LOG_FILE_SUFFIX, LOG_MAX_FILES};
use crate::config::LoggingConfig;

/// Keeps the file writer alive; dropping it flushes buffered lines.
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

fn console_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Console-only subscriber for the startup phase, before the config that
/// names the log directory has been read.
pub fn bootstrap_subscriber() -> impl Subscriber + Send + Sync {
    fmt()
        .with_env_filter(console_filter())
        .with_target(false)
        .finish()
}

/// Install the global subscriber.
pub fn init(config: &LoggingConfig) -> Result<LogGuard> {
    let console = fmt::layer().with_target(false).with_filter(console_filter());

    let (file_layer, guard) = if config.file_enabled {
        let appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(LOG_FILE_PREFIX)
            .filename_suffix(LOG_FILE_SUFFIX)
            .max_log_files(LOG_MAX_FILES)
            .build(&config.directory)
            .with_context(|| format!("Failed to open log directory {}", config.directory))?;
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let level: LevelFilter = config.file_level.parse().unwrap_or(LevelFilter::INFO);
        let layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_file(true)
            .with_line_number(true)
            .with_filter(level);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {e}"))?;

    Ok(LogGuard { _file: guard })
}
