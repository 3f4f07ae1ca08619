//! Logging initialization.
//!
//! Logs go to stderr (pretty or JSON) or, when configured, to a file, so
//! command output on stdout stays machine-readable.

use std::path::Path;
use std::sync::Mutex;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

// Keeps the file writer flushing until the process exits
static LOG_GUARD: Mutex<Option<WorkerGuard>> = Mutex::new(None);

/// Install the global subscriber writing to stderr.
pub fn init_telemetry(log_level: &str, json_format: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(log_level)?;

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init()?;
    }

    Ok(())
}

/// Install the global subscriber appending to `log_file`.
pub fn init_telemetry_with_file(
    log_level: &str,
    json_format: bool,
    log_file: &Path,
) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(log_level)?;

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .map_err(|e| anyhow::anyhow!("Failed to open log file '{}': {}", log_file.display(), e))?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(writer))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_ansi(false).with_writer(writer))
            .try_init()?;
    }

    if let Ok(mut slot) = LOG_GUARD.lock() {
        *slot = Some(guard);
    }
    Ok(())
}

/// Pick the sink from the `[logging]` section.
pub fn init_from_config(config: &LoggingConfig) -> anyhow::Result<()> {
    match &config.file {
        Some(path) => init_telemetry_with_file(&config.level, config.json, path),
        None => init_telemetry(&config.level, config.json),
    }
}
