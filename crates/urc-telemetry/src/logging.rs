//! Console plus per-run file logging.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, TimeZone};
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

use crate::{LogConfig, TelemetryError};

/// Install the global subscriber and return the path of the log file.
///
/// # Errors
///
/// Returns [`TelemetryError::LogFile`] if the log file cannot be created and
/// [`TelemetryError::LoggingInit`] if a subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> Result<PathBuf, TelemetryError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_directive()));

    let path = config
        .log_dir
        .join(log_file_name(&config.rse, &chrono::Local::now()));
    let file = Arc::new(open_log_file(&config.log_dir, &path)?);

    let (console_layer, file_layer) = if config.json {
        (
            fmt::layer()
                .json()
                .with_current_span(true)
                .with_thread_names(true)
                .with_target(true)
                .with_writer(std::io::stdout)
                .boxed(),
            fmt::layer()
                .json()
                .with_current_span(true)
                .with_thread_names(true)
                .with_target(true)
                .with_writer(file)
                .boxed(),
        )
    } else {
        (
            fmt::layer()
                .with_thread_names(true)
                .with_target(false)
                .with_writer(std::io::stdout)
                .boxed(),
            fmt::layer()
                .with_ansi(false)
                .with_thread_names(true)
                .with_target(false)
                .with_writer(file)
                .boxed(),
        )
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;

    tracing::info!(path = %path.display(), "Logging to file");
    tracing::info!(level = %config.level, "Log level");
    Ok(path)
}

/// File name of the log for one run: `unique_replicas_<RSE>_<YYYYmmdd_HHMMSS>.log`.
///
/// Characters outside `[A-Za-z0-9._-]` in the endpoint name become `_`.
#[must_use]
pub fn log_file_name<Tz: TimeZone>(rse: &str, at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let rse: String = rse
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("unique_replicas_{rse}_{}.log", at.format("%Y%m%d_%H%M%S"))
}

fn open_log_file(dir: &Path, path: &Path) -> Result<fs::File, TelemetryError> {
    fs::create_dir_all(dir).map_err(|source| TelemetryError::LogFile {
        path: dir.to_path_buf(),
        source,
    })?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| TelemetryError::LogFile {
            path: path.to_path_buf(),
            source,
        })
}
