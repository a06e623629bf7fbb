//! URC Telemetry - Logging for audit runs
//!
//! Every run logs to the console and to its own file:
//!
//! - **Verbosity**: [`LogLevel`] parsed from `DEBUG`, `INFO`, `WARNING`, `ERROR`
//! - **Per-run file**: `<log_dir>/unique_replicas_<RSE>_<YYYYmmdd_HHMMSS>.log`,
//!   written unbuffered so it stays current if the process dies
//! - **Formats**: human-readable lines with thread names, or JSON
//!
//! `RUST_LOG` overrides the configured level when set.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use urc_telemetry::{LogConfig, LogLevel, init_logging};
//!
//! let log_file = init_logging(&LogConfig::new("CERN-PROD").with_level(LogLevel::Debug))?;
//! tracing::info!(path = %log_file.display(), "Logging to file");
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod logging;

pub use logging::*;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    #[must_use]
    pub const fn as_directive(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error => "error",
        }
    }

    /// Canonical upper-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARNING" | "WARN" => Ok(Self::Warning),
            "ERROR" => Ok(Self::Error),
            _ => Err(TelemetryError::InvalidLevel(s.to_string())),
        }
    }
}

/// Logging configuration for one run.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Endpoint under audit; part of the log file name.
    pub rse: String,

    /// Verbosity when `RUST_LOG` is unset.
    pub level: LogLevel,

    /// Directory for the per-run log file.
    pub log_dir: PathBuf,

    /// Emit JSON instead of text lines.
    pub json: bool,
}

impl LogConfig {
    /// Create a configuration with defaults for the given endpoint.
    #[must_use]
    pub fn new(rse: impl Into<String>) -> Self {
        Self {
            rse: rse.into(),
            level: LogLevel::default(),
            log_dir: PathBuf::from("logs"),
            json: false,
        }
    }

    /// Set the verbosity.
    #[must_use]
    pub const fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Set the log directory.
    #[must_use]
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    /// Enable or disable JSON output.
    #[must_use]
    pub const fn with_json(mut self, enabled: bool) -> Self {
        self.json = enabled;
        self
    }
}

/// Telemetry error type.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Unknown verbosity name.
    #[error("Invalid log level: {0} (expected DEBUG, INFO, WARNING or ERROR)")]
    InvalidLevel(String),

    /// The log file or its directory could not be created.
    #[error("Cannot open log file {}: {source}", path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A global subscriber is already installed.
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),
}
