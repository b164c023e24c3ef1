//! Logging configuration types.

use super::defaults::{default_enable_file_logging, default_log_dir, default_log_filename};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Logging configuration. Stdout is always written; the rolling file is
/// opt-in via `enable_file_logging`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Directory for rolled log files
    #[serde(default = "default_log_dir")]
    pub dir: String,
    /// Base name of the log file within `dir`
    #[serde(default = "default_log_filename")]
    pub filename: String,
    /// When to roll the log file over
    #[serde(default)]
    pub rotation: RotationPolicy,
    /// Tracing level; overrides `RUST_LOG` when set
    #[serde(default)]
    pub level: Option<LogLevel>,
    /// Also write logs to the rolling file
    #[serde(default = "default_enable_file_logging")]
    pub enable_file_logging: bool,
    /// Rendering of log lines
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            filename: default_log_filename(),
            rotation: RotationPolicy::default(),
            level: None,
            enable_file_logging: default_enable_file_logging(),
            format: LogFormat::default(),
        }
    }
}

/// File rotation cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    #[default]
    Daily,
    Hourly,
    Never,
}

/// Minimum severity rendered to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[serde(alias = "warning")]
    Warn,
    #[serde(alias = "err")]
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rendering of log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Text,
}
