//! Structured logging configuration.

use crate::config::LoggingSettings;
use std::path::PathBuf;
use std::str::FromStr;

/// Default filter directive.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Output format of the detailed log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Resolved logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `EnvFilter` directive for the detailed log.
    pub level: String,
    /// Detailed log format.
    pub format: LogFormat,
    /// Detailed log file; stderr when `None`.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            format: LogFormat::Pretty,
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Builds logging configuration from config settings.
    ///
    /// `verbose` forces `debug`. Otherwise the configured level wins over
    /// `RUST_LOG`, which wins over the default. An unknown format falls back
    /// to pretty output.
    #[must_use]
    pub fn from_settings(settings: Option<&LoggingSettings>, verbose: bool) -> Self {
        let level = if verbose {
            "debug".to_string()
        } else {
            settings
                .and_then(|s| s.level.clone())
                .or_else(|| std::env::var("RUST_LOG").ok())
                .filter(|l| !l.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
        };
        let format = settings
            .and_then(|s| s.format.as_deref())
            .and_then(|f| f.parse().ok())
            .unwrap_or_default();
        let file = settings.and_then(|s| s.file.clone());

        Self {
            level,
            format,
            file,
        }
    }
}
