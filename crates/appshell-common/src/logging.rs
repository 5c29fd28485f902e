//! Logging configuration and setup.

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Errors raised while installing the global subscriber.
#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Logging already initialized")]
    AlreadyInitialized,

    #[error("Invalid filter directive: {0}")]
    InvalidFilter(String),
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format.
    #[default]
    Pretty,
    /// Compact single-line format.
    Compact,
    /// JSON format for structured logging.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level used when no filter overrides it.
    pub level: Level,
    /// Output format.
    pub format: LogFormat,
    /// Custom filter string (e.g., "appshell_worker=debug,reqwest=warn").
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Pretty,
            filter: None,
        }
    }
}

impl LogConfig {
    /// Create a debug configuration.
    pub fn debug() -> Self {
        Self {
            level: Level::DEBUG,
            ..Default::default()
        }
    }

    /// Create a production configuration.
    pub fn production() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Json,
            ..Default::default()
        }
    }

    /// Set a custom filter.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

/// Initialize logging with the given configuration.
///
/// The `RUST_LOG` environment variable takes precedence over the configured
/// level. Returns [`LoggingError::AlreadyInitialized`] if a global
/// subscriber is already installed, so repeated calls from test binaries
/// are harmless to ignore.
pub fn init_logging(config: LogConfig) -> Result<(), LoggingError> {
    let filter = match config.filter {
        Some(ref custom) => EnvFilter::try_new(custom)
            .map_err(|e| LoggingError::InvalidFilter(e.to_string()))?,
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.level.to_string())),
    };

    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(true))
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_target(true))
            .try_init(),
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
    };

    result.map_err(|_| LoggingError::AlreadyInitialized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert_eq!(config.level, Level::INFO);
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(config.filter.is_none());
    }

    #[test]
    fn test_log_config_with_filter() {
        let config = LogConfig::debug().with_filter("appshell_worker=trace");
        assert_eq!(config.level, Level::DEBUG);
        assert_eq!(config.filter, Some("appshell_worker=trace".to_string()));
    }

    #[test]
    fn test_init_twice_reports_already_initialized() {
        let first = init_logging(LogConfig::default());
        let second = init_logging(LogConfig::default());
        // Whichever call came second (another test may have won the race)
        // must report the installed subscriber instead of panicking.
        if first.is_ok() {
            assert!(matches!(second, Err(LoggingError::AlreadyInitialized)));
        }
    }
}
