//! `tracing`/`tracing-subscriber` initialization.
//!
//! The original Python aggregator wires up ad hoc `logger.debug` calls
//! through a hand-rolled `logging.py`; the idiomatic Rust equivalent is one
//! `tracing_subscriber` initialization at the `ddb-cli` binary boundary,
//! after which every crate below it uses `tracing`'s `debug!`/`info!`/
//! `warn!`/`error!` macros.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::error::{TelemetryError, TelemetryResult};

/// Output format for log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, multi-line, for an interactive terminal.
    Pretty,
    /// Compact single-line-per-event format.
    Compact,
    /// Newline-delimited JSON, for log aggregation.
    Json,
}

/// Logging configuration resolved from CLI flags.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base filter directive, e.g. `"info"` or `"ddb_session=debug,info"`.
    pub filter: String,
    /// Output format.
    pub format: LogFormat,
}

impl LogConfig {
    /// Builds a config from a base filter directive string.
    #[must_use]
    pub fn new(filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            format: LogFormat::Compact,
        }
    }

    /// Sets the output format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// `--debug` maps to the `debug` base filter, matching the CLI's
    /// `[--debug]` flag in spec §6.
    #[must_use]
    pub fn debug() -> Self {
        Self::new("debug")
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new("info")
    }
}

/// Installs the global `tracing` subscriber. Idempotent within a process:
/// a second call returns [`TelemetryError::AlreadyInitialized`] rather than
/// panicking, since `ddb-test-support` fixtures may call this from more
/// than one test.
pub fn setup_logging(config: &LogConfig) -> TelemetryResult<()> {
    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| TelemetryError::InvalidFilter(e.to_string()))?;

    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.format {
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
    };

    result.map_err(|_| TelemetryError::AlreadyInitialized)
}

/// Convenience wrapper over [`setup_logging`] using [`LogConfig::default`].
pub fn setup_default_logging() -> TelemetryResult<()> {
    setup_logging(&LogConfig::default())
}
