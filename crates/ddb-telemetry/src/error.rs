//! Errors produced while initializing telemetry.

use thiserror::Error;

/// Errors produced while setting up logging.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The global `tracing` subscriber was already installed.
    #[error("global tracing subscriber already set")]
    AlreadyInitialized,

    /// The `RUST_LOG`/directive filter string could not be parsed.
    #[error("invalid log filter directive: {0}")]
    InvalidFilter(String),
}

/// Convenience result alias.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
