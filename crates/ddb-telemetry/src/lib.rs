#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Logging setup for the `ddb` distributed debugger aggregator.
//!
//! Out of scope per the spec is the original's bespoke tracing
//! infrastructure (`mtracer`/`viztracer` command-timing instrumentation);
//! ordinary structured logging via `tracing` is ambient stack and lives
//! here regardless.

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, setup_default_logging, setup_logging};
