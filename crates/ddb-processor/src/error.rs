//! Command-processor errors.

use ddb_router::RouterError;
use ddb_state::StateError;
use ddb_tracker::TrackerError;
use thiserror::Error;

/// Errors raised while parsing or dispatching a REPL command.
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// Dispatch through the router failed (unknown session, write error, ...).
    #[error(transparent)]
    Router(#[from] RouterError),

    /// A state-manager lookup failed.
    #[error(transparent)]
    State(#[from] StateError),

    /// The tracker had no record of the command's token.
    #[error(transparent)]
    Tracker(#[from] TrackerError),

    /// The command was well-formed but nothing could be done with it in
    /// the current context (no current thread, `--thread` with no value,
    /// an unparseable gtid, ...), matching the original's "log a usage
    /// error and return" handlers.
    #[error("usage error: {0}")]
    Usage(String),

    /// A remote-backtrace step reported something other than `"success"`.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The awaited fan-in was dropped before completing (a session died
    /// mid-command).
    #[error("command was dropped before completing")]
    Dropped,
}

/// Convenience result alias.
pub type ProcessorResult<T> = Result<T, ProcessorError>;
