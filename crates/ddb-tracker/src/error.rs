//! Command-tracker errors.

use ddb_prelude::Token;
use thiserror::Error;

/// Errors raised by [`crate::CommandTracker`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackerError {
    /// A response (or a lookup) named a token the tracker has no pending
    /// command for — already completed, or never registered.
    #[error("no pending command for token {0}")]
    UnknownToken(Token),
}

/// Convenience result alias.
pub type TrackerResult<T> = Result<T, TrackerError>;
