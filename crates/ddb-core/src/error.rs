//! Top-level error type shared across the aggregator.
//!
//! Each downstream crate (`ddb-transport`, `ddb-mi`, `ddb-state`, ...)
//! defines its own narrower `thiserror` enum and converts into the
//! relevant [`DdbError`] variant at its crate boundary, the same layering
//! the runtime crates in this workspace use for their own errors.

use thiserror::Error;

use crate::ids::{Gtid, Sid, Token};

/// Errors common to every layer of the aggregator.
#[derive(Debug, Error)]
pub enum DdbError {
    /// A transport (local process or SSH) failed to start, read, or write.
    #[error("transport error: {0}")]
    Transport(String),

    /// A command or reply could not be parsed as valid GDB/MI.
    #[error("failed to parse MI record: {0}")]
    Parse(String),

    /// A lookup referenced an id that has no known translation.
    #[error("unknown id: {0}")]
    UnknownId(String),

    /// An MI reply or notify record violated an expected protocol
    /// invariant (missing field, unexpected class, non-success result).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The user issued a command the router/processor cannot satisfy
    /// given the current state (no current thread, empty session set).
    #[error("usage error: {0}")]
    Usage(String),

    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Convenience result alias.
pub type DdbResult<T> = Result<T, DdbError>;

impl DdbError {
    /// Builds an [`DdbError::UnknownId`] referencing a global thread id.
    #[must_use]
    pub fn unknown_gtid(gtid: Gtid) -> Self {
        Self::UnknownId(format!("global thread id {gtid}"))
    }

    /// Builds an [`DdbError::UnknownId`] referencing a session id.
    #[must_use]
    pub fn unknown_sid(sid: Sid) -> Self {
        Self::UnknownId(format!("session id {sid}"))
    }

    /// Builds an [`DdbError::UnknownId`] referencing a command token.
    #[must_use]
    pub fn unknown_token(token: &Token) -> Self {
        Self::UnknownId(format!("command token {token}"))
    }
}
