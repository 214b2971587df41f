//! Session lifecycle and write-path errors.

use ddb_prelude::Sid;
use ddb_state::StateError;
use ddb_transport::TransportError;
use thiserror::Error;

/// Errors raised while starting, driving, or tearing down a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The underlying transport failed to start, read, or write.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A state-manager call failed (unknown id, unknown session).
    #[error(transparent)]
    State(#[from] StateError),

    /// `write_line` was called while the session was not `Ready`.
    #[error("session {0:?} is not ready to accept commands")]
    NotReady(Sid),

    /// `start` was called on a session that has already left `Idle`.
    #[error("session {0:?} has already been started")]
    AlreadyStarted(Sid),
}

/// Convenience result alias.
pub type SessionResult<T> = Result<T, SessionError>;
