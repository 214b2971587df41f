//! Router errors.

use ddb_prelude::Sid;
use ddb_state::StateError;
use thiserror::Error;

/// Errors raised while dispatching a command to its target session(s).
#[derive(Debug, Error)]
pub enum RouterError {
    /// No session is registered with this id.
    #[error("no such session: {0:?}")]
    UnknownSession(Sid),

    /// There are no sessions registered at all (e.g. `send_to_first` with
    /// nothing attached yet).
    #[error("no sessions are registered")]
    NoSessions,

    /// No thread is currently selected (`send_to_current_thread` with
    /// nothing picked via `-thread-select`).
    #[error("no thread selected; use -thread-select #gtid first")]
    NoCurrentThread,

    /// No session is currently selected (`send_to_current_session` with
    /// nothing picked).
    #[error("no session selected")]
    NoCurrentSession,

    /// The session's transport rejected the write.
    #[error("failed to write to session: {0}")]
    Write(String),

    /// A state-manager lookup (e.g. gtid → session/thread) failed.
    #[error(transparent)]
    State(#[from] StateError),
}

/// Convenience result alias.
pub type RouterResult<T> = Result<T, RouterError>;
