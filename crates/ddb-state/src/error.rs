//! State-manager errors.

use thiserror::Error;

/// Errors raised by [`crate::StateManager`] lookups and mutations.
///
/// A lookup against an id the manager has never registered is always an
/// error — it is never silently auto-created.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    /// No such session id.
    #[error("unknown session: {0}")]
    UnknownSession(String),

    /// No such `(sid, tid)` pair.
    #[error("unknown thread: {0}")]
    UnknownThread(String),

    /// No such `(sid, tgid)` pair.
    #[error("unknown thread group: {0}")]
    UnknownThreadGroup(String),

    /// No such global thread id.
    #[error("unknown global thread id: {0}")]
    UnknownGtid(String),

    /// No such global inferior id.
    #[error("unknown global inferior id: {0}")]
    UnknownGiid(String),

    /// No session registered under this tag.
    #[error("unknown session tag: {0}")]
    UnknownTag(String),
}

/// Convenience result alias.
pub type StateResult<T> = Result<T, StateError>;
