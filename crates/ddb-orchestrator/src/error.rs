//! Orchestrator errors.

use ddb_session::SessionError;
use ddb_state::StateError;
use thiserror::Error;

/// Errors raised while constructing, starting, or tearing down sessions.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A session's own lifecycle call failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A state-manager call failed.
    #[error(transparent)]
    State(#[from] StateError),

    /// A `Components[]` entry needs a `bin` path for `Binary` start mode
    /// but didn't provide one.
    #[error("component {0:?} has no binary path configured")]
    MissingBinary(String),

    /// A remote component needs SSH credentials (hostname) but didn't
    /// provide any, and discovery didn't supply one either.
    #[error("component {0:?} is a remote session with no credentials configured")]
    MissingCredentials(String),
}

/// Convenience result alias.
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
