//! The narrow surface the router needs from a session, kept separate from
//! the full `ddb-session` crate so the router (and the command processor
//! that drives it) don't have to depend on the session actor's transport
//! and response-pipeline internals.

use async_trait::async_trait;
use ddb_prelude::Sid;

use crate::error::RouterError;

/// Whatever can accept a raw GDB/MI command line. Implemented by
/// `ddb_session::Session`.
#[async_trait]
pub trait SessionHandle: Send + Sync {
    /// This session's id.
    fn sid(&self) -> Sid;

    /// This session's discovery tag, used for log lines and transformers
    /// that print it.
    fn tag(&self) -> &str;

    /// Writes one line of input to the underlying transport.
    async fn write_line(&self, line: &str) -> Result<(), RouterError>;
}
