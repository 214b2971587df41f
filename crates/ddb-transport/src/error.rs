//! Transport-level errors.

use thiserror::Error;

/// Errors raised while starting, feeding, or tearing down a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A local process could not be spawned, written to, or read from.
    #[error("local process I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The SSH session or channel failed.
    #[error("SSH error: {0}")]
    Ssh(String),

    /// `write_line`/`read_line` was called before `start`, or after `close`.
    #[error("transport is not open")]
    NotOpen,

    /// The peer closed the stream; no more lines will arrive.
    #[error("transport closed by peer")]
    Closed,

    /// A connect attempt exhausted its retry budget.
    #[error("gave up connecting after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        /// Number of attempts made, including the first.
        attempts: u32,
        /// The most recent failure.
        #[source]
        source: Box<TransportError>,
    },
}

/// Convenience result alias.
pub type TransportResult<T> = Result<T, TransportError>;
