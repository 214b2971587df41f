#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Transports: the thing each session speaks GDB/MI lines over.
//!
//! A [`Transport`] owns one bidirectional byte stream to a GDB/MI process —
//! local child process, a single SSH hop, or SSH bridged through a jump
//! host — matching the controller hierarchy in
//! `original_source/ddb/python/iddb/gdb_controller.py`. Everything above
//! this layer (the MI parser, the session actor) only ever sees raw line
//! bytes in and raw command text out.

mod error;
mod local;
mod retry;
mod ssh;
mod ssh_bridge;

pub use error::{TransportError, TransportResult};
pub use local::LocalTransport;
pub use retry::RetryPolicy;
pub use ssh::{SshCredentials, SshTransport};
pub use ssh_bridge::SshBridgeTransport;

use async_trait::async_trait;

/// One bidirectional byte stream to a running (or about-to-run) GDB/MI
/// process.
///
/// Implementations are not required to be internally synchronized; callers
/// (the session actor) own exclusive access to a given transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establishes the underlying connection and launches `command_line`
    /// as the remote process (e.g. `"gdb --interpreter=mi3 -q"`).
    async fn start(&mut self, command_line: &str) -> TransportResult<()>;

    /// Writes one line of input (a GDB/MI command), appending the newline.
    async fn write_line(&mut self, line: &str) -> TransportResult<()>;

    /// Reads the next complete line, without its trailing newline.
    ///
    /// Returns `Ok(None)` when the peer has closed the stream cleanly.
    async fn read_line(&mut self) -> TransportResult<Option<Vec<u8>>>;

    /// Whether the transport believes it is still connected.
    fn is_open(&self) -> bool;

    /// Tears the connection down. Idempotent.
    async fn close(&mut self) -> TransportResult<()>;
}
