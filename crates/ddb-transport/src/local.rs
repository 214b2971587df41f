//! Local child-process transport, grounded in
//! `original_source/ddb/python/iddb/gdb_controller.py`'s
//! `VanillaPIDController` (spawn GDB, talk to it over stdin/stdout).

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};

use async_trait::async_trait;

use crate::error::{TransportError, TransportResult};
use crate::Transport;

/// Runs GDB as a subprocess of `ddb` itself.
///
/// `command_line` passed to [`Transport::start`] is split on whitespace
/// into a program and its arguments — callers are expected to have already
/// assembled a flat argument list (e.g. `"gdb --interpreter=mi3 -q -p
/// 4242"`), not an arbitrary shell string.
pub struct LocalTransport {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<BufReader<ChildStdout>>,
}

impl LocalTransport {
    /// Creates a transport with nothing spawned yet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            child: None,
            stdin: None,
            stdout: None,
        }
    }
}

impl Default for LocalTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn start(&mut self, command_line: &str) -> TransportResult<()> {
        let mut parts = command_line.split_whitespace();
        let program = parts.next().ok_or(TransportError::NotOpen)?;

        let mut command = tokio::process::Command::new(program);
        command
            .args(parts)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        let mut child = command.spawn()?;
        let stdin = child.stdin.take().ok_or(TransportError::NotOpen)?;
        let stdout = child.stdout.take().ok_or(TransportError::NotOpen)?;
        let stderr = child.stderr.take();

        if let Some(stderr) = stderr {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::warn!(target: "ddb_transport::local::stderr", "{line}");
                }
            });
        }

        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stdout = Some(BufReader::new(stdout));
        Ok(())
    }

    async fn write_line(&mut self, line: &str) -> TransportResult<()> {
        let stdin = self.stdin.as_mut().ok_or(TransportError::NotOpen)?;
        stdin.write_all(line.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }

    async fn read_line(&mut self) -> TransportResult<Option<Vec<u8>>> {
        let stdout = self.stdout.as_mut().ok_or(TransportError::NotOpen)?;
        let mut buf = Vec::new();
        let n = stdout.read_until(b'\n', &mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
        }
        Ok(Some(buf))
    }

    fn is_open(&self) -> bool {
        self.child
            .as_ref()
            .map(|child| child.id().is_some())
            .unwrap_or(false)
    }

    async fn close(&mut self) -> TransportResult<()> {
        if let Some(mut child) = self.child.take() {
            let _ = self.write_line("quit").await;
            tokio::select! {
                _ = child.wait() => {}
                () = tokio::time::sleep(std::time::Duration::from_millis(500)) => {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                }
            }
        }
        self.stdin = None;
        self.stdout = None;
        Ok(())
    }
}
