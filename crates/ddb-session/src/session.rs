//! `Session`: one attached GDB/MI debugger, grounded in `gdb_session.py`'s
//! `GdbSession`.

use async_trait::async_trait;
use ddb_config::SessionMode;
use ddb_prelude::{OnExit, SessionState, Sid};
use ddb_router::{RouterError, SessionHandle};
use ddb_state::StateManager;
use ddb_transport::Transport;
use tokio::sync::{Mutex, RwLock};

use crate::commands::{command_line, configure_commands};
use crate::config::SessionSpec;
use crate::error::{SessionError, SessionResult};

const RUN_COMMANDS: [&str; 3] = ["run", "r", "-exec-run"];

/// One attached GDB/MI session: owns the transport, tracks its own
/// lifecycle state, and implements [`SessionHandle`] so the router can
/// dispatch to it. Interior mutability throughout since [`SessionHandle`]
/// methods take `&self` (the trait object is shared via `Arc` between the
/// router and this session's own reader task).
pub struct Session {
    sid: Sid,
    spec: SessionSpec,
    transport: Mutex<Box<dyn Transport>>,
    state: RwLock<SessionState>,
}

impl Session {
    /// Builds a session in [`SessionState::Idle`]; call [`Self::start`] to
    /// connect its transport and run the configure handshake.
    #[must_use]
    pub fn new(sid: Sid, spec: SessionSpec, transport: Box<dyn Transport>) -> Self {
        Self {
            sid,
            spec,
            transport: Mutex::new(transport),
            state: RwLock::new(SessionState::Idle),
        }
    }

    /// This session's id.
    #[must_use]
    pub fn sid(&self) -> Sid {
        self.sid
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    /// Drives `Idle -> Starting -> Configuring -> Ready`, matching
    /// `GdbSession.__start_async`: connect the transport, issue the
    /// mode/start-mode-specific configure sequence (fire-and-forget, no
    /// token tracking), then register with the state manager.
    pub async fn start(&self, state_mgr: &StateManager, discovery_active: bool) -> SessionResult<()> {
        {
            let mut state = self.state.write().await;
            if *state != SessionState::Idle {
                return Err(SessionError::AlreadyStarted(self.sid));
            }
            *state = SessionState::Starting;
        }

        let local = self.spec.mode == SessionMode::Local;
        let line = command_line(&self.spec, local);
        {
            let mut transport = self.transport.lock().await;
            transport.start(&line).await?;
        }

        *self.state.write().await = SessionState::Configuring;
        for cmd in configure_commands(&self.spec, self.spec.mode, discovery_active) {
            self.write_line_raw(&cmd).await?;
        }

        state_mgr.register_session(self.sid, self.spec.tag.clone()).await;
        *self.state.write().await = SessionState::Ready;
        tracing::info!(sid = ?self.sid, tag = %self.spec.tag, "session ready");
        Ok(())
    }

    /// Writes one line with no token/run-delay handling; used for the
    /// configure-phase commands, which the original issues fire-and-forget.
    async fn write_line_raw(&self, line: &str) -> SessionResult<()> {
        self.transport.lock().await.write_line(line).await?;
        Ok(())
    }

    /// Reads the next complete line from the transport, or `None` on EOF.
    /// Used by the reader task (see `crate::reader`).
    pub async fn read_line(&self) -> SessionResult<Option<Vec<u8>>> {
        Ok(self.transport.lock().await.read_line().await?)
    }

    /// `GdbSession.cleanup_async`: sends `kill`/`detach` per the configured
    /// [`OnExit`], then `exit`, then closes the transport. Idempotent past
    /// `Closed`.
    pub async fn shutdown(&self) -> SessionResult<()> {
        {
            let mut state = self.state.write().await;
            if *state == SessionState::Closed {
                return Ok(());
            }
            *state = SessionState::Closing;
        }

        let mut transport = self.transport.lock().await;
        if transport.is_open() {
            let exit_cmd = match self.spec.on_exit {
                OnExit::Kill => "kill",
                OnExit::Detach => "detach",
            };
            transport.write_line(exit_cmd).await?;
            transport.write_line("exit").await?;
            transport.close().await?;
        }
        drop(transport);

        *self.state.write().await = SessionState::Closed;
        tracing::debug!(sid = ?self.sid, tag = %self.spec.tag, "session closed");
        Ok(())
    }
}

#[async_trait]
impl SessionHandle for Session {
    fn sid(&self) -> Sid {
        self.sid
    }

    fn tag(&self) -> &str {
        &self.spec.tag
    }

    /// `GdbSession.write`: strips any leading token the router already
    /// split off (the router sends `"{token}{cmd}"` as one line, so this
    /// simply forwards it), and applies `run_delay` before a bare
    /// run/continue command, matching the `cmd_no_token.strip() in
    /// ["run", "r", "-exec-run"]` check.
    async fn write_line(&self, line: &str) -> Result<(), RouterError> {
        let without_token = strip_leading_token(line);
        if RUN_COMMANDS.contains(&without_token.trim()) && self.spec.run_delay > 0.0 {
            tokio::time::sleep(std::time::Duration::from_secs_f64(self.spec.run_delay)).await;
        }
        self.write_line_raw(line)
            .await
            .map_err(|e| RouterError::Write(e.to_string()))
    }
}

/// Strips a leading `<digits>-` or `<digits>` token the way `parse_cmd`
/// does, so `run_delay` gating matches on the bare command.
fn strip_leading_token(line: &str) -> &str {
    let digits_end = line.find(|c: char| !c.is_ascii_digit()).unwrap_or(line.len());
    if digits_end == 0 {
        return line;
    }
    &line[digits_end..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ddb_config::ComponentStartMode;
    use ddb_transport::TransportResult;
    use std::sync::Mutex as StdMutex;

    struct FakeTransport {
        written: StdMutex<Vec<String>>,
        open: bool,
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn start(&mut self, _command_line: &str) -> TransportResult<()> {
            self.open = true;
            Ok(())
        }
        async fn write_line(&mut self, line: &str) -> TransportResult<()> {
            self.written.lock().unwrap().push(line.to_owned());
            Ok(())
        }
        async fn read_line(&mut self) -> TransportResult<Option<Vec<u8>>> {
            Ok(None)
        }
        fn is_open(&self) -> bool {
            self.open
        }
        async fn close(&mut self) -> TransportResult<()> {
            self.open = false;
            Ok(())
        }
    }

    fn spec() -> SessionSpec {
        SessionSpec::new("tag", "/srv", "app", SessionMode::Local, ComponentStartMode::Binary)
    }

    #[tokio::test]
    async fn start_transitions_to_ready_and_registers_with_state_manager() {
        let state_mgr = StateManager::new();
        let transport = Box::new(FakeTransport {
            written: StdMutex::new(Vec::new()),
            open: false,
        });
        let session = Session::new(Sid(1), spec(), transport);
        session.start(&state_mgr, false).await.unwrap();

        assert_eq!(session.state().await, SessionState::Ready);
        assert!(state_mgr.get_session_by_tag("tag").await.is_ok());
    }

    #[tokio::test]
    async fn starting_twice_errors() {
        let state_mgr = StateManager::new();
        let transport = Box::new(FakeTransport {
            written: StdMutex::new(Vec::new()),
            open: false,
        });
        let session = Session::new(Sid(1), spec(), transport);
        session.start(&state_mgr, false).await.unwrap();
        assert!(matches!(
            session.start(&state_mgr, false).await,
            Err(SessionError::AlreadyStarted(_))
        ));
    }

    #[tokio::test]
    async fn shutdown_writes_on_exit_then_exit_and_closes() {
        let state_mgr = StateManager::new();
        let transport = Box::new(FakeTransport {
            written: StdMutex::new(Vec::new()),
            open: false,
        });
        let session = Session::new(Sid(1), spec(), transport);
        session.start(&state_mgr, false).await.unwrap();
        session.shutdown().await.unwrap();
        assert_eq!(session.state().await, SessionState::Closed);
    }

    #[test]
    fn strip_leading_token_removes_digits_and_dash() {
        assert_eq!(strip_leading_token("42-exec-run"), "-exec-run");
        assert_eq!(strip_leading_token("run"), "run");
    }
}
