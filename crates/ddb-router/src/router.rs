//! `Router`, grounded in `original_source/ddb/ddb/cmd_router.py`'s
//! `CmdRouter`: token assignment, tracker registration, and the
//! broadcast/first/session/thread dispatch targets.

use std::collections::HashSet;
use std::sync::Arc;

use ddb_mi::SessionResponse;
use ddb_prelude::{Counter, Gtid, Sid, Token};
use ddb_state::StateManager;
use ddb_tracker::{CommandTracker, ResponseTransformer};
use indexmap::IndexMap;
use tokio::sync::{oneshot, RwLock};

use crate::error::{RouterError, RouterResult};
use crate::session_handle::SessionHandle;
use crate::token::split_leading_token;

/// Dispatches commands to one, several, or all sessions, registering each
/// with the [`CommandTracker`] so its replies fan in correctly.
pub struct Router {
    sessions: RwLock<IndexMap<Sid, Arc<dyn SessionHandle>>>,
    state: Arc<StateManager>,
    tracker: Arc<CommandTracker>,
    token_counter: Counter,
}

impl Router {
    /// Creates a router with no sessions registered yet.
    #[must_use]
    pub fn new(state: Arc<StateManager>, tracker: Arc<CommandTracker>) -> Self {
        Self {
            sessions: RwLock::new(IndexMap::new()),
            state,
            tracker,
            token_counter: Counter::new(),
        }
    }

    /// Registers a session as a dispatch target.
    pub async fn add_session(&self, handle: Arc<dyn SessionHandle>) {
        self.sessions.write().await.insert(handle.sid(), handle);
    }

    /// Unregisters a session (on shutdown or unexpected death).
    pub async fn remove_session(&self, sid: Sid) {
        self.sessions.write().await.shift_remove(&sid);
    }

    /// Splits a user-typed command into `(command_without_token,
    /// outbound_token, origin_token)`: if `cmd` starts with a digit run
    /// followed by `-`, those digits are the origin token; otherwise a
    /// fresh one is minted. The outbound token is the origin token run
    /// through [`CommandTracker::dedup_token`].
    #[must_use]
    pub fn prepend_token(&self, cmd: &str) -> (String, Token, Token) {
        let (origin_token, command) = match split_leading_token(cmd) {
            Some((digits, rest)) => (Token::from(digits.as_str()), rest),
            None => (self.token_counter.next_token(), cmd.to_owned()),
        };
        let outbound_token = self.tracker.dedup_token(origin_token.clone());
        (command, outbound_token, origin_token)
    }

    async fn register_cmd(
        &self,
        token: Token,
        command: &str,
        target_sessions: HashSet<Sid>,
        transformer: Arc<dyn ResponseTransformer>,
    ) -> oneshot::Receiver<Vec<SessionResponse>> {
        self.tracker
            .create_cmd(token, command.to_owned(), target_sessions, transformer)
            .await
    }

    /// Sends `cmd` (with `token` prepended) to every registered session.
    pub async fn broadcast(
        &self,
        token: Token,
        cmd: &str,
        transformer: Arc<dyn ResponseTransformer>,
    ) -> RouterResult<oneshot::Receiver<Vec<SessionResponse>>> {
        let sessions = self.sessions.read().await;
        let targets: HashSet<Sid> = sessions.keys().copied().collect();
        let rx = self.register_cmd(token.clone(), cmd, targets, transformer).await;
        let wire = format!("{token}{cmd}");
        for session in sessions.values() {
            session.write_line(&wire).await?;
        }
        Ok(rx)
    }

    /// Sends `cmd` to whichever session was registered first, matching the
    /// original's hard-coded `sessions[1]`.
    pub async fn send_to_first(
        &self,
        token: Token,
        cmd: &str,
        transformer: Arc<dyn ResponseTransformer>,
    ) -> RouterResult<oneshot::Receiver<Vec<SessionResponse>>> {
        let sessions = self.sessions.read().await;
        let (&sid, session) = sessions.iter().next().ok_or(RouterError::NoSessions)?;
        let rx = self
            .register_cmd(token.clone(), cmd, HashSet::from([sid]), transformer)
            .await;
        session.write_line(&format!("{token}{cmd}")).await?;
        Ok(rx)
    }

    /// Sends `cmd` to exactly one session by id.
    pub async fn send_to_session(
        &self,
        sid: Sid,
        token: Token,
        cmd: &str,
        transformer: Arc<dyn ResponseTransformer>,
    ) -> RouterResult<oneshot::Receiver<Vec<SessionResponse>>> {
        let sessions = self.sessions.read().await;
        let session = sessions.get(&sid).ok_or(RouterError::UnknownSession(sid))?;
        let rx = self
            .register_cmd(token.clone(), cmd, HashSet::from([sid]), transformer)
            .await;
        session.write_line(&format!("{token}{cmd}")).await?;
        Ok(rx)
    }

    /// Sends `cmd` to the aggregator's currently selected session.
    pub async fn send_to_current_session(
        &self,
        token: Token,
        cmd: &str,
        transformer: Arc<dyn ResponseTransformer>,
    ) -> RouterResult<oneshot::Receiver<Vec<SessionResponse>>> {
        let sid = self.state.get_current_session().await.ok_or(RouterError::NoCurrentSession)?;
        self.send_to_session(sid, token, cmd, transformer).await
    }

    /// Sends `cmd` to the session owning `gtid`, first selecting that
    /// thread locally via `-thread-select`.
    pub async fn send_to_thread(
        &self,
        gtid: Gtid,
        token: Token,
        cmd: &str,
        transformer: Arc<dyn ResponseTransformer>,
    ) -> RouterResult<oneshot::Receiver<Vec<SessionResponse>>> {
        let (sid, tid) = self.state.get_sidtid_by_gtid(gtid).await?;
        let sessions = self.sessions.read().await;
        let session = sessions.get(&sid).ok_or(RouterError::UnknownSession(sid))?;
        let rx = self
            .register_cmd(token.clone(), cmd, HashSet::from([sid]), transformer)
            .await;
        session.write_line(&format!("-thread-select {tid}")).await?;
        session.write_line(&format!("{token}{cmd}")).await?;
        Ok(rx)
    }

    /// Sends `cmd` to the aggregator's currently selected global thread.
    pub async fn send_to_current_thread(
        &self,
        token: Token,
        cmd: &str,
        transformer: Arc<dyn ResponseTransformer>,
    ) -> RouterResult<oneshot::Receiver<Vec<SessionResponse>>> {
        let gtid = self.state.get_current_gthread().await.ok_or(RouterError::NoCurrentThread)?;
        self.send_to_thread(gtid, token, cmd, transformer).await
    }
}
