//! [`SingleCommand`] and the virtual flag parsing that resolves a
//! user-typed line into a dispatch target, grounded in `cmd_processor.py`'s
//! `SingleCommand`/`CommandProcessor.send_command`.

use ddb_prelude::{Gtid, Sid, Token};
use ddb_router::Router;
use ddb_state::StateManager;

use crate::error::{ProcessorError, ProcessorResult};

/// One parsed, target-resolved command line awaiting a handler.
///
/// `thread_id` follows the original's overloaded sentinel: `Some(-1)` means
/// "every thread" (a forced broadcast), `Some(gtid)` targets one global
/// thread, `None` means no thread context applies.
#[derive(Debug, Clone)]
pub struct SingleCommand {
    /// The token this command will be sent under.
    pub token: Token,
    /// The token as the user (or a prior hop) originally supplied it.
    pub origin_token: Token,
    /// The command text, sans token, with any `--thread`/`--session` flags
    /// already resolved and stripped.
    pub command_no_token: String,
    /// `-1` for "all", a resolved global thread id otherwise, `None` if no
    /// thread applies.
    pub thread_id: Option<i64>,
    /// An explicit `--session` target, if the user gave one.
    pub session_id: Option<Sid>,
}

impl SingleCommand {
    /// The full wire command: token immediately followed by command text.
    #[must_use]
    pub fn command(&self) -> String {
        format!("{}{}", self.token, self.command_no_token)
    }

    /// The MI command prefix (`-break-insert`, `-thread-info`, ...), used
    /// to look up a handler.
    #[must_use]
    pub fn prefix(&self) -> &str {
        self.command_no_token.split_whitespace().next().unwrap_or("")
    }
}

/// Parses one REPL line into a [`SingleCommand`], or `None` if it was
/// blank. Mirrors `send_command`'s flag-resolution order precisely,
/// including its one quirk: the `--all` branch never rewrites `cmd_split`
/// itself (only the text it assigns to `command_no_token`), so if a
/// command names both `--all` and `--session`, the subsequent `--session`
/// strip re-joins the *original* split (still containing `--all`),
/// silently undoing the all-broadcast stripping. That is the original's
/// behavior verbatim, not a bug introduced here.
pub async fn parse(router: &Router, state: &StateManager, raw: &str) -> ProcessorResult<Option<SingleCommand>> {
    let trimmed = raw.trim_end_matches('\n');
    let (command_no_token, token, origin_token) = router.prepend_token(trimmed);

    let mut cmd_split: Vec<String> = command_no_token.split_whitespace().map(str::to_owned).collect();
    if cmd_split.is_empty() {
        return Ok(None);
    }

    let mut command_no_token = cmd_split.join(" ");
    let mut thread_id: Option<i64> = None;
    let mut session_id: Option<Sid> = None;

    if cmd_split.len() >= 2 && cmd_split.last().map(String::as_str) == Some("--all") {
        thread_id = Some(-1);
        command_no_token = cmd_split[..cmd_split.len().saturating_sub(1)].join(" ");
    } else if let Some(thread_index) = cmd_split.iter().position(|t| t == "--thread") {
        if thread_index < cmd_split.len().saturating_sub(1) {
            let gtid_value: u64 = cmd_split[thread_index + 1]
                .parse()
                .map_err(|_| ProcessorError::Usage(format!("not a thread id: {}", cmd_split[thread_index + 1])))?;
            let gtid = Gtid(gtid_value);
            let (_sid, tid) = state.get_sidtid_by_gtid(gtid).await?;
            thread_id = Some(gtid_value as i64);
            cmd_split[thread_index + 1] = tid.to_string();
            command_no_token = cmd_split.join(" ");
        }
    } else if let Some(curr_thread) = state.get_current_gthread().await {
        thread_id = Some(curr_thread.0 as i64);
    }

    if let Some(session_index) = cmd_split.iter().position(|t| t == "--session") {
        if session_index < cmd_split.len().saturating_sub(1) {
            let sid_value: u64 = cmd_split[session_index + 1]
                .parse()
                .map_err(|_| ProcessorError::Usage(format!("not a session id: {}", cmd_split[session_index + 1])))?;
            session_id = Some(Sid(sid_value));
            cmd_split.remove(session_index + 1);
            cmd_split.remove(session_index);
            command_no_token = cmd_split.join(" ");
        }
    }

    Ok(Some(SingleCommand {
        token,
        origin_token,
        command_no_token,
        thread_id,
        session_id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddb_prelude::{LocalTgid, LocalTid};
    use ddb_tracker::CommandTracker;
    use std::sync::Arc;

    fn router_and_state() -> (Router, Arc<StateManager>) {
        let state = Arc::new(StateManager::new());
        let tracker = Arc::new(CommandTracker::new());
        (Router::new(state.clone(), tracker), state)
    }

    #[tokio::test]
    async fn all_suffix_forces_broadcast_and_strips_the_flag() {
        let (router, state) = router_and_state();
        let parsed = parse(&router, &state, "-thread-info --all").await.unwrap().unwrap();
        assert_eq!(parsed.thread_id, Some(-1));
        assert_eq!(parsed.command_no_token, "-thread-info");
    }

    #[tokio::test]
    async fn thread_flag_resolves_gtid_to_local_tid() {
        let (router, state) = router_and_state();
        let sid = Sid(1);
        state.register_session(sid, "tag").await;
        let tgid = LocalTgid(1);
        state.add_thread_group(sid, tgid).await.unwrap();
        let (gtid, _) = state.create_thread(sid, LocalTid(9), tgid).await.unwrap();

        let parsed = parse(&router, &state, &format!("-exec-next --thread {}", gtid.0))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(parsed.thread_id, Some(gtid.0 as i64));
        assert_eq!(parsed.command_no_token, "-exec-next --thread 9");
    }

    #[tokio::test]
    async fn session_flag_is_parsed_and_stripped_independently() {
        let (router, state) = router_and_state();
        let parsed = parse(&router, &state, "-thread-info --session 3").await.unwrap().unwrap();
        assert_eq!(parsed.session_id, Some(Sid(3)));
        assert_eq!(parsed.command_no_token, "-thread-info");
    }

    #[tokio::test]
    async fn blank_line_parses_to_none() {
        let (router, state) = router_and_state();
        assert!(parse(&router, &state, "   ").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn falls_back_to_current_gthread_when_no_flag_present() {
        let (router, state) = router_and_state();
        state.set_current_gthread(Gtid(4)).await;
        let parsed = parse(&router, &state, "-exec-next").await.unwrap().unwrap();
        assert_eq!(parsed.thread_id, Some(4));
    }
}
