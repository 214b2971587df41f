//! The closed set of command handlers, grounded in `cmd_processor.py`'s
//! `CmdHandler` subclasses and `CommandProcessor.command_handlers` dict.
//! Each variant mirrors one dict entry; [`Handler::Default`] covers every
//! prefix the dict doesn't name (`CommandProcessor.base_handler`).

use std::sync::Arc;

use ddb_mi::{MiValue, SessionResponse};
use ddb_prelude::{Gtid, Sid};
use ddb_router::Router;
use ddb_state::StateManager;
use ddb_tracker::{PlainTransformer, ResponseTransformer};
use tokio::sync::Mutex as AsyncMutex;

use crate::adapter::FrameworkAdapter;
use crate::command::SingleCommand;
use crate::error::{ProcessorError, ProcessorResult};
use crate::remote_backtrace::{prepare_ctx_switch_args_map, RemoteBacktraceHandler, RemoteBtOptions};
use crate::transformers::{render_thread_groups, render_thread_info, NullTransformer};

/// One command prefix's behavior, matching one `command_handlers` dict
/// entry (or its absence, for [`Handler::Default`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    /// `-break-insert`: no special routing, no special rendering.
    BreakInsert,
    /// `-thread-info`: always broadcasts, renders every reply's local
    /// thread ids in global form.
    ThreadInfo,
    /// `-exec-continue`: restores any saved custom context before
    /// resuming, then dispatches normally.
    Continue,
    /// `-exec-interrupt`: sent only to sessions that currently have a
    /// running thread.
    Interrupt,
    /// `-file-list-lines`: always routed to session 1, matching the
    /// original's hardcoded `ListCmdHandler`.
    FileListLines,
    /// `-thread-select`: resolves a trailing gtid argument to its local
    /// tid and rewrites the command text around it.
    ThreadSelect,
    /// `-bt-remote`: the cross-process backtrace walk.
    BtRemote,
    /// `-list-thread-groups`: always broadcasts, renders every reply's
    /// local inferior ids in global form.
    ListThreadGroups,
    /// `-exec-next` and every other prefix: the base dispatch with no
    /// special handling.
    Default,
}

impl Handler {
    /// Maps a command prefix to its handler, matching the original's
    /// `command_handlers` dict lookup (falling back to `base_handler`).
    #[must_use]
    pub fn for_prefix(prefix: &str) -> Self {
        match prefix {
            "-break-insert" => Self::BreakInsert,
            "-thread-info" => Self::ThreadInfo,
            "-exec-continue" => Self::Continue,
            "-exec-interrupt" => Self::Interrupt,
            "-file-list-lines" => Self::FileListLines,
            "-thread-select" => Self::ThreadSelect,
            "-bt-remote" => Self::BtRemote,
            "-list-thread-groups" => Self::ListThreadGroups,
            _ => Self::Default,
        }
    }
}

/// Everything a handler needs to dispatch through the router and touch
/// shared state, bundled so [`Handler::process`] doesn't need a dozen
/// parameters.
pub struct HandlerCtx<'a> {
    /// The command router.
    pub router: &'a Router,
    /// The id-translation and lifecycle state.
    pub state: &'a StateManager,
    /// The configured remote-backtrace adapter.
    pub adapter: &'a dyn FrameworkAdapter,
    /// Serializes custom-context switches across concurrent remote-bt and
    /// continue commands, matching the original's module-level
    /// `remotebtlock`.
    pub remotebtlock: &'a AsyncMutex<()>,
}

impl Handler {
    /// Runs this handler's logic for `cmd`, returning the text to print.
    pub async fn process(self, ctx: &HandlerCtx<'_>, cmd: SingleCommand) -> ProcessorResult<String> {
        match self {
            Self::BreakInsert | Self::Default => {
                let responses = dispatch_and_await(ctx.router, &cmd, Arc::new(PlainTransformer)).await?;
                Ok(PlainTransformer.transform(&responses))
            }
            Self::ThreadInfo => {
                let mut cmd = cmd;
                cmd.thread_id = Some(-1);
                let responses = dispatch_and_await(ctx.router, &cmd, Arc::new(NullTransformer)).await?;
                Ok(render_thread_info(ctx.state, &responses).await?)
            }
            Self::ListThreadGroups => {
                let mut cmd = cmd;
                cmd.thread_id = Some(-1);
                let responses = dispatch_and_await(ctx.router, &cmd, Arc::new(NullTransformer)).await?;
                Ok(render_thread_groups(ctx.state, &responses).await?)
            }
            Self::Continue => self.process_continue(ctx, cmd).await,
            Self::Interrupt => self.process_interrupt(ctx, cmd).await,
            Self::FileListLines => {
                let mut cmd = cmd;
                ctx.state.set_current_session(Sid(1)).await;
                cmd.session_id = Some(Sid(1));
                let responses = dispatch_and_await(ctx.router, &cmd, Arc::new(PlainTransformer)).await?;
                Ok(PlainTransformer.transform(&responses))
            }
            Self::ThreadSelect => self.process_thread_select(ctx, cmd).await,
            Self::BtRemote => {
                let handler = RemoteBacktraceHandler::new(ctx.router, ctx.state, ctx.adapter, ctx.remotebtlock);
                handler.process(&cmd, RemoteBtOptions::default()).await
            }
        }
    }

    async fn process_continue(&self, ctx: &HandlerCtx<'_>, cmd: SingleCommand) -> ProcessorResult<String> {
        let mut cmd = cmd;
        let sessions: Vec<Sid> = if let Some(sid) = cmd.session_id {
            vec![sid]
        } else {
            cmd.thread_id = Some(-1);
            ctx.state.session_ids().await
        };

        for sid in sessions {
            if ctx.state.is_in_custom_context(sid).await? {
                self.restore_context(ctx, sid).await?;
            }
        }

        let responses = dispatch_and_await(ctx.router, &cmd, Arc::new(PlainTransformer)).await?;
        Ok(PlainTransformer.transform(&responses))
    }

    async fn restore_context(&self, ctx: &HandlerCtx<'_>, sid: Sid) -> ProcessorResult<()> {
        let Some(saved) = ctx.state.get_custom_context(sid).await? else {
            return Ok(());
        };
        let ctx_args = prepare_ctx_switch_args_map(&saved.ctx);
        let (command, token, _origin) = ctx.router.prepend_token(&format!("-switch-context-custom {ctx_args}"));

        let _guard = ctx.remotebtlock.lock().await;
        let rx = ctx
            .router
            .send_to_thread(saved.thread_id, token, &command, Arc::new(NullTransformer))
            .await?;
        let mut responses = rx.await.map_err(|_| ProcessorError::Dropped)?;
        let Some(resp) = responses.pop() else { return Ok(()) };
        if resp.payload.get("message").and_then(MiValue::as_str) == Some("success") {
            ctx.state.clear_custom_context(sid).await?;
        }
        Ok(())
    }

    async fn process_interrupt(&self, ctx: &HandlerCtx<'_>, cmd: SingleCommand) -> ProcessorResult<String> {
        let mut all_responses = Vec::new();
        if let Some(sid) = cmd.session_id {
            if ctx.state.has_running_thread(sid).await? {
                let mut cmd = cmd;
                cmd.session_id = Some(sid);
                all_responses.extend(dispatch_and_await(ctx.router, &cmd, Arc::new(PlainTransformer)).await?);
            }
        } else {
            for sid in ctx.state.session_ids().await {
                if ctx.state.has_running_thread(sid).await? {
                    let mut cmd = cmd.clone();
                    cmd.session_id = Some(sid);
                    all_responses.extend(dispatch_and_await(ctx.router, &cmd, Arc::new(PlainTransformer)).await?);
                }
            }
        }
        Ok(PlainTransformer.transform(&all_responses))
    }

    async fn process_thread_select(&self, ctx: &HandlerCtx<'_>, cmd: SingleCommand) -> ProcessorResult<String> {
        let mut cmd = cmd;
        let tokens: Vec<&str> = cmd.command_no_token.split_whitespace().collect();
        if tokens.len() > 1 {
            let gtid_value: u64 = tokens[tokens.len() - 1]
                .parse()
                .map_err(|_| ProcessorError::Usage(format!("not a thread id: {}", tokens[tokens.len() - 1])))?;
            let gtid = Gtid(gtid_value);
            let (_sid, tid) = ctx.state.get_sidtid_by_gtid(gtid).await?;
            cmd.thread_id = Some(gtid_value as i64);
            cmd.command_no_token = format!("-thread-select {}", tid.0);
        }
        let responses = dispatch_and_await(ctx.router, &cmd, Arc::new(PlainTransformer)).await?;
        Ok(PlainTransformer.transform(&responses))
    }
}

/// The dispatch every handler ultimately falls through to, matching the
/// base `CmdHandler.process_command`: an explicit `--session` wins, then a
/// forced broadcast (`thread_id == -1`), then a fallback to the first
/// session if no thread context applies, then routing to the thread's
/// owning session.
async fn dispatch_and_await(
    router: &Router,
    cmd: &SingleCommand,
    transformer: Arc<dyn ResponseTransformer>,
) -> ProcessorResult<Vec<SessionResponse>> {
    let rx = if let Some(sid) = cmd.session_id {
        router.send_to_session(sid, cmd.token.clone(), &cmd.command_no_token, transformer).await?
    } else if cmd.thread_id == Some(-1) {
        router.broadcast(cmd.token.clone(), &cmd.command_no_token, transformer).await?
    } else if let Some(thread_id) = cmd.thread_id {
        let gtid = Gtid(u64::try_from(thread_id).unwrap_or(0));
        router.send_to_thread(gtid, cmd.token.clone(), &cmd.command_no_token, transformer).await?
    } else {
        router.send_to_first(cmd.token.clone(), &cmd.command_no_token, transformer).await?
    };
    rx.await.map_err(|_| ProcessorError::Dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::NuAdapter;
    use ddb_prelude::{LocalTgid, LocalTid, Token};
    use ddb_tracker::CommandTracker;

    async fn fixture() -> (Router, Arc<StateManager>, Arc<AsyncMutex<()>>) {
        let state = Arc::new(StateManager::new());
        let tracker = Arc::new(CommandTracker::new());
        let router = Router::new(state.clone(), tracker);
        (router, state, Arc::new(AsyncMutex::new(())))
    }

    fn plain_command(text: &str) -> SingleCommand {
        SingleCommand {
            token: Token::from("1"),
            origin_token: Token::from("1"),
            command_no_token: text.to_owned(),
            thread_id: None,
            session_id: None,
        }
    }

    #[test]
    fn maps_every_known_prefix() {
        assert_eq!(Handler::for_prefix("-break-insert"), Handler::BreakInsert);
        assert_eq!(Handler::for_prefix("-thread-info"), Handler::ThreadInfo);
        assert_eq!(Handler::for_prefix("-exec-continue"), Handler::Continue);
        assert_eq!(Handler::for_prefix("-exec-interrupt"), Handler::Interrupt);
        assert_eq!(Handler::for_prefix("-file-list-lines"), Handler::FileListLines);
        assert_eq!(Handler::for_prefix("-thread-select"), Handler::ThreadSelect);
        assert_eq!(Handler::for_prefix("-bt-remote"), Handler::BtRemote);
        assert_eq!(Handler::for_prefix("-list-thread-groups"), Handler::ListThreadGroups);
        assert_eq!(Handler::for_prefix("-exec-next"), Handler::Default);
        assert_eq!(Handler::for_prefix("-whatever"), Handler::Default);
    }

    #[tokio::test]
    async fn interrupt_skips_sessions_with_no_running_thread() {
        let (router, state, lock) = fixture().await;
        let sid = Sid(1);
        state.register_session(sid, "tag").await;
        let tgid = LocalTgid(1);
        state.add_thread_group(sid, tgid).await.unwrap();
        state.create_thread(sid, LocalTid(1), tgid).await.unwrap();
        state.update_all_thread_status(sid, ddb_prelude::ThreadStatus::Stopped).await.unwrap();

        let adapter = NuAdapter;
        let ctx = HandlerCtx {
            router: &router,
            state: &state,
            adapter: &adapter,
            remotebtlock: &lock,
        };
        let out = Handler::Interrupt.process(&ctx, plain_command("-exec-interrupt")).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn file_list_lines_always_targets_session_one() {
        let (router, state, lock) = fixture().await;
        let adapter = NuAdapter;
        let ctx = HandlerCtx {
            router: &router,
            state: &state,
            adapter: &adapter,
            remotebtlock: &lock,
        };
        assert!(state.get_current_session().await.is_none());
        let result = Handler::FileListLines.process(&ctx, plain_command("-file-list-lines")).await;
        assert!(result.is_err());
        assert_eq!(state.get_current_session().await, Some(Sid(1)));
    }
}
