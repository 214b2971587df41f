//! The cross-process "remote backtrace" walk, grounded line-for-line in
//! `cmd_processor.py`'s `RemoteBacktraceHandler.process_command`: fetch the
//! starting thread's local stack, then repeatedly ask whichever process it
//! was called into "who called you", hop to that process's session, splice
//! its frames onto the same stack, and keep going while the target reports
//! a caller.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use ddb_mi::{MiValue, SessionResponse};
use ddb_prelude::{Gtid, LocalTid, Sid};
use ddb_router::Router;
use ddb_state::{StateManager, ThreadContext};
use ddb_tracker::PlainTransformer;
use indexmap::IndexMap;
use tokio::sync::Mutex as AsyncMutex;

use crate::adapter::FrameworkAdapter;
use crate::command::SingleCommand;
use crate::deadlock::{DeadlockDetector, LockInfo, ThreadLockInfo};
use crate::error::{ProcessorError, ProcessorResult};

/// Tunables for one `-bt-remote` walk. `detect_deadlocks` mirrors the
/// original's `ENABLE_DEADLOCK_DETECTION` constant, which is always
/// `False` upstream — the cycle-detection machinery is fully scaffolded
/// but never exercised there, so it stays off by default here too.
#[derive(Debug, Clone, Copy)]
pub struct RemoteBtOptions {
    /// Whether to fold each hop's `-get-lock-state` reply into a
    /// [`DeadlockDetector`] and report a cycle if one turns up.
    pub detect_deadlocks: bool,
}

impl Default for RemoteBtOptions {
    fn default() -> Self {
        Self { detect_deadlocks: false }
    }
}

/// Caps the number of process hops a single walk can make, so a
/// misbehaving ring of `-get-remote-bt` replies can't loop forever.
const MAX_HOPS: usize = 64;

/// One caller's metadata, as unpacked from a `-get-remote-bt` reply's
/// `metadata` tuple.
struct CallerInfo {
    success: bool,
    tag: Option<String>,
    caller_ctx: IndexMap<String, MiValue>,
}

/// Runs one `-bt-remote` command to completion.
pub struct RemoteBacktraceHandler<'a> {
    router: &'a Router,
    state: &'a StateManager,
    adapter: &'a dyn FrameworkAdapter,
    remotebtlock: &'a AsyncMutex<()>,
}

impl<'a> RemoteBacktraceHandler<'a> {
    /// Builds a handler for one command; `remotebtlock` should be shared
    /// across every concurrently running `-bt-remote` command (and every
    /// `-exec-continue` that has to restore a saved context), since the
    /// custom-context switch it performs is not safe to interleave.
    #[must_use]
    pub fn new(
        router: &'a Router,
        state: &'a StateManager,
        adapter: &'a dyn FrameworkAdapter,
        remotebtlock: &'a AsyncMutex<()>,
    ) -> Self {
        Self {
            router,
            state,
            adapter,
            remotebtlock,
        }
    }

    /// Walks the backtrace starting at `cmd`'s resolved thread. Returns an
    /// empty string if the command carries no thread context, matching the
    /// original's silent `if not command_instance.thread_id: return`.
    /// Per-hop failures are logged and end the walk early rather than
    /// discarding everything collected so far, matching the original's
    /// try/except/finally.
    pub async fn process(&self, cmd: &SingleCommand, opts: RemoteBtOptions) -> ProcessorResult<String> {
        let Some(thread_id) = cmd.thread_id.filter(|t| *t != 0) else {
            return Ok(String::new());
        };
        let gtid = Gtid(u64::try_from(thread_id).unwrap_or(0));

        let (current_sid, current_tid) = self.state.get_sidtid_by_gtid(gtid).await?;
        let mut stack = self.fetch_frames(current_sid, cmd, &format!("-stack-list-frames --thread {}", current_tid.0)).await?;
        tag_frames(&mut stack, current_sid, gtid);

        let mut detector = opts.detect_deadlocks.then(DeadlockDetector::new);
        let mut call_chain: VecDeque<String> = VecDeque::new();

        if let Err(err) = self.walk(gtid, &mut stack, &mut call_chain, detector.as_mut()).await {
            tracing::debug!(error = %err, "error in remote backtrace");
        }

        if let Some(detector) = detector.as_mut() {
            detector.add_call_chain(call_chain);
            if detector.detect() {
                tracing::info!("deadlock detected!");
            }
        }

        Ok(render_stack(&stack))
    }

    async fn walk(
        &self,
        thread_id: Gtid,
        stack: &mut Vec<MiValue>,
        call_chain: &mut VecDeque<String>,
        mut detector: Option<&mut DeadlockDetector>,
    ) -> ProcessorResult<()> {
        let bt_cmd = self.adapter.bt_command_name().to_owned();
        let mut caller = self.fetch_caller_info(thread_id, &bt_cmd).await?;

        let mut hop = 0usize;
        while caller.success && hop < MAX_HOPS {
            hop = hop.saturating_add(1);
            let tag = caller.tag.clone().ok_or_else(|| ProcessorError::Protocol("caller metadata missing a session tag".to_owned()))?;
            let parent_sid = self.state.get_session_by_tag(&tag).await?;
            let mut chosen = *self
                .state
                .get_gtids_by_sid(parent_sid)
                .await?
                .first()
                .ok_or_else(|| ProcessorError::Protocol(format!("session {tag} has no threads")))?;

            {
                let _guard = self.remotebtlock.lock().await;
                if !self.state.is_in_custom_context(parent_sid).await? {
                    self.wait_for_thread_one_to_stop(parent_sid).await?;
                    let ctx_arg = prepare_ctx_switch_args_mi(&caller.caller_ctx);
                    let switch_resp = self.send_to_thread(chosen, &format!("-switch-context-custom {ctx_arg}")).await?;
                    if switch_resp.payload.get("message").and_then(MiValue::as_str) != Some("success") {
                        return Err(ProcessorError::Protocol("context switch was rejected".to_owned()));
                    }
                    let old_ctx = switch_resp
                        .payload
                        .get("old_ctx")
                        .and_then(MiValue::as_map)
                        .map(parse_register_map)
                        .unwrap_or_default();
                    self.state
                        .set_custom_context(parent_sid, ThreadContext { ctx: old_ctx, thread_id: chosen })
                        .await?;
                }
                if let Some(saved) = self.state.get_custom_context(parent_sid).await? {
                    chosen = saved.thread_id;
                }
            }

            let remote_bt_resp = self.send_to_thread(chosen, "-get-remote-bt").await?;
            let frames_resp = self.send_to_thread(chosen, "-stack-list-frames").await?;
            let mut hop_frames = extract_stack(&frames_resp);
            tag_frames(&mut hop_frames, parent_sid, chosen);
            stack.extend(hop_frames);

            if let Some(detector) = detector.as_deref_mut() {
                if let Ok(lock_state) = self.send_to_thread(chosen, "-get-lock-state").await {
                    let (threads, locks) = lock_state_from_payload(&lock_state.payload);
                    detector.add_data(&tag, &threads, &locks);
                }
                call_chain.push_back(format!("{tag}:{}", chosen.0));
            }

            caller = extract_caller_info(&remote_bt_resp, self.adapter);
        }
        Ok(())
    }

    async fn fetch_frames(&self, sid: Sid, cmd: &SingleCommand, wire_cmd: &str) -> ProcessorResult<Vec<MiValue>> {
        let rx = self
            .router
            .send_to_session(sid, cmd.token.clone(), wire_cmd, std::sync::Arc::new(PlainTransformer))
            .await?;
        let mut responses = rx.await.map_err(|_| ProcessorError::Dropped)?;
        let resp = responses.pop().ok_or_else(|| ProcessorError::Protocol("no reply to frame request".to_owned()))?;
        Ok(extract_stack(&resp))
    }

    async fn fetch_caller_info(&self, gtid: Gtid, bt_cmd: &str) -> ProcessorResult<CallerInfo> {
        let resp = self.send_to_thread(gtid, bt_cmd).await?;
        Ok(extract_caller_info(&resp, self.adapter))
    }

    async fn send_to_thread(&self, gtid: Gtid, cmd: &str) -> ProcessorResult<SessionResponse> {
        let (command, token, _origin) = self.router.prepend_token(cmd);
        let rx = self
            .router
            .send_to_thread(gtid, token, &command, std::sync::Arc::new(PlainTransformer))
            .await?;
        let mut responses = rx.await.map_err(|_| ProcessorError::Dropped)?;
        responses.pop().ok_or_else(|| ProcessorError::Protocol("no reply".to_owned()))
    }

    async fn wait_for_thread_one_to_stop(&self, sid: Sid) -> ProcessorResult<()> {
        for _ in 0..50 {
            if self.state.thread_status(sid, LocalTid(1)).await? == ddb_prelude::ThreadStatus::Stopped {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        Err(ProcessorError::Protocol("timed out waiting for thread 1 to stop".to_owned()))
    }
}

fn extract_stack(resp: &SessionResponse) -> Vec<MiValue> {
    resp.payload.get("stack").and_then(MiValue::as_list).map(<[MiValue]>::to_vec).unwrap_or_default()
}

fn tag_frames(frames: &mut [MiValue], sid: Sid, gtid: Gtid) {
    for frame in frames {
        if let MiValue::Map(map) = frame {
            map.insert("session".to_owned(), MiValue::String(sid.0.to_string()));
            map.insert("thread".to_owned(), MiValue::String(gtid.0.to_string()));
        }
    }
}

fn extract_caller_info(resp: &SessionResponse, adapter: &dyn FrameworkAdapter) -> CallerInfo {
    let success = resp.payload.get("message").and_then(MiValue::as_str) == Some("success");
    let metadata = resp.payload.get("metadata").and_then(MiValue::as_map);
    let caller_meta = metadata.and_then(|m| m.get("caller_meta")).and_then(MiValue::as_map);
    let caller_ctx = metadata
        .and_then(|m| m.get("caller_ctx"))
        .and_then(MiValue::as_map)
        .cloned()
        .unwrap_or_default();
    let tag = caller_meta.and_then(|m| {
        let pid: u64 = m.get("pid").and_then(MiValue::as_str)?.parse().ok()?;
        let ip: u32 = m.get("ip").and_then(MiValue::as_str)?.parse().ok()?;
        adapter.extract_tag(pid, ip)
    });
    CallerInfo { success, tag, caller_ctx }
}

/// `prepare_ctx_switch_args`: `"reg=val "` pairs, skipping zero/absent
/// values, in the order the reply listed them.
fn prepare_ctx_switch_args_mi(ctx: &IndexMap<String, MiValue>) -> String {
    ctx.iter()
        .filter_map(|(reg, val)| {
            let v: i64 = val.as_str()?.parse().ok()?;
            (v != 0).then(|| format!("{reg}={v}"))
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Same as [`prepare_ctx_switch_args_mi`] but over a saved, already-parsed
/// register map (used when `-exec-continue` restores a context saved
/// earlier); keys are sorted since a `HashMap` carries no reply order to
/// preserve.
pub(crate) fn prepare_ctx_switch_args_map(ctx: &HashMap<String, i64>) -> String {
    let mut pairs: Vec<(&String, &i64)> = ctx.iter().filter(|(_, v)| **v != 0).collect();
    pairs.sort_unstable_by_key(|(k, _)| k.as_str());
    pairs.into_iter().map(|(reg, val)| format!("{reg}={val}")).collect::<Vec<_>>().join(" ")
}

fn parse_register_map(map: &IndexMap<String, MiValue>) -> HashMap<String, i64> {
    map.iter()
        .filter_map(|(k, v)| Some((k.clone(), v.as_str()?.parse::<i64>().ok()?)))
        .collect()
}

fn lock_state_from_payload(payload: &IndexMap<String, MiValue>) -> (Vec<ThreadLockInfo>, Vec<LockInfo>) {
    let threads = payload
        .get("threads")
        .and_then(MiValue::as_list)
        .map(|list| {
            list.iter()
                .filter_map(|v| {
                    let m = v.as_map()?;
                    let tid: u64 = m.get("tid").and_then(MiValue::as_str)?.parse().ok()?;
                    let wait = m
                        .get("wait")
                        .and_then(MiValue::as_str)
                        .map(|w| vec![(1u8, w.to_owned())])
                        .unwrap_or_default();
                    Some(ThreadLockInfo { tid, wait })
                })
                .collect()
        })
        .unwrap_or_default();
    let locks = payload
        .get("locks")
        .and_then(MiValue::as_list)
        .map(|list| {
            list.iter()
                .filter_map(|v| {
                    let m = v.as_map()?;
                    let lock_id = m.get("id").and_then(MiValue::as_str)?.to_owned();
                    let owner_tid: u64 = m.get("owner").and_then(MiValue::as_str)?.parse().ok()?;
                    Some(LockInfo { lock_id, owner_tid })
                })
                .collect()
        })
        .unwrap_or_default();
    (threads, locks)
}

fn render_stack(stack: &[MiValue]) -> String {
    stack
        .iter()
        .filter_map(MiValue::as_map)
        .map(|frame| {
            let level = frame.get("level").and_then(MiValue::as_str).unwrap_or("?");
            let func = frame.get("func").and_then(MiValue::as_str).unwrap_or("??");
            let file = frame.get("file").and_then(MiValue::as_str).unwrap_or("??");
            let line = frame.get("line").and_then(MiValue::as_str).unwrap_or("?");
            let session = frame.get("session").and_then(MiValue::as_str).unwrap_or("?");
            format!("#{level} {func} at {file}:{line} (session {session})")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use ddb_mi::{MiRecord, MiRecordKind, Stream as RecordStream};
    use ddb_prelude::Sid;

    use crate::adapter::NuAdapter;

    use super::*;

    fn response_with_payload(payload: IndexMap<String, MiValue>) -> SessionResponse {
        SessionResponse::new(
            Sid(1),
            "host-a",
            MiRecord {
                token: None,
                kind: MiRecordKind::Result,
                message: Some("done".to_owned()),
                payload,
                stream: RecordStream::Stdout,
            },
        )
    }

    /// A successful `-get-remote-bt` reply's `{pid, ip}` metadata resolves,
    /// through the Nu adapter, to the exact session tag the router looks
    /// parent sessions up by.
    #[test]
    fn caller_metadata_resolves_to_the_owning_sessions_tag() {
        let mut caller_meta = IndexMap::new();
        caller_meta.insert("pid".to_owned(), MiValue::String("42".to_owned()));
        caller_meta.insert("ip".to_owned(), MiValue::String("2130706433".to_owned()));

        let mut metadata = IndexMap::new();
        metadata.insert("caller_meta".to_owned(), MiValue::Map(caller_meta));
        metadata.insert("caller_ctx".to_owned(), MiValue::Map(IndexMap::new()));

        let mut payload = IndexMap::new();
        payload.insert("message".to_owned(), MiValue::String("success".to_owned()));
        payload.insert("metadata".to_owned(), MiValue::Map(metadata));

        let caller = extract_caller_info(&response_with_payload(payload), &NuAdapter);
        assert!(caller.success);
        assert_eq!(caller.tag.as_deref(), Some("127.0.0.1:-42"));
    }

    /// A reply reporting no caller (`message != "success"`) ends the walk
    /// rather than resolving to a bogus tag.
    #[test]
    fn a_reply_with_no_caller_does_not_resolve_a_tag() {
        let mut payload = IndexMap::new();
        payload.insert("message".to_owned(), MiValue::String("no_caller".to_owned()));

        let caller = extract_caller_info(&response_with_payload(payload), &NuAdapter);
        assert!(!caller.success);
        assert!(caller.tag.is_none());
    }

    #[test]
    fn ctx_switch_args_drop_zero_and_missing_values() {
        let mut ctx = IndexMap::new();
        ctx.insert("rax".to_owned(), MiValue::String("0".to_owned()));
        ctx.insert("rbx".to_owned(), MiValue::String("42".to_owned()));
        assert_eq!(prepare_ctx_switch_args_mi(&ctx), "rbx=42");
    }

    #[test]
    fn saved_ctx_args_are_sorted_for_determinism() {
        let ctx: HashMap<String, i64> = [("rbx".to_owned(), 2), ("rax".to_owned(), 1)].into_iter().collect();
        assert_eq!(prepare_ctx_switch_args_map(&ctx), "rax=1 rbx=2");
    }

    #[test]
    fn renders_one_line_per_frame_with_session_tag() {
        let mut frame = IndexMap::new();
        frame.insert("level".to_owned(), MiValue::String("0".to_owned()));
        frame.insert("func".to_owned(), MiValue::String("main".to_owned()));
        frame.insert("file".to_owned(), MiValue::String("main.c".to_owned()));
        frame.insert("line".to_owned(), MiValue::String("10".to_owned()));
        frame.insert("session".to_owned(), MiValue::String("1".to_owned()));
        let rendered = render_stack(&[MiValue::Map(frame)]);
        assert!(rendered.contains("main.c:10"));
        assert!(rendered.contains("session 1"));
    }
}
