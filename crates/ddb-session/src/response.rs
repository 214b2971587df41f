//! Notify-record dispatch and result-record fan-in, grounded in
//! `response_processor.py`'s `ResponseProcessor.handle_notify`/`handle_result`.
//! Folded into this crate rather than split out, matching spec §4.E: the
//! original is one task draining one queue fed by every session, which we
//! model as one [`ResponseDispatcher`] shared by every session's reader
//! loop instead of a separate crate.

use std::sync::Arc;

use ddb_mi::{MiRecordKind, SessionResponse};
use ddb_prelude::{LocalTgid, LocalTid, Sid, ThreadStatus};
use ddb_state::StateManager;
use ddb_tracker::CommandTracker;

use crate::error::SessionResult;

/// What the caller (the session's reader loop) should do after a record
/// has been dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Nothing further required; keep reading.
    Continue,
    /// The inferior reported exiting (`stopped` with an `exit*` reason).
    /// The caller should tear the session down the same way it would on a
    /// transport error.
    SessionExited,
}

/// Drives state-manager updates from notify/exec-async records and
/// forwards result records into the command tracker's fan-in.
pub struct ResponseDispatcher {
    state: Arc<StateManager>,
    tracker: Arc<CommandTracker>,
}

impl ResponseDispatcher {
    /// Builds a dispatcher over the shared state manager and tracker.
    #[must_use]
    pub fn new(state: Arc<StateManager>, tracker: Arc<CommandTracker>) -> Self {
        Self { state, tracker }
    }

    /// Dispatches one parsed response, matching `ResponseProcessor.process`'s
    /// `type == "notify"` / `type == "result"` split (stream records never
    /// reach here; the reader loop aggregates and forwards them as
    /// synthetic console records before this is called).
    pub async fn dispatch(&self, response: SessionResponse) -> SessionResult<DispatchOutcome> {
        match response.kind {
            MiRecordKind::Result => {
                self.tracker.recv_response(response).await;
                Ok(DispatchOutcome::Continue)
            }
            MiRecordKind::Exec | MiRecordKind::Notify => self.handle_notify(response).await,
            MiRecordKind::Console | MiRecordKind::Output | MiRecordKind::Log => {
                tracing::debug!(?response, "ignoring stray stream record in dispatch");
                Ok(DispatchOutcome::Continue)
            }
        }
    }

    async fn handle_notify(&self, response: SessionResponse) -> SessionResult<DispatchOutcome> {
        let sid = response.sid;
        let Some(message) = response.message.as_deref() else {
            return Ok(DispatchOutcome::Continue);
        };
        let payload = &response.payload;

        match message {
            "thread-created" => {
                let tgid = payload_tgid(payload, "group-id");
                let tid = payload_tid(payload, "id");
                if let (Some(tgid), Some(tid)) = (tgid, tid) {
                    let (gtid, giid) = self.state.create_thread(sid, tid, tgid).await?;
                    tracing::info!(?sid, ?tgid, ?tid, ?gtid, ?giid, "thread created");
                }
            }
            "thread-exited" => {
                if let Some(tid) = payload_tid(payload, "id") {
                    let gtid = self.state.get_gtid(sid, tid).await.ok();
                    self.state.remove_thread(sid, tid).await?;
                    tracing::info!(?sid, ?tid, ?gtid, "thread exited");
                }
            }
            "running" => {
                self.apply_thread_id_field(sid, payload, "thread-id", ThreadStatus::Running)
                    .await?;
            }
            "stopped" => {
                return self.handle_stopped(sid, payload).await;
            }
            "thread-group-added" => {
                if let Some(tgid) = payload_tgid(payload, "id") {
                    let giid = self.state.add_thread_group(sid, tgid).await?;
                    tracing::info!(?sid, ?tgid, ?giid, "thread group added");
                }
            }
            "thread-group-removed" => {
                if let Some(tgid) = payload_tgid(payload, "id") {
                    let giid = self.state.remove_thread_group(sid, tgid).await?;
                    tracing::info!(?sid, ?tgid, ?giid, "thread group removed");
                }
            }
            "thread-group-started" => {
                if let Some(tgid) = payload_tgid(payload, "id") {
                    let pid = payload
                        .get("pid")
                        .and_then(ddb_mi::MiValue::as_str)
                        .and_then(|s| s.parse::<u64>().ok())
                        .unwrap_or(0);
                    self.state.start_thread_group(sid, tgid, pid).await?;
                    tracing::info!(?sid, ?tgid, pid, "thread group started");
                }
            }
            "thread-group-exited" => {
                if let Some(tgid) = payload_tgid(payload, "id") {
                    let giid = self.state.exit_thread_group(sid, tgid).await?;
                    tracing::info!(?sid, ?tgid, ?giid, "thread group exited");
                }
            }
            other => {
                tracing::debug!(?sid, message = other, "ignoring this notify record for now");
            }
        }
        Ok(DispatchOutcome::Continue)
    }

    async fn handle_stopped(
        &self,
        sid: Sid,
        payload: &indexmap::IndexMap<String, ddb_mi::MiValue>,
    ) -> SessionResult<DispatchOutcome> {
        let reason = payload.get("reason").and_then(ddb_mi::MiValue::as_str);
        if reason.is_some_and(|r| r.contains("exit")) {
            return Ok(DispatchOutcome::SessionExited);
        }

        if let Some(thread_id) = payload.get("thread-id").and_then(ddb_mi::MiValue::as_str) {
            if thread_id == "all" {
                self.state.update_all_thread_status(sid, ThreadStatus::Stopped).await?;
            } else if let Ok(tid) = thread_id.parse::<u64>() {
                let tid = LocalTid(tid);
                self.state.update_thread_status(sid, tid, ThreadStatus::Stopped).await?;
                // All-stop mode: the thread that hit a breakpoint becomes
                // the globally selected one automatically.
                if reason == Some("breakpoint-hit") {
                    self.state.set_current_tid(sid, tid).await?;
                    let gtid = self.state.get_gtid(sid, tid).await?;
                    self.state.set_current_gthread(gtid).await;
                }
            }

            match payload.get("stopped-threads") {
                Some(ddb_mi::MiValue::String(s)) if s == "all" => {
                    self.state.update_all_thread_status(sid, ThreadStatus::Stopped).await?;
                }
                Some(ddb_mi::MiValue::List(items)) => {
                    for item in items {
                        if let Some(tid) = item.as_str().and_then(|s| s.parse::<u64>().ok()) {
                            self.state
                                .update_thread_status(sid, LocalTid(tid), ThreadStatus::Stopped)
                                .await?;
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(DispatchOutcome::Continue)
    }

    async fn apply_thread_id_field(
        &self,
        sid: Sid,
        payload: &indexmap::IndexMap<String, ddb_mi::MiValue>,
        key: &str,
        status: ThreadStatus,
    ) -> SessionResult<()> {
        let Some(thread_id) = payload.get(key).and_then(ddb_mi::MiValue::as_str) else {
            return Ok(());
        };
        if thread_id == "all" {
            self.state.update_all_thread_status(sid, status).await?;
        } else if let Ok(tid) = thread_id.parse::<u64>() {
            self.state.update_thread_status(sid, LocalTid(tid), status).await?;
        }
        Ok(())
    }
}

/// GDB's thread-group ids are wire-formatted as `"i1"`, `"i2"`, ... ; we
/// represent [`LocalTgid`] as the bare numeric suffix.
fn payload_tgid(payload: &indexmap::IndexMap<String, ddb_mi::MiValue>, key: &str) -> Option<LocalTgid> {
    let raw = payload.get(key).and_then(ddb_mi::MiValue::as_str)?;
    let digits = raw.strip_prefix('i').unwrap_or(raw);
    digits.parse::<u64>().ok().map(LocalTgid)
}

fn payload_tid(payload: &indexmap::IndexMap<String, ddb_mi::MiValue>, key: &str) -> Option<LocalTid> {
    payload
        .get(key)
        .and_then(ddb_mi::MiValue::as_str)
        .and_then(|s| s.parse::<u64>().ok())
        .map(LocalTid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddb_mi::{MiRecord, MiRecordKind, MiValue, Stream};
    use ddb_state::StateManager;
    use ddb_tracker::CommandTracker;
    use indexmap::IndexMap;

    fn record(kind: MiRecordKind, message: &str, payload: IndexMap<String, MiValue>) -> SessionResponse {
        SessionResponse::new(
            Sid(1),
            "tag",
            MiRecord {
                kind,
                message: Some(message.to_owned()),
                payload,
                token: None,
                stream: Stream::Stdout,
            },
        )
    }

    async fn dispatcher() -> (ResponseDispatcher, Arc<StateManager>) {
        let state = Arc::new(StateManager::new());
        state.register_session(Sid(1), "tag").await;
        let tracker = Arc::new(CommandTracker::new());
        (ResponseDispatcher::new(state.clone(), tracker), state)
    }

    #[tokio::test]
    async fn thread_group_added_then_thread_created_assigns_global_ids() {
        let (d, state) = dispatcher().await;
        let mut p = IndexMap::new();
        p.insert("id".to_owned(), MiValue::String("i1".to_owned()));
        d.dispatch(record(MiRecordKind::Notify, "thread-group-added", p))
            .await
            .unwrap();

        let mut p = IndexMap::new();
        p.insert("id".to_owned(), MiValue::String("1".to_owned()));
        p.insert("group-id".to_owned(), MiValue::String("i1".to_owned()));
        d.dispatch(record(MiRecordKind::Notify, "thread-created", p))
            .await
            .unwrap();

        assert!(state.get_gtid(Sid(1), LocalTid(1)).await.is_ok());
    }

    #[tokio::test]
    async fn stopped_with_exit_reason_signals_session_exited() {
        let (d, _state) = dispatcher().await;
        let mut p = IndexMap::new();
        p.insert("reason".to_owned(), MiValue::String("exited-normally".to_owned()));
        let outcome = d
            .dispatch(record(MiRecordKind::Exec, "stopped", p))
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::SessionExited);
    }

    #[tokio::test]
    async fn breakpoint_hit_selects_the_stopped_thread_globally() {
        let (d, state) = dispatcher().await;
        let mut p = IndexMap::new();
        p.insert("id".to_owned(), MiValue::String("i1".to_owned()));
        d.dispatch(record(MiRecordKind::Notify, "thread-group-added", p))
            .await
            .unwrap();
        let mut p = IndexMap::new();
        p.insert("id".to_owned(), MiValue::String("1".to_owned()));
        p.insert("group-id".to_owned(), MiValue::String("i1".to_owned()));
        d.dispatch(record(MiRecordKind::Notify, "thread-created", p))
            .await
            .unwrap();

        let mut p = IndexMap::new();
        p.insert("reason".to_owned(), MiValue::String("breakpoint-hit".to_owned()));
        p.insert("thread-id".to_owned(), MiValue::String("1".to_owned()));
        p.insert("stopped-threads".to_owned(), MiValue::String("all".to_owned()));
        d.dispatch(record(MiRecordKind::Exec, "stopped", p))
            .await
            .unwrap();

        assert_eq!(state.get_current_tid(Sid(1)).await.unwrap(), Some(LocalTid(1)));
        assert!(state.get_current_gthread().await.is_some());
    }

    #[tokio::test]
    async fn result_records_are_forwarded_to_the_tracker_not_handled_as_notify() {
        let (d, _state) = dispatcher().await;
        let response = record(MiRecordKind::Result, "done", IndexMap::new());
        let outcome = d.dispatch(response).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Continue);
    }
}
