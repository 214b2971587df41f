//! The aggregator's id-translation and lifecycle tables, grounded in
//! `original_source/py_testing/state_manager.py`'s `StateManager` (the
//! `sidtid_to_gtid`/`gtid_to_sidtid`/`sidtgid_to_giid`/`giid_to_sidtgid`
//! bijections and the thread/thread-group lifecycle calls that feed them).

use std::collections::HashMap;

use ddb_prelude::{Counter, Giid, Gtid, LocalTgid, LocalTid, Sid, ThreadStatus};
use tokio::sync::RwLock;

use crate::error::{StateError, StateResult};
use crate::meta::SessionMeta;
pub use crate::meta::ThreadContext;

#[derive(Default)]
struct Tables {
    sessions: HashMap<Sid, SessionMeta>,
    tag_to_sid: HashMap<String, Sid>,
    sidtid_to_gtid: HashMap<(Sid, LocalTid), Gtid>,
    gtid_to_sidtid: HashMap<Gtid, (Sid, LocalTid)>,
    sidtgid_to_giid: HashMap<(Sid, LocalTgid), Giid>,
    giid_to_sidtgid: HashMap<Giid, (Sid, LocalTgid)>,
}

/// Holds every cross-session translation table plus per-session thread
/// bookkeeping, behind one [`tokio::sync::RwLock`] since translation reads
/// vastly outnumber the mutations that create or tear down sessions and
/// threads.
pub struct StateManager {
    tables: RwLock<Tables>,
    current_session: RwLock<Option<Sid>>,
    selected_gthread: RwLock<Option<Gtid>>,
    next_gtid: Counter,
    next_giid: Counter,
}

impl StateManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            current_session: RwLock::new(None),
            selected_gthread: RwLock::new(None),
            next_gtid: Counter::new(),
            next_giid: Counter::new(),
        }
    }

    /// Registers a freshly started session under `tag` (typically
    /// `"<ip>:-<pid>"`).
    pub async fn register_session(&self, sid: Sid, tag: impl Into<String>) {
        let tag = tag.into();
        let mut tables = self.tables.write().await;
        tables.tag_to_sid.insert(tag.clone(), sid);
        tables.sessions.insert(sid, SessionMeta::new(tag));
    }

    /// Removes a session and every translation entry for its threads.
    pub async fn remove_session(&self, sid: Sid) -> StateResult<()> {
        let mut tables = self.tables.write().await;
        let meta = tables
            .sessions
            .remove(&sid)
            .ok_or_else(|| StateError::UnknownSession(format!("{sid:?}")))?;
        tables.tag_to_sid.remove(&meta.tag);

        let stale_gtid_keys: Vec<(Sid, LocalTid)> = tables
            .sidtid_to_gtid
            .keys()
            .filter(|(s, _)| *s == sid)
            .copied()
            .collect();
        let mut removed_gtids = Vec::with_capacity(stale_gtid_keys.len());
        for key in stale_gtid_keys {
            if let Some(gtid) = tables.sidtid_to_gtid.remove(&key) {
                tables.gtid_to_sidtid.remove(&gtid);
                removed_gtids.push(gtid);
            }
        }

        let stale_giid_keys: Vec<(Sid, LocalTgid)> = tables
            .sidtgid_to_giid
            .keys()
            .filter(|(s, _)| *s == sid)
            .copied()
            .collect();
        for key in stale_giid_keys {
            if let Some(giid) = tables.sidtgid_to_giid.remove(&key) {
                tables.giid_to_sidtgid.remove(&giid);
            }
        }
        drop(tables);
        self.clear_selected_gthread_if_removed(&removed_gtids).await;
        Ok(())
    }

    /// Registers a new thread group under `sid`, minting its global id.
    pub async fn add_thread_group(&self, sid: Sid, tgid: LocalTgid) -> StateResult<Giid> {
        let giid = Giid(self.next_giid.increment());
        let mut tables = self.tables.write().await;
        tables
            .sessions
            .get_mut(&sid)
            .ok_or_else(|| StateError::UnknownSession(format!("{sid:?}")))?
            .add_thread_group(tgid);
        tables.sidtgid_to_giid.insert((sid, tgid), giid);
        tables.giid_to_sidtgid.insert(giid, (sid, tgid));
        Ok(giid)
    }

    /// Marks a thread group running, recording the pid GDB reported for it.
    pub async fn start_thread_group(&self, sid: Sid, tgid: LocalTgid, pid: u64) -> StateResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .sessions
            .get_mut(&sid)
            .ok_or_else(|| StateError::UnknownSession(format!("{sid:?}")))?
            .start_thread_group(tgid, pid);
        Ok(())
    }

    /// Marks a thread group exited, releasing every thread (and its global
    /// id) that belonged to it. Returns the group's global id.
    pub async fn exit_thread_group(&self, sid: Sid, tgid: LocalTgid) -> StateResult<Giid> {
        let mut tables = self.tables.write().await;
        let removed_tids = tables
            .sessions
            .get_mut(&sid)
            .ok_or_else(|| StateError::UnknownSession(format!("{sid:?}")))?
            .exit_thread_group(tgid)?;
        let mut removed_gtids = Vec::with_capacity(removed_tids.len());
        for tid in removed_tids {
            if let Some(gtid) = tables.sidtid_to_gtid.remove(&(sid, tid)) {
                tables.gtid_to_sidtid.remove(&gtid);
                removed_gtids.push(gtid);
            }
        }
        let giid = tables
            .sidtgid_to_giid
            .get(&(sid, tgid))
            .copied()
            .ok_or_else(|| StateError::UnknownThreadGroup(format!("{tgid:?}")));
        drop(tables);
        self.clear_selected_gthread_if_removed(&removed_gtids).await;
        giid
    }

    /// Removes a thread group outright (`thread-group-removed`, distinct
    /// from [`Self::exit_thread_group`]'s `thread-group-exited`), releasing
    /// every thread's global id and the group's own global id. Returns the
    /// group's global id.
    pub async fn remove_thread_group(&self, sid: Sid, tgid: LocalTgid) -> StateResult<Giid> {
        let mut tables = self.tables.write().await;
        let removed_tids = tables
            .sessions
            .get_mut(&sid)
            .ok_or_else(|| StateError::UnknownSession(format!("{sid:?}")))?
            .remove_thread_group(tgid)?;
        let mut removed_gtids = Vec::with_capacity(removed_tids.len());
        for tid in removed_tids {
            if let Some(gtid) = tables.sidtid_to_gtid.remove(&(sid, tid)) {
                tables.gtid_to_sidtid.remove(&gtid);
                removed_gtids.push(gtid);
            }
        }
        let giid = tables
            .sidtgid_to_giid
            .remove(&(sid, tgid))
            .ok_or_else(|| StateError::UnknownThreadGroup(format!("{tgid:?}")))?;
        tables.giid_to_sidtgid.remove(&giid);
        drop(tables);
        self.clear_selected_gthread_if_removed(&removed_gtids).await;
        Ok(giid)
    }

    /// Registers a new thread under `tgid`, minting its global id.
    pub async fn create_thread(&self, sid: Sid, tid: LocalTid, tgid: LocalTgid) -> StateResult<(Gtid, Giid)> {
        let gtid = Gtid(self.next_gtid.increment());
        let mut tables = self.tables.write().await;
        tables
            .sessions
            .get_mut(&sid)
            .ok_or_else(|| StateError::UnknownSession(format!("{sid:?}")))?
            .create_thread(tid, tgid)?;
        tables.sidtid_to_gtid.insert((sid, tid), gtid);
        tables.gtid_to_sidtid.insert(gtid, (sid, tid));
        let giid = tables
            .sidtgid_to_giid
            .get(&(sid, tgid))
            .copied()
            .ok_or_else(|| StateError::UnknownThreadGroup(format!("{tgid:?}")))?;
        Ok((gtid, giid))
    }

    /// Drops a thread and its global id, but leaves its thread group alone.
    pub async fn remove_thread(&self, sid: Sid, tid: LocalTid) -> StateResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .sessions
            .get_mut(&sid)
            .ok_or_else(|| StateError::UnknownSession(format!("{sid:?}")))?
            .remove_thread(tid)?;
        let removed_gtid = tables.sidtid_to_gtid.remove(&(sid, tid));
        if let Some(gtid) = removed_gtid {
            tables.gtid_to_sidtid.remove(&gtid);
        }
        drop(tables);
        if let Some(gtid) = removed_gtid {
            self.clear_selected_gthread_if_removed(&[gtid]).await;
        }
        Ok(())
    }

    /// Updates one thread's run state.
    pub async fn update_thread_status(&self, sid: Sid, tid: LocalTid, status: ThreadStatus) -> StateResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .sessions
            .get_mut(&sid)
            .ok_or_else(|| StateError::UnknownSession(format!("{sid:?}")))?
            .update_t_status(tid, status)
    }

    /// Updates every thread in `sid` to `status` (e.g. a session-wide `running`).
    pub async fn update_all_thread_status(&self, sid: Sid, status: ThreadStatus) -> StateResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .sessions
            .get_mut(&sid)
            .ok_or_else(|| StateError::UnknownSession(format!("{sid:?}")))?
            .update_all_status(status);
        Ok(())
    }

    /// Sets the given session's locally-selected thread.
    pub async fn set_current_tid(&self, sid: Sid, tid: LocalTid) -> StateResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .sessions
            .get_mut(&sid)
            .ok_or_else(|| StateError::UnknownSession(format!("{sid:?}")))?
            .set_current_tid(tid);
        Ok(())
    }

    /// Returns the given session's locally-selected thread, if any.
    pub async fn get_current_tid(&self, sid: Sid) -> StateResult<Option<LocalTid>> {
        let tables = self.tables.read().await;
        Ok(tables
            .sessions
            .get(&sid)
            .ok_or_else(|| StateError::UnknownSession(format!("{sid:?}")))?
            .current_tid)
    }

    /// Sets the aggregator-wide selected global thread.
    pub async fn set_current_gthread(&self, gtid: Gtid) {
        *self.selected_gthread.write().await = Some(gtid);
    }

    /// Returns the aggregator-wide selected global thread, if any.
    pub async fn get_current_gthread(&self) -> Option<Gtid> {
        *self.selected_gthread.read().await
    }

    /// Clears the selected global thread if it's one of `removed`, keeping
    /// `selected_gthread`'s "always a live gtid, if set" invariant intact
    /// across every thread-removal path (thread exit, thread-group exit or
    /// removal, session removal).
    async fn clear_selected_gthread_if_removed(&self, removed: &[Gtid]) {
        if removed.is_empty() {
            return;
        }
        let mut selected = self.selected_gthread.write().await;
        if selected.is_some_and(|gtid| removed.contains(&gtid)) {
            *selected = None;
        }
    }

    /// Sets the aggregator-wide selected session (used by `--session`-less
    /// commands with no explicit target).
    pub async fn set_current_session(&self, sid: Sid) {
        *self.current_session.write().await = Some(sid);
    }

    /// Returns the aggregator-wide selected session, if any.
    pub async fn get_current_session(&self) -> Option<Sid> {
        *self.current_session.read().await
    }

    /// Translates `(sid, tid)` → global thread id.
    pub async fn get_gtid(&self, sid: Sid, tid: LocalTid) -> StateResult<Gtid> {
        self.tables
            .read()
            .await
            .sidtid_to_gtid
            .get(&(sid, tid))
            .copied()
            .ok_or_else(|| StateError::UnknownThread(format!("{tid:?} in {sid:?}")))
    }

    /// Translates `(sid, tgid)` → global inferior id.
    pub async fn get_giid(&self, sid: Sid, tgid: LocalTgid) -> StateResult<Giid> {
        self.tables
            .read()
            .await
            .sidtgid_to_giid
            .get(&(sid, tgid))
            .copied()
            .ok_or_else(|| StateError::UnknownThreadGroup(format!("{tgid:?} in {sid:?}")))
    }

    /// Translates a global thread id back to its owning `(sid, tid)`.
    pub async fn get_sidtid_by_gtid(&self, gtid: Gtid) -> StateResult<(Sid, LocalTid)> {
        self.tables
            .read()
            .await
            .gtid_to_sidtid
            .get(&gtid)
            .copied()
            .ok_or_else(|| StateError::UnknownGtid(format!("{gtid:?}")))
    }

    /// Translates a global inferior id back to its owning `(sid, tgid)`.
    pub async fn get_sidtgid_by_giid(&self, giid: Giid) -> StateResult<(Sid, LocalTgid)> {
        self.tables
            .read()
            .await
            .giid_to_sidtgid
            .get(&giid)
            .copied()
            .ok_or_else(|| StateError::UnknownGiid(format!("{giid:?}")))
    }

    /// Returns a session's discovery tag (`"<ip>:-<pid>"`), the inverse of
    /// [`Self::get_session_by_tag`].
    pub async fn get_session_tag(&self, sid: Sid) -> StateResult<String> {
        let tables = self.tables.read().await;
        Ok(tables
            .sessions
            .get(&sid)
            .ok_or_else(|| StateError::UnknownSession(format!("{sid:?}")))?
            .tag
            .clone())
    }

    /// Looks a session up by its discovery tag (`"<ip>:-<pid>"`).
    pub async fn get_session_by_tag(&self, tag: &str) -> StateResult<Sid> {
        self.tables
            .read()
            .await
            .tag_to_sid
            .get(tag)
            .copied()
            .ok_or_else(|| StateError::UnknownTag(tag.to_owned()))
    }

    /// Lists every global thread id currently owned by `sid`.
    pub async fn get_gtids_by_sid(&self, sid: Sid) -> StateResult<Vec<Gtid>> {
        let tables = self.tables.read().await;
        tables
            .sessions
            .get(&sid)
            .ok_or_else(|| StateError::UnknownSession(format!("{sid:?}")))?;
        Ok(tables
            .sidtid_to_gtid
            .iter()
            .filter(|((s, _), _)| *s == sid)
            .map(|(_, gtid)| *gtid)
            .collect())
    }

    /// Builds the human-readable `"<giid>.<per-inferior-tid>"` form GDB
    /// itself would print for this thread (e.g. `"1.2"`).
    pub async fn get_readable_gtid(&self, sid: Sid, tid: LocalTid) -> StateResult<String> {
        let tables = self.tables.read().await;
        let meta = tables
            .sessions
            .get(&sid)
            .ok_or_else(|| StateError::UnknownSession(format!("{sid:?}")))?;
        let tgid = meta.thread_group_of(tid)?;
        let giid = tables
            .sidtgid_to_giid
            .get(&(sid, tgid))
            .copied()
            .ok_or_else(|| StateError::UnknownThreadGroup(format!("{tgid:?}")))?;
        let ordinal = meta.per_inferior_tid(tid)?;
        Ok(format!("{giid}.{ordinal}"))
    }

    /// Same as [`Self::get_readable_gtid`] but keyed by the global thread id.
    pub async fn get_readable_tid_by_gtid(&self, gtid: Gtid) -> StateResult<String> {
        let (sid, tid) = self.get_sidtid_by_gtid(gtid).await?;
        self.get_readable_gtid(sid, tid).await
    }

    /// Lists every registered session, in no particular order.
    pub async fn session_ids(&self) -> Vec<Sid> {
        self.tables.read().await.sessions.keys().copied().collect()
    }

    /// A session's single run state, matching `update_thread_status`'s
    /// granularity (used by the interrupt handler to pick a target).
    pub async fn thread_status(&self, sid: Sid, tid: LocalTid) -> StateResult<ThreadStatus> {
        let tables = self.tables.read().await;
        tables
            .sessions
            .get(&sid)
            .ok_or_else(|| StateError::UnknownSession(format!("{sid:?}")))?
            .thread_status(tid)
    }

    /// Whether any thread in `sid` is currently `Running`, matching
    /// `InterruptCmdHandler`'s scan over `session.t_status.values()`.
    pub async fn has_running_thread(&self, sid: Sid) -> StateResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .sessions
            .get(&sid)
            .ok_or_else(|| StateError::UnknownSession(format!("{sid:?}")))?
            .has_running_thread())
    }

    /// Whether `sid` currently has its registers steered onto another
    /// thread's stack (`GdbSession.in_custom_context`).
    pub async fn is_in_custom_context(&self, sid: Sid) -> StateResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .sessions
            .get(&sid)
            .ok_or_else(|| StateError::UnknownSession(format!("{sid:?}")))?
            .in_custom_context)
    }

    /// Records that `sid` switched onto `context`'s thread, so the old
    /// registers can later be restored.
    pub async fn set_custom_context(&self, sid: Sid, context: ThreadContext) -> StateResult<()> {
        let mut tables = self.tables.write().await;
        let meta = tables
            .sessions
            .get_mut(&sid)
            .ok_or_else(|| StateError::UnknownSession(format!("{sid:?}")))?;
        meta.in_custom_context = true;
        meta.current_context = Some(context);
        Ok(())
    }

    /// Returns `sid`'s saved custom context, if it has one.
    pub async fn get_custom_context(&self, sid: Sid) -> StateResult<Option<ThreadContext>> {
        let tables = self.tables.read().await;
        Ok(tables
            .sessions
            .get(&sid)
            .ok_or_else(|| StateError::UnknownSession(format!("{sid:?}")))?
            .current_context
            .clone())
    }

    /// Clears `sid`'s custom-context flag once its registers are restored.
    pub async fn clear_custom_context(&self, sid: Sid) -> StateResult<()> {
        let mut tables = self.tables.write().await;
        let meta = tables
            .sessions
            .get_mut(&sid)
            .ok_or_else(|| StateError::UnknownSession(format!("{sid:?}")))?;
        meta.in_custom_context = false;
        meta.current_context = None;
        Ok(())
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}
