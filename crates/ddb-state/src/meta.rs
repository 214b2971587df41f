//! Per-session bookkeeping, grounded in
//! `original_source/py_testing/state_manager.py`'s `SessionMeta`.

use std::collections::{HashMap, HashSet};

use ddb_prelude::{Gtid, LocalTgid, LocalTid, ThreadGroupStatus, ThreadStatus};

use crate::error::{StateError, StateResult};

/// A saved register context for a session temporarily steered onto another
/// thread's stack during a remote backtrace walk, matching
/// `GdbSession.current_context`/`ThreadContext` in `cmd_processor.py`.
#[derive(Debug, Clone)]
pub struct ThreadContext {
    /// Register name → saved value, as returned by `-switch-context-custom`'s
    /// `old_ctx` field.
    pub ctx: HashMap<String, i64>,
    /// The global thread id the context was switched to reach.
    pub thread_id: Gtid,
}

/// Tables owned by one session: thread and thread-group lifecycle state,
/// and the per-inferior thread numbering GDB's own `1.2`-style ids use.
#[derive(Debug, Default)]
pub(crate) struct SessionMeta {
    pub(crate) tag: String,
    pub(crate) current_tid: Option<LocalTid>,
    thread_status: HashMap<LocalTid, ThreadStatus>,
    /// `tid` → its 1-based ordinal within its thread group, matching the
    /// original's `tid_to_per_inferior_tid`.
    tid_to_per_inferior_tid: HashMap<LocalTid, u64>,
    thread_to_group: HashMap<LocalTid, LocalTgid>,
    group_to_threads: HashMap<LocalTgid, HashSet<LocalTid>>,
    group_status: HashMap<LocalTgid, ThreadGroupStatus>,
    group_to_pid: HashMap<LocalTgid, u64>,
    pub(crate) in_custom_context: bool,
    pub(crate) current_context: Option<ThreadContext>,
}

impl SessionMeta {
    pub(crate) fn new(tag: String) -> Self {
        Self {
            tag,
            ..Self::default()
        }
    }

    pub(crate) fn add_thread_group(&mut self, tgid: LocalTgid) {
        self.group_to_threads.entry(tgid).or_default();
        self.group_status.insert(tgid, ThreadGroupStatus::Created);
    }

    pub(crate) fn start_thread_group(&mut self, tgid: LocalTgid, pid: u64) {
        self.group_status.insert(tgid, ThreadGroupStatus::Running);
        self.group_to_pid.insert(tgid, pid);
    }

    /// Marks the group exited and drops all of its threads, returning the
    /// dropped thread ids so callers can release their global ids too.
    pub(crate) fn exit_thread_group(&mut self, tgid: LocalTgid) -> StateResult<Vec<LocalTid>> {
        self.group_status.insert(tgid, ThreadGroupStatus::Exited);
        let threads = self
            .group_to_threads
            .get_mut(&tgid)
            .ok_or_else(|| StateError::UnknownThreadGroup(format!("{tgid:?}")))?;
        let removed: Vec<LocalTid> = threads.drain().collect();
        for tid in &removed {
            self.thread_to_group.remove(tid);
            self.thread_status.remove(tid);
            self.tid_to_per_inferior_tid.remove(tid);
        }
        Ok(removed)
    }

    /// Drops the group entirely (its own `thread-group-removed`, distinct
    /// from `exit_thread_group`'s `thread-group-exited`), returning the
    /// threads it still held so callers can release their global ids.
    pub(crate) fn remove_thread_group(&mut self, tgid: LocalTgid) -> StateResult<Vec<LocalTid>> {
        let threads = self
            .group_to_threads
            .remove(&tgid)
            .ok_or_else(|| StateError::UnknownThreadGroup(format!("{tgid:?}")))?;
        self.group_status.remove(&tgid);
        self.group_to_pid.remove(&tgid);
        for tid in &threads {
            self.thread_to_group.remove(tid);
            self.thread_status.remove(tid);
            self.tid_to_per_inferior_tid.remove(tid);
        }
        Ok(threads.into_iter().collect())
    }

    pub(crate) fn create_thread(&mut self, tid: LocalTid, tgid: LocalTgid) -> StateResult<()> {
        let group = self
            .group_to_threads
            .get(&tgid)
            .ok_or_else(|| StateError::UnknownThreadGroup(format!("{tgid:?}")))?;
        let ordinal = u64::try_from(group.len()).unwrap_or(u64::MAX).saturating_add(1);
        self.thread_status.insert(tid, ThreadStatus::Running);
        self.thread_to_group.insert(tid, tgid);
        self.tid_to_per_inferior_tid.insert(tid, ordinal);
        self.group_to_threads.entry(tgid).or_default().insert(tid);
        Ok(())
    }

    pub(crate) fn remove_thread(&mut self, tid: LocalTid) -> StateResult<()> {
        let tgid = self
            .thread_to_group
            .remove(&tid)
            .ok_or_else(|| StateError::UnknownThread(format!("{tid:?}")))?;
        if let Some(threads) = self.group_to_threads.get_mut(&tgid) {
            threads.remove(&tid);
        }
        self.thread_status.remove(&tid);
        self.tid_to_per_inferior_tid.remove(&tid);
        Ok(())
    }

    pub(crate) fn update_t_status(&mut self, tid: LocalTid, status: ThreadStatus) -> StateResult<()> {
        let slot = self
            .thread_status
            .get_mut(&tid)
            .ok_or_else(|| StateError::UnknownThread(format!("{tid:?}")))?;
        *slot = status;
        Ok(())
    }

    pub(crate) fn update_all_status(&mut self, status: ThreadStatus) {
        for slot in self.thread_status.values_mut() {
            *slot = status;
        }
    }

    pub(crate) fn set_current_tid(&mut self, tid: LocalTid) {
        self.current_tid = Some(tid);
    }

    pub(crate) fn thread_group_of(&self, tid: LocalTid) -> StateResult<LocalTgid> {
        self.thread_to_group
            .get(&tid)
            .copied()
            .ok_or_else(|| StateError::UnknownThread(format!("{tid:?}")))
    }

    pub(crate) fn per_inferior_tid(&self, tid: LocalTid) -> StateResult<u64> {
        self.tid_to_per_inferior_tid
            .get(&tid)
            .copied()
            .ok_or_else(|| StateError::UnknownThread(format!("{tid:?}")))
    }

    pub(crate) fn thread_ids(&self) -> Vec<LocalTid> {
        self.thread_status.keys().copied().collect()
    }

    pub(crate) fn has_running_thread(&self) -> bool {
        self.thread_status.values().any(|s| *s == ThreadStatus::Running)
    }

    pub(crate) fn thread_status(&self, tid: LocalTid) -> StateResult<ThreadStatus> {
        self.thread_status
            .get(&tid)
            .copied()
            .ok_or_else(|| StateError::UnknownThread(format!("{tid:?}")))
    }
}
