//! Wait-for graph cycle detection for the optional remote-backtrace
//! deadlock check, grounded in
//! `original_source/ddb/iddb/extension/dl_detector.py`'s `DeadlockDetector`.
//! Disabled by default (see [`crate::remote_backtrace::RemoteBtOptions`]):
//! the original scaffolds this in full behind an always-`False` constant,
//! so it's carried here rather than dropped, but never runs unless a
//! caller opts in.

use std::collections::{HashMap, VecDeque};

/// One entry in the wait-for graph: either thread `A` waits on a lock
/// another thread owns (`Lock`), or `A`'s remote-backtrace walk called
/// into thread `B` (`Call`) — matching the original's `type == 1` / `== 2`
/// tags.
#[derive(Debug, Clone)]
enum WaitFor {
    Lock { lock_id: String },
    Call { callee_tag: String },
}

/// Per-thread lock-wait/ownership bookkeeping plus the remote-backtrace
/// call chain, enough to answer "is there a cycle reachable from the
/// starting thread?".
#[derive(Debug, Default)]
pub(crate) struct DeadlockDetector {
    wait_for: HashMap<String, WaitFor>,
    lock_owners: HashMap<String, String>,
    start_thread: Option<String>,
}

/// One thread's lock-wait state, as reported by `-get-lock-state`:
/// `wait` is the set of locks it's blocked on (each `{type, id}`).
pub(crate) struct ThreadLockInfo {
    /// The thread's local tid.
    pub tid: u64,
    /// Lock ids (and their wait-type) this thread is blocked on.
    pub wait: Vec<(u8, String)>,
}

/// One lock's current owner, as reported by `-get-lock-state`.
pub(crate) struct LockInfo {
    /// The lock's id.
    pub lock_id: String,
    /// The local tid of the thread currently holding it.
    pub owner_tid: u64,
}

impl DeadlockDetector {
    /// Creates an empty detector.
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Folds one session's `-get-lock-state` reply into the graph,
    /// namespacing every id with `session_tag` so cross-session ids never
    /// collide.
    pub(crate) fn add_data(&mut self, session_tag: &str, threads: &[ThreadLockInfo], locks: &[LockInfo]) {
        for thread in threads {
            if thread.wait.len() > 1 {
                tracing::debug!(tid = thread.tid, "thread is waiting for multiple locks");
            }
            if let Some((wait_type, lock_id)) = thread.wait.first() {
                let key = format!("{session_tag}:{}", thread.tid);
                let _ = wait_type;
                self.wait_for.insert(
                    key,
                    WaitFor::Lock {
                        lock_id: format!("{session_tag}:{lock_id}"),
                    },
                );
            }
        }
        for lock in locks {
            self.lock_owners.insert(
                format!("{session_tag}:{}", lock.lock_id),
                format!("{session_tag}:{}", lock.owner_tid),
            );
        }
    }

    /// Folds a remote-backtrace call chain (bottom/last-invoked first,
    /// matching the original's `Deque` convention) into the graph as a
    /// sequence of `Call` edges, then records the outermost caller as the
    /// cycle-detection starting point.
    pub(crate) fn add_call_chain(&mut self, mut chain: VecDeque<String>) {
        if chain.len() < 2 {
            return;
        }
        let Some(mut caller) = chain.pop_back() else { return };
        while let Some(callee) = chain.pop_back() {
            if self.wait_for.contains_key(&caller) {
                tracing::debug!(%caller, "wait-for edge already exists, overwriting");
            }
            self.wait_for.insert(caller, WaitFor::Call { callee_tag: callee.clone() });
            caller = callee;
        }
        self.start_thread = Some(caller);
    }

    fn run_cycle_detection(&self, visited: &mut HashMap<String, bool>, thread_tag: &str) -> bool {
        if visited.contains_key(thread_tag) {
            return true;
        }
        visited.insert(thread_tag.to_owned(), true);
        match self.wait_for.get(thread_tag) {
            None => false,
            Some(WaitFor::Lock { lock_id }) => match self.lock_owners.get(lock_id) {
                Some(owner) => self.run_cycle_detection(visited, &owner.clone()),
                None => false,
            },
            Some(WaitFor::Call { callee_tag }) => self.run_cycle_detection(visited, &callee_tag.clone()),
        }
    }

    /// Walks the wait-for graph from the starting thread (the first one
    /// recorded, if `add_call_chain` was never called) looking for a
    /// cycle.
    #[must_use]
    pub(crate) fn detect(&mut self) -> bool {
        if self.start_thread.is_none() {
            self.start_thread = self.wait_for.keys().next().cloned();
        }
        let Some(start) = self.start_thread.clone() else {
            return false;
        };
        let mut visited = HashMap::new();
        self.run_cycle_detection(&mut visited, &start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_no_cycle_in_a_simple_call_chain() {
        let mut d = DeadlockDetector::new();
        let chain: VecDeque<String> = ["a:1".to_owned(), "a:2".to_owned(), "a:3".to_owned()].into();
        d.add_call_chain(chain);
        assert!(!d.detect());
    }

    #[test]
    fn detects_a_cycle_through_lock_ownership() {
        let mut d = DeadlockDetector::new();
        d.add_data(
            "s1",
            &[ThreadLockInfo {
                tid: 1,
                wait: vec![(1, "lockA".to_owned())],
            }],
            &[LockInfo {
                lock_id: "lockA".to_owned(),
                owner_tid: 2,
            }],
        );
        d.add_data(
            "s1",
            &[ThreadLockInfo {
                tid: 2,
                wait: vec![(1, "lockB".to_owned())],
            }],
            &[LockInfo {
                lock_id: "lockB".to_owned(),
                owner_tid: 1,
            }],
        );
        assert!(d.detect());
    }

    #[test]
    fn no_cycle_when_lock_chain_terminates() {
        let mut d = DeadlockDetector::new();
        d.add_data(
            "s1",
            &[ThreadLockInfo {
                tid: 1,
                wait: vec![(1, "lockA".to_owned())],
            }],
            &[LockInfo {
                lock_id: "lockA".to_owned(),
                owner_tid: 2,
            }],
        );
        assert!(!d.detect());
    }
}
