//! `CommandTracker`, grounded in `cmd_tracker.py`'s `CmdTracker`: the
//! `waiting_cmds`/`finished_cmds` two-map design, `dedupToken`, and
//! `recv_response`'s outbound→origin token rewrite — reshaped around a
//! `oneshot` channel per command instead of an awaited `asyncio.Future`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use ddb_mi::SessionResponse;
use ddb_prelude::{Counter, Sid, Token};
use tokio::sync::{oneshot, Mutex};

use crate::meta::CmdMeta;
use crate::transformer::ResponseTransformer;

struct Pending {
    meta: CmdMeta,
    completion: oneshot::Sender<Vec<SessionResponse>>,
}

/// Tracks every outstanding command, fanning session replies in until each
/// command's full target set has answered.
pub struct CommandTracker {
    waiting: Mutex<HashMap<Token, Pending>>,
    finished: Mutex<HashMap<Token, CmdMeta>>,
    out_token_to_in_token: StdMutex<HashMap<Token, Token>>,
    token_counter: Counter,
}

impl CommandTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self {
            waiting: Mutex::new(HashMap::new()),
            finished: Mutex::new(HashMap::new()),
            out_token_to_in_token: StdMutex::new(HashMap::new()),
            token_counter: Counter::new(),
        }
    }

    /// Returns `token` if it's not already in flight as an outbound token,
    /// otherwise mints a fresh one — matching `dedupToken`'s loop against
    /// `outTokenToInToken`. Either way, records `outbound → token` so
    /// [`Self::recv_response`] can later rewrite replies back to the
    /// caller's original token.
    pub fn dedup_token(&self, token: Token) -> Token {
        let mut map = self.out_token_to_in_token.lock().expect("tracker token map poisoned");
        let mut candidate = token.clone();
        while map.contains_key(&candidate) {
            candidate = self.token_counter.next_token();
        }
        map.insert(candidate.clone(), token);
        candidate
    }

    /// Registers a new outstanding command under `outbound_token` (the
    /// token actually written to the wire, post-[`Self::dedup_token`]),
    /// returning a receiver that resolves once every session in
    /// `target_sessions` has replied.
    pub async fn create_cmd(
        &self,
        outbound_token: Token,
        command: String,
        target_sessions: HashSet<Sid>,
        transformer: Arc<dyn ResponseTransformer>,
    ) -> oneshot::Receiver<Vec<SessionResponse>> {
        let (tx, rx) = oneshot::channel();
        let meta = CmdMeta::new(outbound_token.clone(), command, target_sessions, transformer);
        self.waiting
            .lock()
            .await
            .insert(outbound_token, Pending { meta, completion: tx });
        rx
    }

    /// Feeds one parsed reply to its command's fan-in record. If this was
    /// the last session the command was waiting on, removes it from the
    /// waiting table, rewrites every collected response's token back to
    /// the caller's original token, stores the completed record under
    /// [`Self::finished`], and fires the completion channel.
    pub async fn recv_response(&self, response: SessionResponse) {
        let Some(token) = response.token.clone() else {
            tracing::debug!("response carries no token, skipping tracker dispatch");
            return;
        };

        let mut waiting = self.waiting.lock().await;
        let Some(pending) = waiting.get_mut(&token) else {
            tracing::debug!(%token, "no pending command for token, skipping");
            return;
        };

        if !pending.meta.recv_response(response) {
            return;
        }

        let Pending { mut meta, completion } = waiting.remove(&token).expect("just looked up");
        drop(waiting);

        let origin_token = self
            .out_token_to_in_token
            .lock()
            .expect("tracker token map poisoned")
            .get(&token)
            .cloned()
            .unwrap_or_else(|| token.clone());
        for resp in &mut meta.responses {
            resp.token = Some(origin_token.clone());
        }

        let responses = meta.responses.clone();
        self.finished.lock().await.insert(origin_token, meta);
        let _ = completion.send(responses);
    }
}

impl Default for CommandTracker {
    fn default() -> Self {
        Self::new()
    }
}
