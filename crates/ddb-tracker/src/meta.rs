//! The per-command fan-in record, grounded in `cmd_tracker.py`'s `CmdMeta`
//! (there an `asyncio.Future` subclass; here a plain struct paired with a
//! `oneshot` channel since Rust has no direct analogue to subclassing a
//! future).

use std::collections::HashSet;
use std::sync::Arc;

use ddb_mi::SessionResponse;
use ddb_prelude::{Sid, Token};

use crate::transformer::ResponseTransformer;

/// Everything the tracker needs to know about one outstanding command:
/// which sessions it's waiting on, which have replied so far, and how to
/// render the result once every reply is in.
pub struct CmdMeta {
    /// The token this command was sent under (post-dedup).
    pub token: Token,
    /// The MI command text, sans token.
    pub command: String,
    /// Sessions this command was dispatched to.
    pub target_sessions: HashSet<Sid>,
    /// Sessions that have replied so far.
    pub finished_sessions: HashSet<Sid>,
    /// Replies collected so far, in arrival order.
    pub responses: Vec<SessionResponse>,
    /// How to render `responses` once complete.
    pub transformer: Arc<dyn ResponseTransformer>,
}

impl CmdMeta {
    /// Creates a fresh, empty fan-in record for `command` dispatched to
    /// `target_sessions`.
    #[must_use]
    pub fn new(
        token: Token,
        command: String,
        target_sessions: HashSet<Sid>,
        transformer: Arc<dyn ResponseTransformer>,
    ) -> Self {
        Self {
            token,
            command,
            target_sessions,
            finished_sessions: HashSet::new(),
            responses: Vec::new(),
            transformer,
        }
    }

    /// Records one session's reply. Returns `true` once every target
    /// session has now replied (the command is complete).
    pub fn recv_response(&mut self, response: SessionResponse) -> bool {
        self.finished_sessions.insert(response.sid);
        self.responses.push(response);
        self.is_finished()
    }

    /// Whether every target session has replied.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.target_sessions == self.finished_sessions
    }
}
