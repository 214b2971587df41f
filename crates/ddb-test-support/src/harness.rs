//! [`TestFleet`]: wires a real `StateManager`/`CommandTracker`/`Router`/
//! `CommandProcessor` stack to one or more scripted sessions, so a test can
//! drive the aggregator end to end without a real GDB/MI backend.

use std::sync::Arc;

use ddb_config::{ComponentStartMode, Framework, SessionMode};
use ddb_prelude::{Counter, Sid};
use ddb_processor::CommandProcessor;
use ddb_router::Router;
use ddb_session::{ResponseDispatcher, Session, SessionSpec};
use ddb_state::StateManager;
use ddb_tracker::CommandTracker;
use ddb_transport::Transport;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A running aggregator stack over scripted sessions, for exercising
/// cross-crate behavior (router → tracker → processor → state) the way a
/// real REPL command would.
pub struct TestFleet {
    /// The shared id/lifecycle state.
    pub state: Arc<StateManager>,
    /// The shared command router.
    pub router: Arc<Router>,
    /// The command processor under test.
    pub processor: Arc<CommandProcessor>,
    dispatcher: Arc<ResponseDispatcher>,
    sid_counter: Counter,
    readers: Vec<JoinHandle<()>>,
}

impl TestFleet {
    /// Builds an empty fleet with no sessions attached yet.
    #[must_use]
    pub fn new(framework: Framework) -> Self {
        let state = Arc::new(StateManager::new());
        let tracker = Arc::new(CommandTracker::new());
        let router = Arc::new(Router::new(state.clone(), tracker.clone()));
        let dispatcher = Arc::new(ResponseDispatcher::new(state.clone(), tracker));
        let processor = Arc::new(CommandProcessor::new(router.clone(), state.clone(), framework));
        Self {
            state,
            router,
            processor,
            dispatcher,
            sid_counter: Counter::new(),
            readers: Vec::new(),
        }
    }

    /// Attaches a new session backed by `transport`, runs its configure
    /// handshake, and spawns its reader loop against `transport`'s scripted
    /// lines. Returns the session's assigned [`Sid`].
    pub async fn attach(&mut self, tag: &str, transport: Box<dyn Transport>) -> Sid {
        let sid = Sid(self.sid_counter.increment());
        let spec = SessionSpec::new(tag, ".", "", SessionMode::Local, ComponentStartMode::Binary);
        let session = Arc::new(Session::new(sid, spec, transport));
        self.router.add_session(session.clone()).await;
        session.start(&self.state, false).await.expect("scripted session always starts cleanly");

        let (died_tx, _died_rx) = mpsc::channel(1);
        let handle = tokio::spawn(ddb_session::run_reader(session, self.dispatcher.clone(), died_tx));
        self.readers.push(handle);
        tracing::debug!(?sid, tag, "attached scripted session");
        sid
    }

    /// Sends one REPL line through the processor, same as a user typing it.
    pub async fn send(&self, line: &str) -> ddb_processor::ProcessorResult<String> {
        self.processor.send_command(line).await
    }

    /// Waits for every attached session's reader loop to hit EOF on its
    /// scripted transport, so every notify/result record it was given has
    /// been dispatched before assertions run.
    pub async fn drain(&mut self) {
        for handle in self.readers.drain(..) {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{result_done, stopped_on_breakpoint, thread_created, thread_group_added, ScriptedTransport};

    /// S1: a command flagged `--all` broadcasts to every attached session
    /// and only completes once each has replied.
    #[tokio::test]
    async fn broadcast_breakpoint_reaches_every_session() {
        let mut fleet = TestFleet::new(Framework::Nu);
        let (t1, w1) = ScriptedTransport::new(vec![result_done("1")]);
        let (t2, w2) = ScriptedTransport::new(vec![result_done("1")]);
        fleet.attach("host-a", t1).await;
        fleet.attach("host-b", t2).await;

        let out = fleet.send("-break-insert main --all").await.unwrap();
        fleet.drain().await;

        assert!(w1.any_contains("-break-insert main"));
        assert!(w2.any_contains("-break-insert main"));
        assert!(out.contains("host-a"));
        assert!(out.contains("host-b"));
    }

    /// S2: a local `(sid, tid)` pair reported by one session's notify
    /// stream translates to a global gtid the router can target with
    /// `--thread`.
    #[tokio::test]
    async fn local_thread_translates_to_a_routable_global_id() {
        let mut fleet = TestFleet::new(Framework::Nu);
        let (transport, _written) = ScriptedTransport::new(vec![thread_group_added(1), thread_created(7, 1)]);
        let sid = fleet.attach("host-a", transport).await;
        fleet.drain().await;

        let gtid = fleet.state.get_gtid(sid, ddb_prelude::LocalTid(7)).await.unwrap();
        let (resolved_sid, resolved_tid) = fleet.state.get_sidtid_by_gtid(gtid).await.unwrap();
        assert_eq!(resolved_sid, sid);
        assert_eq!(resolved_tid, ddb_prelude::LocalTid(7));
    }

    /// S3: in all-stop mode, the thread that hits a breakpoint becomes the
    /// globally selected thread automatically, with no explicit
    /// `-thread-select` from the caller.
    #[tokio::test]
    async fn breakpoint_hit_focuses_the_stopped_thread() {
        let mut fleet = TestFleet::new(Framework::Nu);
        let (transport, _written) =
            ScriptedTransport::new(vec![thread_group_added(1), thread_created(3, 1), stopped_on_breakpoint(3)]);
        let sid = fleet.attach("host-a", transport).await;
        fleet.drain().await;

        let focused = fleet.state.get_current_gthread().await.expect("a thread should be focused");
        let (resolved_sid, resolved_tid) = fleet.state.get_sidtid_by_gtid(focused).await.unwrap();
        assert_eq!(resolved_sid, sid);
        assert_eq!(resolved_tid, ddb_prelude::LocalTid(3));
    }

    /// S6: two concurrently in-flight commands that happen to carry the
    /// same caller-supplied token are deduplicated onto distinct wire
    /// tokens, so neither command's fan-in is corrupted by the other's
    /// replies.
    #[tokio::test]
    async fn colliding_tokens_are_deduplicated_onto_distinct_wire_tokens() {
        let mut fleet = TestFleet::new(Framework::Nu);
        let (transport, written) = ScriptedTransport::new(vec![result_done("1"), result_done("2")]);
        fleet.attach("host-a", transport).await;

        let first = fleet.send("1-break-insert main").await.unwrap();
        let second = fleet.send("1-break-insert other").await.unwrap();
        fleet.drain().await;

        assert!(first.contains("host-a"));
        assert!(second.contains("host-a"));
        let lines = written.lines();
        assert!(lines.iter().any(|l| l.starts_with("1-break-insert main")));
        assert!(lines.iter().any(|l| l.starts_with("2-break-insert other")));
    }
}
