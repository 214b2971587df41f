//! `CommandProcessor`, grounded in `cmd_processor.py`'s `CommandProcessor`:
//! wires the router, state manager, and handler registry together behind
//! one `send_command` entry point.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use ddb_config::Framework;
use ddb_router::Router;
use ddb_state::StateManager;
use tokio::sync::Mutex as AsyncMutex;

use crate::adapter::{adapter_for, FrameworkAdapter};
use crate::command;
use crate::error::ProcessorResult;
use crate::handlers::{Handler, HandlerCtx};

/// Cap on the command-timing history, so `command_timings()` stays bounded
/// unlike the original's ever-growing `GlobalTracer().command_history` dict.
const MAX_TIMING_HISTORY: usize = 256;

/// Parses and dispatches REPL command lines, matching the original's
/// `CommandProcessor.send_command`. The original's busy-wait readiness
/// gate (`is_ready`, polling every session's `gdb_controller.is_open()`)
/// has no counterpart here: sessions only ever reach the router once their
/// prerun handshake has completed, so there is nothing left to wait for by
/// the time a command can be dispatched.
pub struct CommandProcessor {
    router: Arc<Router>,
    state: Arc<StateManager>,
    adapter: Box<dyn FrameworkAdapter>,
    remotebtlock: AsyncMutex<()>,
    timings: Mutex<VecDeque<(String, Duration)>>,
}

impl CommandProcessor {
    /// Builds a processor wired to `router`/`state`, with its
    /// remote-backtrace adapter chosen from `framework`.
    #[must_use]
    pub fn new(router: Arc<Router>, state: Arc<StateManager>, framework: Framework) -> Self {
        Self {
            router,
            state,
            adapter: adapter_for(framework),
            remotebtlock: AsyncMutex::new(()),
            timings: Mutex::new(VecDeque::new()),
        }
    }

    /// Parses one REPL line and dispatches it to its handler, returning
    /// the text to print. Blank lines render to an empty string.
    pub async fn send_command(&self, raw: &str) -> ProcessorResult<String> {
        let Some(cmd) = command::parse(&self.router, &self.state, raw).await? else {
            return Ok(String::new());
        };
        let prefix = cmd.prefix().to_owned();
        let handler = Handler::for_prefix(cmd.prefix());
        let ctx = HandlerCtx {
            router: &self.router,
            state: &self.state,
            adapter: self.adapter.as_ref(),
            remotebtlock: &self.remotebtlock,
        };
        let started = Instant::now();
        let result = handler.process(&ctx, cmd).await;
        self.record_timing(prefix, started.elapsed());
        result
    }

    fn record_timing(&self, prefix: String, elapsed: Duration) {
        let mut timings = self.timings.lock().expect("timings mutex poisoned");
        timings.push_back((prefix, elapsed));
        while timings.len() > MAX_TIMING_HISTORY {
            timings.pop_front();
        }
    }

    /// The most recently observed latency for each command prefix seen so
    /// far, matching `GlobalTracer().get_command_timings()`. Only the last
    /// [`MAX_TIMING_HISTORY`] dispatches are retained.
    #[must_use]
    pub fn command_timings(&self) -> HashMap<String, Duration> {
        let timings = self.timings.lock().expect("timings mutex poisoned");
        let mut out = HashMap::new();
        for (prefix, elapsed) in timings.iter() {
            out.insert(prefix.clone(), *elapsed);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddb_tracker::CommandTracker;

    fn processor() -> CommandProcessor {
        let state = Arc::new(StateManager::new());
        let tracker = Arc::new(CommandTracker::new());
        let router = Arc::new(Router::new(state.clone(), tracker));
        CommandProcessor::new(router, state, Framework::Nu)
    }

    #[tokio::test]
    async fn blank_line_renders_to_empty_string() {
        let processor = processor();
        assert_eq!(processor.send_command("   ").await.unwrap(), "");
    }

    #[tokio::test]
    async fn break_insert_with_no_sessions_registered_errors() {
        let processor = processor();
        let err = processor.send_command("-break-insert main").await.unwrap_err();
        assert!(matches!(err, crate::error::ProcessorError::Router(_)));
    }

    #[tokio::test]
    async fn thread_select_rejects_a_non_numeric_gtid() {
        let processor = processor();
        let err = processor.send_command("-thread-select abc").await.unwrap_err();
        assert!(matches!(err, crate::error::ProcessorError::Usage(_)));
    }

    #[tokio::test]
    async fn a_dispatched_command_is_recorded_in_the_timing_history() {
        let processor = processor();
        let _ = processor.send_command("-thread-select abc").await;
        let timings = processor.command_timings();
        assert!(timings.contains_key("-thread-select"));
    }
}
