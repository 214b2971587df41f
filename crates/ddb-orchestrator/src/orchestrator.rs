//! `Orchestrator`: owns every session, starts them concurrently at
//! startup, grows the fleet as `discover()` fires, and tears everything
//! down on shutdown. Grounded in
//! `original_source/ddb/python/iddb/gdb_manager.py`'s `GdbManager`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use ddb_config::Config;
use ddb_discovery::{DiscoveryCallback, ServiceInfo};
use ddb_prelude::{Counter, Sid};
use ddb_processor::CommandProcessor;
use ddb_router::Router;
use ddb_session::{Session, SessionSpec};
use ddb_state::StateManager;
use ddb_tracker::CommandTracker;
use ddb_transport::Transport;
use tokio::sync::{mpsc, Semaphore};

use crate::error::OrchestratorResult;
use crate::session_builder;

/// Bounded concurrency for dynamic session creation triggered by
/// discovery, matching `SessionCreationTaskQueue(max_workers=5)`.
const DISCOVERY_WORKERS: usize = 5;

/// Owns every attached [`Session`] plus the shared router/state/tracker/
/// processor stack, and is the single place that knows how to grow or
/// shrink the fleet.
pub struct Orchestrator {
    config: Config,
    sessions: DashMap<Sid, Arc<Session>>,
    sid_counter: Counter,
    router: Arc<Router>,
    state: Arc<StateManager>,
    dispatcher: Arc<ddb_session::ResponseDispatcher>,
    processor: Arc<CommandProcessor>,
    discovery_semaphore: Semaphore,
    died_tx: mpsc::Sender<Sid>,
    shutting_down: AtomicBool,
}

impl Orchestrator {
    /// Builds every shared collaborator (state manager, tracker, router,
    /// command processor) wired together, with no sessions started yet.
    #[must_use]
    pub fn new(config: Config) -> Arc<Self> {
        let state = Arc::new(StateManager::new());
        let tracker = Arc::new(CommandTracker::new());
        let router = Arc::new(Router::new(state.clone(), tracker.clone()));
        let dispatcher = Arc::new(ddb_session::ResponseDispatcher::new(state.clone(), tracker));
        let processor = Arc::new(CommandProcessor::new(router.clone(), state.clone(), config.framework));
        let (died_tx, died_rx) = mpsc::channel(32);

        let orchestrator = Arc::new(Self {
            config,
            sessions: DashMap::new(),
            sid_counter: Counter::new(),
            router,
            state,
            dispatcher,
            processor,
            discovery_semaphore: Semaphore::new(DISCOVERY_WORKERS),
            died_tx,
            shutting_down: AtomicBool::new(false),
        });

        tokio::spawn(watch_for_deaths(Arc::clone(&orchestrator), died_rx));
        orchestrator
    }

    /// The shared command processor, for driving the REPL or an API front
    /// end.
    #[must_use]
    pub fn processor(&self) -> &Arc<CommandProcessor> {
        &self.processor
    }

    /// Whether discovery is enabled for this run, gating the `signal
    /// SIG40` step in the remote-attach configure sequence exactly as the
    /// original's `discovery_active` argument does.
    #[must_use]
    pub fn discovery_active(&self) -> bool {
        self.config.service_discovery.is_some()
    }

    /// Starts every statically configured component concurrently,
    /// matching `GdbManager.start_async`'s
    /// `asyncio.gather(..., return_exceptions=True)`: one session failing
    /// to start is logged and cleaned up rather than aborting the others.
    pub async fn start(&self) -> OrchestratorResult<()> {
        let components = self.config.components.clone();
        let starts = components.into_iter().map(|component| async move {
            let sid = self.next_sid();
            match session_builder::static_session(&component, &self.config) {
                Ok((spec, transport)) => {
                    if let Err(err) = self.spawn_session(sid, spec, transport).await {
                        tracing::error!(?sid, error = %err, "failed to start session, cleaning up");
                        self.remove_session(sid).await;
                    }
                }
                Err(err) => {
                    tracing::error!(error = %err, "failed to build session config");
                }
            }
        });
        futures::future::join_all(starts).await;
        Ok(())
    }

    fn next_sid(&self) -> Sid {
        Sid(self.sid_counter.increment())
    }

    /// Builds, registers, and starts one session, matching
    /// `start_session`'s "register with router first, then start" order
    /// so a session that dies mid-handshake is still reachable for
    /// cleanup.
    async fn spawn_session(&self, sid: Sid, spec: SessionSpec, transport: Box<dyn Transport>) -> OrchestratorResult<()> {
        let session = Arc::new(Session::new(sid, spec, transport));
        self.router.add_session(session.clone()).await;
        self.sessions.insert(sid, session.clone());

        tokio::spawn(ddb_session::run_reader(session.clone(), self.dispatcher.clone(), self.died_tx.clone()));

        session.start(&self.state, self.discovery_active()).await?;
        Ok(())
    }

    /// Removes a session from every shared collaborator. Idempotent:
    /// removing an id that's already gone is a no-op (matching the
    /// original's `for s in self.sessions: if s.sid == sid: ...` scan,
    /// which silently does nothing when no match is found). Triggers
    /// shutdown once the fleet is empty, matching
    /// `GdbManager.remove_session`'s "no more sessions" check.
    pub async fn remove_session(&self, sid: Sid) {
        let Some((_, session)) = self.sessions.remove(&sid) else {
            return;
        };
        if let Err(err) = session.shutdown().await {
            tracing::warn!(?sid, error = %err, "error shutting down session");
        }
        self.router.remove_session(sid).await;
        let _ = self.state.remove_session(sid).await;

        if self.sessions.is_empty() {
            tracing::info!("no more sessions, shutting down");
            self.shutdown().await;
        }
    }

    /// Shuts down every session and marks the orchestrator as stopped.
    /// Idempotent: a second call is a no-op, matching
    /// `GlobalHandler.exit_ddb`'s single-shot nature.
    pub async fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let sids: Vec<Sid> = self.sessions.iter().map(|entry| *entry.key()).collect();
        for sid in sids {
            if let Some((_, session)) = self.sessions.remove(&sid) {
                if let Err(err) = session.shutdown().await {
                    tracing::warn!(?sid, error = %err, "error shutting down session");
                }
                self.router.remove_session(sid).await;
                let _ = self.state.remove_session(sid).await;
            }
        }
    }

    /// Whether [`Self::shutdown`] has already run.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Blocks until `Ctrl+C` or `SIGTERM` arrives, then runs
    /// [`Self::shutdown`], matching the original's pairing of an OS signal
    /// with the same `exit_ddb` call a normal "no more sessions" teardown
    /// reaches.
    pub async fn wait_for_shutdown_signal(&self) {
        wait_for_signal().await;
        self.shutdown().await;
    }

    /// Drives the blocking `rustyline` thread: every line is handed to the
    /// command processor and its reply printed, matching `GdbManager.write`
    /// bridging a synchronous REPL caller into the async `CommandProcessor`.
    /// Returns once the REPL hits EOF (Ctrl+D) or the orchestrator is
    /// shutting down.
    pub async fn run_repl(&self, prompt: &'static str) {
        let (handle, mut events) = crate::repl::spawn(prompt);
        while let Some(event) = events.recv().await {
            match event {
                crate::repl::ReplEvent::Line(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match self.processor.send_command(line).await {
                        Ok(reply) => println!("{reply}"),
                        Err(err) => tracing::error!(error = %err, "command failed"),
                    }
                }
                crate::repl::ReplEvent::Eof => break,
            }
            if self.is_shutting_down() {
                break;
            }
        }
        handle.abort();
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(err) => {
            tracing::warn!(error = %err, "failed to install SIGTERM handler, watching Ctrl+C only");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigterm.recv() => {},
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

async fn watch_for_deaths(orchestrator: Arc<Orchestrator>, mut died_rx: mpsc::Receiver<Sid>) {
    while let Some(sid) = died_rx.recv().await {
        tracing::debug!(?sid, "session reader reported death, removing");
        orchestrator.remove_session(sid).await;
    }
}

#[async_trait]
impl DiscoveryCallback for Orchestrator {
    /// `__discover_new_session_async`: build the attach config for the
    /// newly discovered endpoint and start it, bounded by the worker
    /// pool. A session that fails to start is logged and cleaned up, just
    /// like a failed static start.
    async fn discover(&self, info: ServiceInfo) {
        if self.is_shutting_down() {
            return;
        }
        let Ok(_permit) = self.discovery_semaphore.acquire().await else {
            return;
        };

        let sid = self.next_sid();
        let (spec, transport) = session_builder::discovered_session(&info, &self.config);
        if let Err(err) = self.spawn_session(sid, spec, transport).await {
            tracing::error!(?sid, tag = %info.tag, error = %err, "failed to start discovered session, cleaning up");
            self.remove_session(sid).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddb_config::{Conf, Framework, SshDefaults};

    fn empty_config() -> Config {
        Config {
            framework: Framework::Nu,
            service_discovery: None,
            ssh: SshDefaults::default(),
            prerun_cmds: Vec::new(),
            postrun_cmds: Vec::new(),
            conf: Conf::default(),
            components: Vec::new(),
        }
    }

    #[tokio::test]
    async fn start_with_no_components_is_a_no_op() {
        let orchestrator = Orchestrator::new(empty_config());
        orchestrator.start().await.unwrap();
        assert!(orchestrator.sessions.is_empty());
    }

    #[tokio::test]
    async fn removing_an_unknown_session_is_a_no_op() {
        let orchestrator = Orchestrator::new(empty_config());
        orchestrator.remove_session(Sid(99)).await;
        assert!(!orchestrator.is_shutting_down());
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let orchestrator = Orchestrator::new(empty_config());
        orchestrator.shutdown().await;
        assert!(orchestrator.is_shutting_down());
        orchestrator.shutdown().await;
        assert!(orchestrator.is_shutting_down());
    }

    #[tokio::test]
    async fn discovery_is_refused_once_shutting_down() {
        let orchestrator = Orchestrator::new(empty_config());
        orchestrator.shutdown().await;
        orchestrator
            .discover(ServiceInfo {
                ip: std::net::Ipv4Addr::new(10, 0, 0, 1),
                tag: "t".to_owned(),
                pid: 1,
            })
            .await;
        assert!(orchestrator.sessions.is_empty());
    }
}
