#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! One attached GDB/MI session: lifecycle, the prerun/attach/postrun
//! handshake, and the notify-dispatch/result-fan-in response pipeline.
//!
//! Grounded in `original_source/ddb/python/iddb/gdb_session.py`'s
//! `GdbSession` and `original_source/ddb/iddb/response_processor.py`'s
//! `ResponseProcessor` — folded into one crate per spec §4.E, since the
//! response processor is a single task fed by every session rather than
//! an independently useful component.

mod commands;
mod config;
mod error;
mod reader;
mod response;
mod session;

pub use config::SessionSpec;
pub use error::{SessionError, SessionResult};
pub use reader::run as run_reader;
pub use response::{DispatchOutcome, ResponseDispatcher};
pub use session::Session;

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ddb_config::ComponentStartMode;
    use ddb_mi::{MiRecord, MiRecordKind, MiValue, Stream};
    use ddb_prelude::Sid;
    use ddb_state::StateManager;
    use ddb_tracker::CommandTracker;
    use ddb_transport::{Transport, TransportResult};
    use indexmap::IndexMap;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::mpsc;

    struct ScriptedTransport {
        lines: StdMutex<VecDeque<Vec<u8>>>,
        open: bool,
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn start(&mut self, _command_line: &str) -> TransportResult<()> {
            self.open = true;
            Ok(())
        }
        async fn write_line(&mut self, _line: &str) -> TransportResult<()> {
            Ok(())
        }
        async fn read_line(&mut self) -> TransportResult<Option<Vec<u8>>> {
            Ok(self.lines.lock().unwrap().pop_front())
        }
        fn is_open(&self) -> bool {
            self.open
        }
        async fn close(&mut self) -> TransportResult<()> {
            self.open = false;
            Ok(())
        }
    }

    fn mi_line(bytes: &'static [u8]) -> Vec<u8> {
        bytes.to_vec()
    }

    #[tokio::test]
    async fn reader_aggregates_console_lines_and_forwards_notify_records() {
        let state = Arc::new(StateManager::new());
        state.register_session(Sid(1), "tag").await;
        let tracker = Arc::new(CommandTracker::new());
        let dispatcher = Arc::new(ResponseDispatcher::new(state.clone(), tracker));

        let transport = Box::new(ScriptedTransport {
            lines: StdMutex::new(VecDeque::from(vec![
                mi_line(br#"~"hello ""#),
                mi_line(br#"~"world\n""#),
                mi_line(br#"=thread-group-added,id="i1""#),
            ])),
            open: true,
        });
        let spec = SessionSpec::new(
            "tag",
            "/srv",
            "app",
            ddb_config::SessionMode::Local,
            ComponentStartMode::Binary,
        );
        let session = Arc::new(Session::new(Sid(1), spec, transport));

        let (died_tx, mut died_rx) = mpsc::channel(1);
        reader::run(session.clone(), dispatcher, died_tx).await;

        // Transport ran out of scripted lines and reported EOF, so the
        // reader should have reported the session died exactly once.
        assert_eq!(died_rx.recv().await, Some(Sid(1)));
        assert!(state.get_giid(Sid(1), ddb_prelude::LocalTgid(1)).await.is_ok());
    }

    #[tokio::test]
    async fn dispatcher_directly_handles_a_notify_record() {
        let state = Arc::new(StateManager::new());
        state.register_session(Sid(1), "tag").await;
        let tracker = Arc::new(CommandTracker::new());
        let dispatcher = ResponseDispatcher::new(state.clone(), tracker);

        let mut payload = IndexMap::new();
        payload.insert("id".to_owned(), MiValue::String("i1".to_owned()));
        let record = MiRecord {
            kind: MiRecordKind::Notify,
            message: Some("thread-group-added".to_owned()),
            payload,
            token: None,
            stream: Stream::Stdout,
        };
        let response = ddb_mi::SessionResponse::new(Sid(1), "tag", record);
        let outcome = dispatcher.dispatch(response).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Continue);
    }
}
