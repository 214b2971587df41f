#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Command dispatch: token assignment, target selection, tracker
//! registration.
//!
//! Grounded in `original_source/ddb/ddb/cmd_router.py`'s `CmdRouter`.

mod error;
mod router;
mod session_handle;
mod token;

pub use error::{RouterError, RouterResult};
pub use router::Router;
pub use session_handle::SessionHandle;

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ddb_prelude::{LocalTgid, LocalTid, Sid};
    use ddb_state::StateManager;
    use ddb_tracker::{CommandTracker, PlainTransformer};
    use std::sync::Mutex;

    struct RecordingSession {
        sid: Sid,
        tag: String,
        written: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SessionHandle for RecordingSession {
        fn sid(&self) -> Sid {
            self.sid
        }
        fn tag(&self) -> &str {
            &self.tag
        }
        async fn write_line(&self, line: &str) -> Result<(), RouterError> {
            self.written.lock().unwrap().push(line.to_owned());
            Ok(())
        }
    }

    fn router() -> (Router, Arc<StateManager>, Arc<CommandTracker>) {
        let state = Arc::new(StateManager::new());
        let tracker = Arc::new(CommandTracker::new());
        (Router::new(state.clone(), tracker.clone()), state, tracker)
    }

    use std::sync::Arc;

    #[tokio::test]
    async fn broadcast_writes_to_every_session() {
        let (router, ..) = router();
        let a = Arc::new(RecordingSession {
            sid: Sid(1),
            tag: "a".to_owned(),
            written: Mutex::new(Vec::new()),
        });
        let b = Arc::new(RecordingSession {
            sid: Sid(2),
            tag: "b".to_owned(),
            written: Mutex::new(Vec::new()),
        });
        router.add_session(a.clone()).await;
        router.add_session(b.clone()).await;

        let (cmd, token, _origin) = router.prepend_token("-thread-info");
        router
            .broadcast(token, &cmd, Arc::new(PlainTransformer))
            .await
            .unwrap();

        assert_eq!(a.written.lock().unwrap().len(), 1);
        assert_eq!(b.written.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn send_to_thread_selects_the_local_tid_first() {
        let (router, state, _tracker) = router();
        let sid = Sid(1);
        state.register_session(sid, "tag").await;
        let tgid = LocalTgid(1);
        state.add_thread_group(sid, tgid).await.unwrap();
        let (gtid, _) = state.create_thread(sid, LocalTid(7), tgid).await.unwrap();

        let session = Arc::new(RecordingSession {
            sid,
            tag: "tag".to_owned(),
            written: Mutex::new(Vec::new()),
        });
        router.add_session(session.clone()).await;

        let (cmd, token, _origin) = router.prepend_token("-exec-continue");
        router
            .send_to_thread(gtid, token, &cmd, Arc::new(PlainTransformer))
            .await
            .unwrap();

        let written = session.written.lock().unwrap();
        assert_eq!(written[0], "-thread-select 7");
    }

    #[tokio::test]
    async fn send_to_first_errors_with_no_sessions() {
        let (router, ..) = router();
        let (cmd, token, _origin) = router.prepend_token("-thread-info");
        let err = router
            .send_to_first(token, &cmd, Arc::new(PlainTransformer))
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::NoSessions));
    }

    #[tokio::test]
    async fn prepend_token_respects_a_user_supplied_token() {
        let (router, ..) = router();
        let (cmd, _outbound, origin) = router.prepend_token("42-break-insert main");
        assert_eq!(cmd, "-break-insert main");
        assert_eq!(origin.to_string(), "42");
    }
}
