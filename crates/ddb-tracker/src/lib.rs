#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Per-command fan-in completion tracking.
//!
//! Grounded in `original_source/ddb/python/iddb/cmd_tracker.py`: a command
//! dispatched to several sessions completes only once every targeted
//! session has replied. [`CommandTracker`] replaces the original's
//! `asyncio.Future` subclass with a `tokio::sync::oneshot` channel per
//! command, since Rust has no analogue to subclassing a future.

mod error;
mod meta;
mod transformer;
mod tracker;

pub use error::{TrackerError, TrackerResult};
pub use meta::CmdMeta;
pub use transformer::{PlainTransformer, ResponseTransformer};
pub use tracker::CommandTracker;

#[cfg(test)]
mod tests {
    use super::*;
    use ddb_mi::{MiRecordKind, Stream};
    use ddb_prelude::{Sid, Token};
    use indexmap::IndexMap;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn response(sid: Sid, token: &str) -> ddb_mi::SessionResponse {
        ddb_mi::SessionResponse {
            sid,
            tag: format!("tag-{}", sid.0),
            token: Some(Token::from(token)),
            kind: MiRecordKind::Result,
            message: Some("done".to_owned()),
            payload: IndexMap::new(),
            stream: Stream::Stdout,
        }
    }

    #[tokio::test]
    async fn completes_once_every_target_session_has_replied() {
        let tracker = CommandTracker::new();
        let targets: HashSet<Sid> = [Sid(1), Sid(2)].into_iter().collect();
        let mut rx = tracker
            .create_cmd(
                Token::from("5"),
                "-thread-info".to_owned(),
                targets,
                Arc::new(PlainTransformer),
            )
            .await;

        tracker.recv_response(response(Sid(1), "5")).await;
        assert!(matches!(
            rx.try_recv(),
            Err(tokio::sync::oneshot::error::TryRecvError::Empty)
        ));
        tracker.recv_response(response(Sid(2), "5")).await;

        let responses = rx.await.unwrap();
        assert_eq!(responses.len(), 2);
    }

    #[tokio::test]
    async fn dedup_token_mints_a_fresh_token_on_collision() {
        let tracker = CommandTracker::new();
        let first = tracker.dedup_token(Token::from("1"));
        let second = tracker.dedup_token(Token::from("1"));
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn response_with_no_token_is_ignored() {
        let tracker = CommandTracker::new();
        let mut resp = response(Sid(1), "5");
        resp.token = None;
        tracker.recv_response(resp).await;
    }

    #[tokio::test]
    async fn unknown_token_response_is_ignored() {
        let tracker = CommandTracker::new();
        tracker.recv_response(response(Sid(1), "does-not-exist")).await;
    }
}
