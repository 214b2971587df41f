//! The background reader task: `transport.read_line()` -> `parser.feed()`
//! -> dispatch, aggregating consecutive console records into one synthetic
//! record. Grounded in `gdb_session.py`'s `fetch_mi_output_async`.

use std::sync::Arc;

use ddb_mi::{MiParser, MiRecordKind, SessionResponse, Stream};
use ddb_prelude::Sid;
use tokio::sync::mpsc;

use crate::response::{DispatchOutcome, ResponseDispatcher};
use crate::session::Session;

/// Runs until the transport closes, an unrecoverable read error occurs, or
/// the dispatcher reports the inferior exited. Sends `session.sid()` on
/// `died` exactly once when it stops, so the orchestrator can remove the
/// session — matching the original's implicit "the fetch loop falls off
/// the bottom, the session is no longer usable" contract, made explicit
/// here since Rust has no equivalent of letting a daemon thread silently
/// die.
pub async fn run(session: Arc<Session>, dispatcher: Arc<ResponseDispatcher>, died: mpsc::Sender<Sid>) {
    let mut parser = MiParser::new();
    let mut console_buf = String::new();
    let tag = {
        // `SessionHandle::tag` borrows `&self`; `Session` doesn't expose it
        // directly, so read it once via the trait object surface it
        // implements.
        use ddb_router::SessionHandle;
        SessionHandle::tag(session.as_ref()).to_owned()
    };

    loop {
        let bytes = match session.read_line().await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                tracing::debug!(sid = ?session.sid(), "transport closed, stopping reader");
                break;
            }
            Err(e) => {
                tracing::warn!(sid = ?session.sid(), error = %e, "read error, stopping reader");
                break;
            }
        };

        let mut line = bytes;
        line.push(b'\n');
        let records = parser.feed(&line, Stream::Stdout);

        for record in records {
            if record.kind == MiRecordKind::Console {
                if let Some(text) = record.text() {
                    console_buf.push_str(text);
                }
                continue;
            }

            flush_console(session.sid(), &tag, &mut console_buf);
            let response = SessionResponse::new(session.sid(), tag.clone(), record);
            match dispatcher.dispatch(response).await {
                Ok(DispatchOutcome::Continue) => {}
                Ok(DispatchOutcome::SessionExited) => {
                    flush_console(session.sid(), &tag, &mut console_buf);
                    let _ = died.send(session.sid()).await;
                    return;
                }
                Err(e) => {
                    tracing::warn!(sid = ?session.sid(), error = %e, "failed to dispatch response");
                }
            }
        }
    }

    flush_console(session.sid(), &tag, &mut console_buf);
    let _ = died.send(session.sid()).await;
}

/// Flushes any buffered console text as one synthetic console record, just
/// as `fetch_mi_output_async` does at the end of each fetch batch once
/// `payload.strip()` is non-empty — called here before every non-console
/// record is dispatched (not just at EOF), so console text surfaces
/// promptly instead of sitting buffered for the session's whole life.
/// Neither `handle_notify` nor `handle_result` has a branch for a console
/// record, so the original's effective behavior is to print it and
/// otherwise drop it; we do the same via `tracing` rather than inventing a
/// display channel no module in the spec owns.
fn flush_console(sid: Sid, tag: &str, buf: &mut String) {
    let trimmed = buf.trim();
    if !trimmed.is_empty() {
        tracing::info!(?sid, tag, text = trimmed, "console output");
    }
    buf.clear();
}
