//! The blocking `rustyline` readline thread, bridged into the async world
//! over an `mpsc` channel — the Rust shape of `GdbManager.write`'s
//! `asyncio.run_coroutine_threadsafe` bridge from a synchronous caller.

use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// One event read off the terminal.
pub enum ReplEvent {
    /// A line of input, not yet trimmed.
    Line(String),
    /// Ctrl+D or a read error; the REPL thread is exiting.
    Eof,
}

/// Spawns the readline thread and returns the handle to join it plus the
/// receiving half of the channel it feeds. `prompt` is written before every
/// read.
#[must_use]
pub(crate) fn spawn(prompt: &'static str) -> (JoinHandle<()>, mpsc::Receiver<ReplEvent>) {
    let (tx, rx) = mpsc::channel(32);
    let handle = tokio::task::spawn_blocking(move || {
        let mut editor: Editor<(), DefaultHistory> = match Editor::new() {
            Ok(editor) => editor,
            Err(err) => {
                tracing::error!(error = %err, "failed to start the REPL editor");
                let _ = tx.blocking_send(ReplEvent::Eof);
                return;
            }
        };

        loop {
            match editor.readline(prompt) {
                Ok(line) => {
                    let _ = editor.add_history_entry(line.as_str());
                    if tx.blocking_send(ReplEvent::Line(line)).is_err() {
                        break;
                    }
                }
                Err(ReadlineError::Eof | ReadlineError::Interrupted) => {
                    let _ = tx.blocking_send(ReplEvent::Eof);
                    break;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "REPL read error, stopping");
                    let _ = tx.blocking_send(ReplEvent::Eof);
                    break;
                }
            }
        }
    });
    (handle, rx)
}
