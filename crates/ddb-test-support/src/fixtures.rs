//! A scripted, in-memory [`Transport`] plus builders for canned GDB/MI
//! output lines, mirroring `astrid-test`'s `MockFrontend`: queue what the
//! fake peer should say, then inspect what was written to it.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ddb_transport::{Transport, TransportResult};

/// A shared, cloneable log of every line written through a
/// [`ScriptedTransport`], kept alive independently of the transport itself
/// (which is moved into a `Box<dyn Transport>` and then into a `Session`).
#[derive(Debug, Clone, Default)]
pub struct WrittenLog(Arc<Mutex<Vec<String>>>);

impl WrittenLog {
    /// Every line written so far, in order.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.0.lock().expect("written-log mutex poisoned").clone()
    }

    /// Whether any written line contains `needle`.
    #[must_use]
    pub fn any_contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }
}

/// A [`Transport`] fed a fixed script of incoming lines and recording every
/// outgoing one, grounded in `ddb-session`'s own internal `ScriptedTransport`
/// test fixture (generalized here so every crate downstream of `ddb-session`
/// can reuse it instead of re-inventing a fake transport per crate).
pub struct ScriptedTransport {
    lines: Mutex<VecDeque<Vec<u8>>>,
    written: WrittenLog,
    open: bool,
}

impl ScriptedTransport {
    /// Builds a transport that will yield `scripted_lines` in order (then
    /// report EOF), returning it boxed alongside a [`WrittenLog`] handle the
    /// caller keeps to inspect what was written after the transport has been
    /// moved into a `Session`.
    #[must_use]
    pub fn new(scripted_lines: Vec<Vec<u8>>) -> (Box<dyn Transport>, WrittenLog) {
        let written = WrittenLog::default();
        let transport = Self {
            lines: Mutex::new(scripted_lines.into()),
            written: written.clone(),
            open: false,
        };
        (Box::new(transport), written)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn start(&mut self, _command_line: &str) -> TransportResult<()> {
        self.open = true;
        Ok(())
    }

    async fn write_line(&mut self, line: &str) -> TransportResult<()> {
        self.written.0.lock().expect("written-log mutex poisoned").push(line.to_owned());
        Ok(())
    }

    async fn read_line(&mut self) -> TransportResult<Option<Vec<u8>>> {
        Ok(self.lines.lock().expect("scripted-lines mutex poisoned").pop_front())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn close(&mut self) -> TransportResult<()> {
        self.open = false;
        Ok(())
    }
}

/// One line of canned GDB/MI output, ready to feed a [`ScriptedTransport`].
#[must_use]
pub fn mi_line(text: impl Into<String>) -> Vec<u8> {
    text.into().into_bytes()
}

/// `{token}^done`.
#[must_use]
pub fn result_done(token: &str) -> Vec<u8> {
    mi_line(format!("{token}^done"))
}

/// `{token}^error,msg="{message}"`.
#[must_use]
pub fn result_error(token: &str, message: &str) -> Vec<u8> {
    mi_line(format!("{token}^error,msg=\"{message}\""))
}

/// `=thread-group-added,id="i{tgid}"`.
#[must_use]
pub fn thread_group_added(tgid: u64) -> Vec<u8> {
    mi_line(format!("=thread-group-added,id=\"i{tgid}\""))
}

/// `=thread-created,id="{tid}",group-id="i{tgid}"`.
#[must_use]
pub fn thread_created(tid: u64, tgid: u64) -> Vec<u8> {
    mi_line(format!("=thread-created,id=\"{tid}\",group-id=\"i{tgid}\""))
}

/// `*stopped,reason="breakpoint-hit",thread-id="{tid}",stopped-threads="all"`.
#[must_use]
pub fn stopped_on_breakpoint(tid: u64) -> Vec<u8> {
    mi_line(format!(r#"*stopped,reason="breakpoint-hit",thread-id="{tid}",stopped-threads="all""#))
}

/// `*stopped,reason="exited-normally"`.
#[must_use]
pub fn stopped_exited() -> Vec<u8> {
    mi_line(r#"*stopped,reason="exited-normally""#.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_transport_yields_lines_in_order_then_eof() {
        let (mut transport, written) = ScriptedTransport::new(vec![mi_line("1^done"), mi_line("(gdb)")]);
        transport.start("gdb --interpreter=mi3").await.unwrap();
        assert_eq!(transport.read_line().await.unwrap(), Some(b"1^done".to_vec()));
        assert_eq!(transport.read_line().await.unwrap(), Some(b"(gdb)".to_vec()));
        assert_eq!(transport.read_line().await.unwrap(), None);

        transport.write_line("-break-insert main").await.unwrap();
        assert!(written.any_contains("-break-insert"));
    }
}
