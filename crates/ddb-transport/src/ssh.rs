//! Single-hop SSH transport, grounded in
//! `original_source/ddb/python/iddb/gdbserver_starter.py`'s
//! `SSHRemoteServerClient` (asyncssh connect-with-retry, then an exec
//! channel GDB talks over).

use std::sync::Arc;

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::{Channel, ChannelMsg, Disconnect};
use russh_keys::key::PublicKey;

use crate::error::{TransportError, TransportResult};
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::Transport;

/// Credentials for one SSH hop.
#[derive(Debug, Clone)]
pub struct SshCredentials {
    /// Remote hostname or address.
    pub hostname: String,
    /// Remote SSH port.
    pub port: u16,
    /// Remote username.
    pub username: String,
    /// Password authentication; key-based auth is left for a future hop
    /// since the spec's configs only ever carry passwords or rely on an
    /// agent the host environment already trusts.
    pub password: String,
}

pub(crate) struct AcceptAllHostKeys;

#[async_trait]
impl client::Handler for AcceptAllHostKeys {
    type Error = russh::Error;

    async fn check_server_key(&mut self, _server_public_key: &PublicKey) -> Result<bool, Self::Error> {
        // Matches the original's `known_hosts=None` — host-key pinning is
        // out of scope for this aggregator (spec Non-goals).
        Ok(true)
    }
}

/// GDB reached over a single SSH hop.
pub struct SshTransport {
    cred: SshCredentials,
    retry: RetryPolicy,
    handle: Option<Handle<AcceptAllHostKeys>>,
    channel: Option<Channel<client::Msg>>,
    read_buf: Vec<u8>,
    open: bool,
}

impl SshTransport {
    /// Creates a transport that will connect to `cred` on [`start`](Transport::start).
    #[must_use]
    pub fn new(cred: SshCredentials) -> Self {
        Self {
            cred,
            retry: RetryPolicy::default(),
            handle: None,
            channel: None,
            read_buf: Vec::new(),
            open: false,
        }
    }

    /// Overrides the default retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn connect_once(&self) -> TransportResult<Handle<AcceptAllHostKeys>> {
        let config = Arc::new(client::Config::default());
        let mut handle = client::connect(
            config,
            (self.cred.hostname.as_str(), self.cred.port),
            AcceptAllHostKeys,
        )
        .await
        .map_err(|e| TransportError::Ssh(e.to_string()))?;

        let authenticated = handle
            .authenticate_password(&self.cred.username, &self.cred.password)
            .await
            .map_err(|e| TransportError::Ssh(e.to_string()))?;
        if !authenticated {
            return Err(TransportError::Ssh(format!(
                "authentication rejected for {}@{}",
                self.cred.username, self.cred.hostname
            )));
        }
        Ok(handle)
    }

    fn take_line(&mut self) -> Option<Vec<u8>> {
        let newline_pos = self.read_buf.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.read_buf.drain(..=newline_pos).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(line)
    }
}

#[async_trait]
impl Transport for SshTransport {
    async fn start(&mut self, command_line: &str) -> TransportResult<()> {
        let handle = retry_with_backoff(&self.retry, "ssh-connect", || self.connect_once()).await?;

        let mut channel = handle
            .channel_open_session()
            .await
            .map_err(|e| TransportError::Ssh(e.to_string()))?;
        channel
            .exec(true, command_line)
            .await
            .map_err(|e| TransportError::Ssh(e.to_string()))?;

        self.handle = Some(handle);
        self.channel = Some(channel);
        self.open = true;
        Ok(())
    }

    async fn write_line(&mut self, line: &str) -> TransportResult<()> {
        let channel = self.channel.as_mut().ok_or(TransportError::NotOpen)?;
        let mut data = Vec::with_capacity(line.len() + 1);
        data.extend_from_slice(line.as_bytes());
        data.push(b'\n');
        channel
            .data(&data[..])
            .await
            .map_err(|e| TransportError::Ssh(e.to_string()))?;
        Ok(())
    }

    async fn read_line(&mut self) -> TransportResult<Option<Vec<u8>>> {
        loop {
            if let Some(line) = self.take_line() {
                return Ok(Some(line));
            }
            let channel = self.channel.as_mut().ok_or(TransportError::NotOpen)?;
            match channel.wait().await {
                Some(ChannelMsg::Data { data }) => self.read_buf.extend_from_slice(&data),
                Some(ChannelMsg::ExtendedData { data, .. }) => {
                    tracing::warn!(target: "ddb_transport::ssh::stderr", "{}", String::from_utf8_lossy(&data));
                }
                Some(ChannelMsg::Eof | ChannelMsg::Close) | None => {
                    self.open = false;
                    if self.read_buf.is_empty() {
                        return Ok(None);
                    }
                    let remainder = std::mem::take(&mut self.read_buf);
                    return Ok(Some(remainder));
                }
                Some(_) => {}
            }
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn close(&mut self) -> TransportResult<()> {
        if let Some(channel) = self.channel.take() {
            let _ = channel.close().await;
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle
                .disconnect(Disconnect::ByApplication, "", "English")
                .await;
        }
        self.open = false;
        Ok(())
    }
}
