//! SSH-through-a-jump-host transport, grounded in
//! `original_source/ddb/python/iddb/gdbserver_starter.py`'s
//! `SSHBridgeRemoteServerClient` (`asyncssh.connect(..., tunnel=jump_conn)`).

use std::sync::Arc;

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::{Channel, ChannelMsg, Disconnect};

use crate::error::{TransportError, TransportResult};
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::ssh::{AcceptAllHostKeys, SshCredentials};
use crate::Transport;

/// GDB (or, more commonly, `gdbserver`) reached by first hopping through a
/// jump host and then opening a direct TCP/IP channel to the real target.
pub struct SshBridgeTransport {
    jump_cred: SshCredentials,
    target_cred: SshCredentials,
    retry: RetryPolicy,
    jump_handle: Option<Handle<AcceptAllHostKeys>>,
    target_handle: Option<Handle<AcceptAllHostKeys>>,
    channel: Option<Channel<client::Msg>>,
    read_buf: Vec<u8>,
    open: bool,
}

impl SshBridgeTransport {
    /// Creates a bridged transport that hops through `jump_cred` to reach
    /// `target_cred` on [`start`](Transport::start).
    #[must_use]
    pub fn new(jump_cred: SshCredentials, target_cred: SshCredentials) -> Self {
        Self {
            jump_cred,
            target_cred,
            retry: RetryPolicy::default(),
            jump_handle: None,
            target_handle: None,
            channel: None,
            read_buf: Vec::new(),
            open: false,
        }
    }

    /// Overrides the default retry policy, applied independently to the
    /// jump-host hop and the target hop.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn connect_jump(&self) -> TransportResult<Handle<AcceptAllHostKeys>> {
        let config = Arc::new(client::Config::default());
        let mut handle = client::connect(
            config,
            (self.jump_cred.hostname.as_str(), self.jump_cred.port),
            AcceptAllHostKeys,
        )
        .await
        .map_err(|e| TransportError::Ssh(format!("jump host connect failed: {e}")))?;

        let authenticated = handle
            .authenticate_password(&self.jump_cred.username, &self.jump_cred.password)
            .await
            .map_err(|e| TransportError::Ssh(format!("jump host auth failed: {e}")))?;
        if !authenticated {
            return Err(TransportError::Ssh(format!(
                "jump host rejected authentication for {}@{}",
                self.jump_cred.username, self.jump_cred.hostname
            )));
        }
        Ok(handle)
    }

    async fn connect_target(
        &self,
        jump_handle: &Handle<AcceptAllHostKeys>,
    ) -> TransportResult<Handle<AcceptAllHostKeys>> {
        let tunnel_channel = jump_handle
            .channel_open_direct_tcpip(
                self.target_cred.hostname.as_str(),
                u32::from(self.target_cred.port),
                "127.0.0.1",
                0,
            )
            .await
            .map_err(|e| TransportError::Ssh(format!("failed to open tunnel channel: {e}")))?;
        let tunnel_stream = tunnel_channel.into_stream();

        let config = Arc::new(client::Config::default());
        let mut handle = client::connect_stream(config, tunnel_stream, AcceptAllHostKeys)
            .await
            .map_err(|e| TransportError::Ssh(format!("target connect failed: {e}")))?;

        let authenticated = handle
            .authenticate_password(&self.target_cred.username, &self.target_cred.password)
            .await
            .map_err(|e| TransportError::Ssh(format!("target auth failed: {e}")))?;
        if !authenticated {
            return Err(TransportError::Ssh(format!(
                "target host rejected authentication for {}@{}",
                self.target_cred.username, self.target_cred.hostname
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
impl Transport for SshBridgeTransport {
    async fn start(&mut self, command_line: &str) -> TransportResult<()> {
        let jump_handle = retry_with_backoff(&self.retry, "ssh-bridge-jump", || self.connect_jump()).await?;
        let target_handle =
            retry_with_backoff(&self.retry, "ssh-bridge-target", || self.connect_target(&jump_handle))
                .await?;

        let mut channel = target_handle
            .channel_open_session()
            .await
            .map_err(|e| TransportError::Ssh(e.to_string()))?;
        channel
            .exec(true, command_line)
            .await
            .map_err(|e| TransportError::Ssh(e.to_string()))?;

        self.jump_handle = Some(jump_handle);
        self.target_handle = Some(target_handle);
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
                    tracing::warn!(target: "ddb_transport::ssh_bridge::stderr", "{}", String::from_utf8_lossy(&data));
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
        if let Some(handle) = self.target_handle.take() {
            let _ = handle
                .disconnect(Disconnect::ByApplication, "", "English")
                .await;
        }
        if let Some(handle) = self.jump_handle.take() {
            let _ = handle
                .disconnect(Disconnect::ByApplication, "", "English")
                .await;
        }
        self.open = false;
        Ok(())
    }
}
