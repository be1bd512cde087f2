//! SSH implementation of the remote execution seams, built on `russh`.
//!
//! Each session gets one connection, one execution channel, and one channel
//! actor. The actor is the only owner of the russh channel: it forwards
//! output messages to the session's reader and drains the input queue, so
//! writes and window-change requests are never issued concurrently.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use russh::client::{self, Handle};
use russh::keys::{load_secret_key, ssh_key, PrivateKeyWithHashAlg};
use russh::{Channel, ChannelMsg, Disconnect, Pty};
use tokio::sync::mpsc;

use super::{Connection, Connector, ExecChannel, InputCommand, InputHandle, QueueReader, ShellIo};
use crate::config::TargetConfig;
use crate::error::{BridgeError, Result};
use crate::events::TerminalSize;

/// Queue depth between the channel actor and the session's reader.
const OUTPUT_QUEUE_CAPACITY: usize = 64;

/// Terminal mode list sent with every PTY request: echo on, standard
/// input/output speeds.
fn terminal_modes() -> Vec<(Pty, u32)> {
    vec![
        (Pty::ECHO, 1),
        (Pty::TTY_OP_ISPEED, 14400),
        (Pty::TTY_OP_OSPEED, 14400),
    ]
}

/// [`Connector`] dialing an SSH target with password or key authentication.
pub struct SshConnector {
    target: TargetConfig,
    connect_timeout: Duration,
}

impl SshConnector {
    pub fn new(target: TargetConfig, connect_timeout: Duration) -> Self {
        Self {
            target,
            connect_timeout,
        }
    }

    async fn authenticate(&self, handle: &mut Handle<AcceptingHandler>) -> Result<()> {
        let user = &self.target.username;

        let authenticated = if let Some(password) = &self.target.password {
            handle
                .authenticate_password(user, password)
                .await?
                .success()
        } else if let Some(key_file) = &self.target.key_file {
            let key = load_secret_key(key_file, self.target.key_passphrase.as_deref())
                .map_err(|e| {
                    BridgeError::Connection(format!(
                        "failed to load key {}: {e}",
                        key_file.display()
                    ))
                })?;
            let hash = handle.best_supported_rsa_hash().await?.flatten();
            handle
                .authenticate_publickey(user, PrivateKeyWithHashAlg::new(Arc::new(key), hash))
                .await?
                .success()
        } else {
            return Err(BridgeError::Connection(
                "no authentication method configured".to_string(),
            ));
        };

        if !authenticated {
            return Err(BridgeError::AuthenticationFailed { user: user.clone() });
        }
        Ok(())
    }
}

#[async_trait]
impl Connector for SshConnector {
    async fn acquire(&self) -> Result<Box<dyn Connection>> {
        let config = Arc::new(client::Config::default());
        let addr = (self.target.host.as_str(), self.target.port);

        let mut handle = tokio::time::timeout(
            self.connect_timeout,
            client::connect(config, addr, AcceptingHandler),
        )
        .await
        .map_err(|_| {
            BridgeError::Connection(format!(
                "connect to {}:{} timed out",
                self.target.host, self.target.port
            ))
        })?
        .map_err(|e| BridgeError::Connection(e.to_string()))?;

        self.authenticate(&mut handle).await?;

        tracing::debug!(
            host = %self.target.host,
            port = self.target.port,
            user = %self.target.username,
            "SSH connection established"
        );

        Ok(Box::new(SshConnection { handle }))
    }
}

/// Client-side handler for the SSH transport.
///
/// Host key verification is the embedder's concern; credentials and trust
/// are assumed supplied externally.
struct AcceptingHandler;

impl client::Handler for AcceptingHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        Ok(true)
    }
}

/// An authenticated SSH connection.
struct SshConnection {
    handle: Handle<AcceptingHandler>,
}

#[async_trait]
impl Connection for SshConnection {
    async fn open_channel(&mut self) -> Result<Box<dyn ExecChannel>> {
        let channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| BridgeError::ChannelOpenFailed(e.to_string()))?;
        Ok(Box::new(SshExecChannel { channel }))
    }

    async fn disconnect(&mut self) {
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
        {
            tracing::debug!(error = %e, "SSH disconnect failed");
        }
    }
}

/// An SSH execution channel before streaming starts.
struct SshExecChannel {
    channel: Channel<client::Msg>,
}

impl SshExecChannel {
    /// Waits for the reply to a want-reply request sent on the channel.
    async fn wait_ack(&mut self) -> std::result::Result<(), String> {
        loop {
            match self.channel.wait().await {
                Some(ChannelMsg::Success) => return Ok(()),
                Some(ChannelMsg::Failure) => return Err("rejected by remote".to_string()),
                None => return Err("channel closed".to_string()),
                Some(_) => continue,
            }
        }
    }
}

#[async_trait]
impl ExecChannel for SshExecChannel {
    async fn request_pty(&mut self, term: &str, size: &TerminalSize) -> Result<()> {
        let (cols, rows) = if size.has_cells() {
            (size.cols, size.rows)
        } else {
            (0, 0)
        };
        let (width, height) = if size.has_pixels() {
            (size.width, size.height)
        } else {
            (0, 0)
        };

        self.channel
            .request_pty(true, term, cols, rows, width, height, &terminal_modes())
            .await
            .map_err(|e| BridgeError::PtyRequestFailed(e.to_string()))?;
        self.wait_ack().await.map_err(BridgeError::PtyRequestFailed)
    }

    async fn request_shell(&mut self) -> Result<()> {
        self.channel
            .request_shell(true)
            .await
            .map_err(|e| BridgeError::ShellRequestFailed(e.to_string()))?;
        self.wait_ack().await.map_err(BridgeError::ShellRequestFailed)
    }

    fn start_io(self: Box<Self>) -> ShellIo {
        let (data_tx, data_rx) = mpsc::channel(OUTPUT_QUEUE_CAPACITY);
        let (input, input_rx) = InputHandle::new();

        tokio::spawn(run_channel(self.channel, data_tx, input_rx));

        ShellIo {
            output: Box::new(QueueReader::new(data_rx)),
            input,
        }
    }
}

/// Single-owner loop over the russh channel.
///
/// Exits on remote EOF/close, on a failed write, or when asked to close;
/// dropping `data_tx` on exit is what ends the reader with EOF.
async fn run_channel(
    mut channel: Channel<client::Msg>,
    data_tx: mpsc::Sender<io::Result<Bytes>>,
    mut input_rx: mpsc::Receiver<InputCommand>,
) {
    loop {
        tokio::select! {
            msg = channel.wait() => match msg {
                Some(ChannelMsg::Data { ref data })
                | Some(ChannelMsg::ExtendedData { ref data, .. }) => {
                    if data_tx.send(Ok(Bytes::copy_from_slice(data))).await.is_err() {
                        break;
                    }
                }
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => break,
                Some(_) => {}
            },
            cmd = input_rx.recv() => match cmd {
                Some(InputCommand::Data(bytes)) => {
                    if let Err(e) = channel.data(&bytes[..]).await {
                        let _ = data_tx.send(Err(io::Error::other(e.to_string()))).await;
                        break;
                    }
                }
                Some(InputCommand::WindowChange { cols, rows }) => {
                    if let Err(e) = channel.window_change(cols, rows, 0, 0).await {
                        tracing::warn!(error = %e, "window change failed");
                    }
                }
                Some(InputCommand::Close) | None => {
                    let _ = channel.eof().await;
                    let _ = channel.close().await;
                    break;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_modes() {
        let modes = terminal_modes();
        assert_eq!(modes.len(), 3);
        assert!(modes.contains(&(Pty::ECHO, 1)));
        assert!(modes.contains(&(Pty::TTY_OP_ISPEED, 14400)));
        assert!(modes.contains(&(Pty::TTY_OP_OSPEED, 14400)));
    }

    #[tokio::test]
    async fn test_connector_fails_against_unreachable_target() {
        // Empty host: the dial fails before authentication is attempted.
        let connector =
            SshConnector::new(TargetConfig::default(), Duration::from_millis(50));
        let result = connector.acquire().await;
        assert!(matches!(result, Err(BridgeError::Connection(_))));
    }
}
