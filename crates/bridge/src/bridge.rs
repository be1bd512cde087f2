//! The session bridge controller.
//!
//! [`ShellBridge`] ties one client channel to one SSH shell session: it
//! dispatches inbound control events and data, drives the connection and
//! PTY/shell handshake on a setup task, and runs the outbound pump that
//! relays terminal output back to the client.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::FutureExt;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, error, info, trace, warn};

use crate::channel::{ClientChannel, ClientMessage};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::events::{
    parse_event, ControlEvent, TerminalSize, EVENT_SESSION_CREATED, EVENT_SHELL_READY,
};
use crate::registry::SessionRegistry;
use crate::remote::Connector;
use crate::session::Session;

/// Terminal type requested for every PTY.
const TERM: &str = "xterm";

/// Upper bound on a single outbound chunk. Whatever one read returns is
/// forwarded immediately; latency over throughput.
const READ_CHUNK_SIZE: usize = 1024;

/// Bridges one client connection to a shell on the remote host.
pub struct ShellBridge {
    token: String,
    adapter: Arc<dyn ClientChannel>,
    connector: Arc<dyn Connector>,
    registry: Arc<SessionRegistry>,
    config: BridgeConfig,
}

impl ShellBridge {
    pub fn new(
        token: String,
        adapter: Arc<dyn ClientChannel>,
        connector: Arc<dyn Connector>,
        registry: Arc<SessionRegistry>,
        config: BridgeConfig,
    ) -> Self {
        Self {
            token,
            adapter,
            connector,
            registry,
            config,
        }
    }

    /// The token naming this bridge's session.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Processes inbound client messages until the channel closes.
    ///
    /// Emits `"shell ready"` immediately, then handles messages in delivery
    /// order. A failure while handling one message is logged and the bridge
    /// keeps going; panics are caught at the same boundary. The session is
    /// closed when the client disconnects or the sender side is dropped.
    pub async fn run(self: Arc<Self>, mut inbound: mpsc::Receiver<ClientMessage>) {
        self.adapter.send_event(EVENT_SHELL_READY).await;

        while let Some(message) = inbound.recv().await {
            if matches!(message, ClientMessage::Closed) {
                debug!(token = %self.token, "client channel closed");
                break;
            }

            let handled = AssertUnwindSafe(self.handle_message(message))
                .catch_unwind()
                .await;
            match handled {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(token = %self.token, error = %e, "message handling failed");
                }
                Err(_) => {
                    error!(token = %self.token, "message handler panicked, session continues");
                }
            }
        }

        self.close().await;
    }

    async fn handle_message(&self, message: ClientMessage) -> Result<()> {
        match message {
            ClientMessage::Event(text) => match parse_event(&text)? {
                Some(ControlEvent::ShellStart(size)) => self.start_shell(size).await,
                Some(ControlEvent::ChangeSize(size)) => self.change_size(size).await,
                None => {
                    debug!(token = %self.token, event = %text, "ignoring unknown event");
                    Ok(())
                }
            },
            ClientMessage::Data(bytes) => self.send_input(bytes).await,
            ClientMessage::Closed => Ok(()),
        }
    }

    /// Starts a shell session, replacing any prior session for this token.
    ///
    /// The connect/handshake sequence runs on its own task; this method
    /// waits for its single-fire ready signal with a bounded timeout. On
    /// success it emits `"session created"`, waits out the settle delay and
    /// starts the outbound pump. On any failure the error is surfaced to
    /// the client and the session is discarded without retry.
    pub async fn start_shell(&self, size: TerminalSize) -> Result<()> {
        if let Some(existing) = self.registry.get(&self.token) {
            info!(token = %self.token, "closing prior session before new shell");
            self.teardown(existing, true).await;
        }

        let session = Arc::new(Session::new(self.token.clone(), size));
        self.registry.put(Arc::clone(&session));

        let (ready_tx, ready_rx) = oneshot::channel();
        let setup = tokio::spawn(Self::setup_session(
            Arc::clone(&self.connector),
            Arc::clone(&session),
            size,
            ready_tx,
        ));

        let output = match timeout(self.config.timeouts.ready(), ready_rx).await {
            Ok(Ok(Ok(output))) => output,
            Ok(Ok(Err(e))) => {
                self.fail_setup(&session, &e).await;
                return Err(e);
            }
            Ok(Err(_)) | Err(_) => {
                setup.abort();
                let e = BridgeError::SetupTimeout(self.config.timeouts.ready());
                self.fail_setup(&session, &e).await;
                return Err(e);
            }
        };

        info!(token = %self.token, "shell session established");
        self.adapter.send_event(EVENT_SESSION_CREATED).await;

        // Let the remote shell finish its own startup banner before the
        // client starts seeing (and typing into) the stream.
        tokio::time::sleep(self.config.timeouts.settle_delay()).await;
        session.mark_streaming();

        let pump = tokio::spawn(run_pump(
            Arc::clone(&self.adapter),
            Arc::clone(&self.registry),
            Arc::clone(&session),
            output,
            self.config.pump.read_retry_attempts,
            Duration::from_millis(self.config.pump.read_retry_backoff_ms),
        ));
        session.set_pump(pump);

        Ok(())
    }

    /// Connection and handshake sequence, run on its own task. The session
    /// takes ownership of each resource as soon as it is acquired, so the
    /// failure path releases everything through the normal teardown.
    async fn setup_session(
        connector: Arc<dyn Connector>,
        session: Arc<Session>,
        size: TerminalSize,
        ready_tx: oneshot::Sender<Result<Box<dyn AsyncRead + Send + Unpin>>>,
    ) {
        let result = async {
            let mut connection = connector.acquire().await?;
            let channel = match connection.open_channel().await {
                Ok(channel) => channel,
                Err(e) => {
                    connection.disconnect().await;
                    return Err(e);
                }
            };
            session.set_connection(connection).await;

            let mut channel = channel;
            channel.request_pty(TERM, &size).await?;
            channel.request_shell().await?;

            let io = channel.start_io();
            session.set_input(io.input);
            session.mark_ready();
            Ok(io.output)
        }
        .await;

        // The waiter may have timed out and gone away; resources are in the
        // session either way, so nothing leaks.
        let _ = ready_tx.send(result);
    }

    async fn fail_setup(&self, session: &Arc<Session>, error: &BridgeError) {
        warn!(token = %self.token, error = %error, "shell setup failed");
        let message = match error {
            BridgeError::Connection(reason) => format!("connection failed: {reason}"),
            BridgeError::AuthenticationFailed { .. } => format!("connection failed: {error}"),
            _ => format!("shell setup failed: {error}"),
        };
        self.adapter.send_error(&message).await;
        self.teardown(Arc::clone(session), true).await;
    }

    /// Propagates a terminal resize to the running session.
    ///
    /// A no-op without a session, or outside Ready/Streaming. When the
    /// cols/rows pair is set, one window-change carries it; when the
    /// width/height pair is set, a second window-change carries that pair
    /// in the same fields. Both fire for one call when both pairs are set.
    pub async fn change_size(&self, size: TerminalSize) -> Result<()> {
        let Some(session) = self.registry.get(&self.token) else {
            return Ok(());
        };
        if !session.accepts_resize() {
            debug!(token = %self.token, state = ?session.state(), "resize ignored");
            return Ok(());
        }
        let Some(input) = session.input() else {
            return Ok(());
        };

        session.set_size(size);
        let bound = self.config.timeouts.write_enqueue();
        if size.has_cells() {
            input.window_change(size.cols, size.rows, bound).await?;
        }
        if size.has_pixels() {
            input.window_change(size.width, size.height, bound).await?;
        }
        Ok(())
    }

    /// Forwards raw client bytes to the PTY input stream.
    ///
    /// Input delivered before the session reaches Streaming is dropped;
    /// there is no queueing across the handshake boundary.
    pub async fn send_input(&self, bytes: Bytes) -> Result<()> {
        let Some(session) = self.registry.get(&self.token) else {
            return Ok(());
        };
        if !session.is_streaming() {
            trace!(token = %self.token, len = bytes.len(), "input dropped before streaming");
            return Ok(());
        }
        let Some(input) = session.input() else {
            return Ok(());
        };

        input
            .write(bytes, self.config.timeouts.write_enqueue())
            .await
    }

    /// Closes this bridge's session, if any. Idempotent.
    pub async fn close(&self) {
        if let Some(session) = self.registry.get(&self.token) {
            self.teardown(session, true).await;
        }
    }

    /// Tears a session down: close the shell channel (which unblocks the
    /// pump's read), disconnect, drop the registry entry. Exactly one
    /// caller runs the sequence; the rest return immediately.
    async fn teardown(&self, session: Arc<Session>, await_pump: bool) {
        if !session.begin_close() {
            return;
        }

        if let Some(input) = session.take_input() {
            input.close().await;
        }
        if let Some(mut connection) = session.take_connection().await {
            connection.disconnect().await;
        }
        self.registry.remove(session.token());

        match session.take_pump() {
            Some(pump) if await_pump => {
                let _ = pump.await;
            }
            _ => {}
        }

        session.finish_close();
        info!(token = %self.token, "session closed");
    }
}

/// The outbound pump: one long-lived task per session, one blocking read at
/// a time on a reader acquired once for the session's whole life.
///
/// EOF closes the session without an error event. Non-EOF read errors are
/// transient: retried with doubling backoff up to `max_attempts`, then the
/// session is closed with an error event.
async fn run_pump(
    adapter: Arc<dyn ClientChannel>,
    registry: Arc<SessionRegistry>,
    session: Arc<Session>,
    mut output: Box<dyn AsyncRead + Send + Unpin>,
    max_attempts: u32,
    initial_backoff: Duration,
) {
    let token = session.token().to_string();
    let mut buf = vec![0u8; READ_CHUNK_SIZE];
    let mut failures = 0u32;
    let mut backoff = initial_backoff;

    loop {
        match output.read(&mut buf).await {
            Ok(0) => {
                info!(token = %token, "remote output stream ended");
                finish_session(&adapter, &registry, &session, None).await;
                return;
            }
            Ok(n) => {
                failures = 0;
                backoff = initial_backoff;
                adapter.send_data(Bytes::copy_from_slice(&buf[..n])).await;
            }
            Err(e) => {
                failures += 1;
                if failures >= max_attempts {
                    error!(token = %token, error = %e, "giving up on remote output stream");
                    finish_session(
                        &adapter,
                        &registry,
                        &session,
                        Some(format!("shell read failed: {e}")),
                    )
                    .await;
                    return;
                }
                warn!(
                    token = %token,
                    error = %e,
                    attempt = failures,
                    "transient read error, retrying"
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
        }
    }
}

/// Teardown driven from inside the pump task. Never awaits the pump's own
/// join handle.
async fn finish_session(
    adapter: &Arc<dyn ClientChannel>,
    registry: &Arc<SessionRegistry>,
    session: &Arc<Session>,
    error: Option<String>,
) {
    if !session.begin_close() {
        return;
    }
    if let Some(message) = &error {
        adapter.send_error(message).await;
    }
    if let Some(input) = session.take_input() {
        input.close().await;
    }
    if let Some(mut connection) = session.take_connection().await {
        connection.disconnect().await;
    }
    registry.remove(session.token());
    session.take_pump();
    session.finish_close();
    info!(token = %session.token(), "session closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::OutboundMessage;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Adapter recording everything sent to the client.
    #[derive(Default)]
    struct RecordingChannel {
        sent: Mutex<Vec<OutboundMessage>>,
    }

    impl RecordingChannel {
        fn messages(&self) -> Vec<OutboundMessage> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ClientChannel for RecordingChannel {
        async fn send_data(&self, data: Bytes) {
            self.sent.lock().unwrap().push(OutboundMessage::Data(data));
        }
        async fn send_event(&self, event: &str) {
            self.sent
                .lock()
                .unwrap()
                .push(OutboundMessage::Event(event.to_string()));
        }
        async fn send_error(&self, message: &str) {
            self.sent
                .lock()
                .unwrap()
                .push(OutboundMessage::Error(message.to_string()));
        }
    }

    /// Connector that always fails to dial.
    struct FailingConnector;

    #[async_trait]
    impl Connector for FailingConnector {
        async fn acquire(&self) -> Result<Box<dyn crate::remote::Connection>> {
            Err(BridgeError::Connection("dial refused".to_string()))
        }
    }

    fn bridge_with(
        connector: Arc<dyn Connector>,
    ) -> (Arc<ShellBridge>, Arc<RecordingChannel>, Arc<SessionRegistry>) {
        let adapter = Arc::new(RecordingChannel::default());
        let registry = Arc::new(SessionRegistry::new());
        let mut config = BridgeConfig::default();
        config.timeouts.settle_delay_ms = 0;
        let bridge = Arc::new(ShellBridge::new(
            "tok".to_string(),
            Arc::clone(&adapter) as Arc<dyn ClientChannel>,
            connector,
            Arc::clone(&registry),
            config,
        ));
        (bridge, adapter, registry)
    }

    #[tokio::test]
    async fn test_change_size_without_session_is_noop() {
        let (bridge, adapter, _registry) = bridge_with(Arc::new(FailingConnector));

        bridge
            .change_size(TerminalSize {
                cols: 80,
                rows: 24,
                width: 0,
                height: 0,
            })
            .await
            .unwrap();

        assert!(adapter.messages().is_empty());
    }

    #[tokio::test]
    async fn test_send_input_without_session_is_noop() {
        let (bridge, adapter, _registry) = bridge_with(Arc::new(FailingConnector));

        bridge.send_input(Bytes::from_static(b"ls\n")).await.unwrap();

        assert!(adapter.messages().is_empty());
    }

    #[tokio::test]
    async fn test_close_without_session_is_noop() {
        let (bridge, _adapter, registry) = bridge_with(Arc::new(FailingConnector));

        bridge.close().await;
        bridge.close().await;

        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_failed_dial_surfaces_error_and_discards_session() {
        let (bridge, adapter, registry) = bridge_with(Arc::new(FailingConnector));

        let result = bridge.start_shell(TerminalSize::default()).await;
        assert!(matches!(result, Err(BridgeError::Connection(_))));

        let messages = adapter.messages();
        assert_eq!(messages.len(), 1);
        assert!(matches!(
            &messages[0],
            OutboundMessage::Error(m) if m.starts_with("connection failed: ")
        ));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_event_is_ignored() {
        let (bridge, adapter, _registry) = bridge_with(Arc::new(FailingConnector));

        bridge
            .handle_message(ClientMessage::Event("file upload{}".to_string()))
            .await
            .unwrap();

        assert!(adapter.messages().is_empty());
    }
}
