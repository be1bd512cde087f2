//! Client channel adapter.
//!
//! The bridge never talks to a socket directly: the embedding transport
//! (typically a WebSocket handler) delivers inbound [`ClientMessage`]s over
//! an mpsc receiver and implements [`ClientChannel`] for the outbound
//! direction. Events are UTF-8 text, data is raw bytes forwarded verbatim.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

/// An inbound message from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// A control-plane event (UTF-8 text).
    Event(String),
    /// Raw terminal bytes for the PTY input stream.
    Data(Bytes),
    /// The client connection closed.
    Closed,
}

/// An outbound message to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    /// Raw terminal bytes from the PTY output stream.
    Data(Bytes),
    /// A control-plane event.
    Event(String),
    /// A human-readable error.
    Error(String),
}

/// Outbound side of the client channel.
///
/// Implementations must tolerate a gone client: send failures are logged by
/// the bridge, never escalated.
#[async_trait]
pub trait ClientChannel: Send + Sync {
    /// Forward raw terminal output to the client.
    async fn send_data(&self, data: Bytes);

    /// Send a control-plane event to the client.
    async fn send_event(&self, event: &str);

    /// Send a human-readable error to the client.
    async fn send_error(&self, message: &str);
}

/// [`ClientChannel`] implementation backed by an mpsc sender.
///
/// The embedding transport drains the paired receiver and writes each
/// [`OutboundMessage`] to the wire.
pub struct MpscClientChannel {
    tx: mpsc::Sender<OutboundMessage>,
}

impl MpscClientChannel {
    /// Creates a channel with the given buffer capacity, returning the
    /// adapter and the receiver the transport drains.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<OutboundMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ClientChannel for MpscClientChannel {
    async fn send_data(&self, data: Bytes) {
        if self.tx.send(OutboundMessage::Data(data)).await.is_err() {
            tracing::debug!("client channel gone, dropping data");
        }
    }

    async fn send_event(&self, event: &str) {
        if self
            .tx
            .send(OutboundMessage::Event(event.to_string()))
            .await
            .is_err()
        {
            tracing::debug!(event = %event, "client channel gone, dropping event");
        }
    }

    async fn send_error(&self, message: &str) {
        if self
            .tx
            .send(OutboundMessage::Error(message.to_string()))
            .await
            .is_err()
        {
            tracing::debug!(message = %message, "client channel gone, dropping error");
        }
    }
}
