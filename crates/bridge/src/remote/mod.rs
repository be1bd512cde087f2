//! Remote execution seams.
//!
//! The controller drives the remote host through three narrow traits:
//! [`Connector`] acquires a fresh authenticated connection, [`Connection`]
//! opens execution channels, and [`ExecChannel`] performs the PTY/shell
//! handshake before turning into a [`ShellIo`] pair for streaming. The SSH
//! implementation lives in [`ssh`]; the test suite substitutes mocks.

pub mod ssh;

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::mpsc;

use crate::error::{BridgeError, Result};
use crate::events::TerminalSize;

/// Acquires remote connections. One fresh connection per shell start; no
/// caching across restarts.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Dial and authenticate against the remote host.
    async fn acquire(&self) -> Result<Box<dyn Connection>>;
}

/// An authenticated connection to the remote host.
#[async_trait]
pub trait Connection: Send {
    /// Open a new execution channel for a shell.
    async fn open_channel(&mut self) -> Result<Box<dyn ExecChannel>>;

    /// Tear the connection down. Infallible by design: a failed disconnect
    /// of a connection being discarded is logged, not surfaced.
    async fn disconnect(&mut self);
}

/// An execution channel going through the PTY/shell handshake.
///
/// Both requests must be acknowledged by the remote side before
/// [`ExecChannel::start_io`] hands out the streaming pair.
#[async_trait]
pub trait ExecChannel: Send {
    /// Request a PTY with the given terminal type. The cols/rows pair is
    /// included only when set; the implementation supplies the terminal
    /// mode list.
    async fn request_pty(&mut self, term: &str, size: &TerminalSize) -> Result<()>;

    /// Request that the remote side start a shell on the channel.
    async fn request_shell(&mut self) -> Result<()>;

    /// Consume the channel, returning the streaming I/O pair.
    fn start_io(self: Box<Self>) -> ShellIo;
}

/// Streaming I/O for a running shell.
pub struct ShellIo {
    /// The PTY output stream. Acquired once per session; `Ok(0)` is EOF.
    pub output: Box<dyn AsyncRead + Send + Unpin>,
    /// Handle for input bytes and window-change requests.
    pub input: InputHandle,
}

/// A command queued to the session's writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputCommand {
    /// Write bytes to the PTY input stream.
    Data(Bytes),
    /// Inform the remote PTY of new dimensions.
    WindowChange { cols: u32, rows: u32 },
    /// Close the channel, unblocking the output stream.
    Close,
}

/// Queue depth for the per-session writer.
const INPUT_QUEUE_CAPACITY: usize = 64;

/// Handle queueing commands to the single writer task owning the channel.
///
/// The underlying transport is not safe for concurrent writers; routing
/// every write and window-change through one queue serializes them.
#[derive(Clone)]
pub struct InputHandle {
    tx: mpsc::Sender<InputCommand>,
}

impl InputHandle {
    /// Creates a handle and the receiver the writer task drains.
    pub fn new() -> (Self, mpsc::Receiver<InputCommand>) {
        let (tx, rx) = mpsc::channel(INPUT_QUEUE_CAPACITY);
        (Self { tx }, rx)
    }

    /// Queue raw bytes for the PTY input stream, waiting at most `bound`
    /// for queue space.
    pub async fn write(&self, data: Bytes, bound: Duration) -> Result<()> {
        self.tx
            .send_timeout(InputCommand::Data(data), bound)
            .await
            .map_err(|e| BridgeError::WriteFailed(e.to_string()))
    }

    /// Queue a window-change request.
    pub async fn window_change(&self, cols: u32, rows: u32, bound: Duration) -> Result<()> {
        self.tx
            .send_timeout(InputCommand::WindowChange { cols, rows }, bound)
            .await
            .map_err(|e| BridgeError::WindowChangeFailed(e.to_string()))
    }

    /// Ask the writer task to close the channel. A dead writer already
    /// closed it, so a send failure is not an error.
    pub async fn close(&self) {
        let _ = self.tx.send(InputCommand::Close).await;
    }
}

/// Adapts a queue of output chunks to [`AsyncRead`].
///
/// The writer task owning the real stream feeds the queue; the end of the
/// queue is end-of-stream. A queued error is surfaced once and the reader
/// keeps going, leaving retry policy to the caller.
pub struct QueueReader {
    rx: mpsc::Receiver<io::Result<Bytes>>,
    pending: Bytes,
}

impl QueueReader {
    pub fn new(rx: mpsc::Receiver<io::Result<Bytes>>) -> Self {
        Self {
            rx,
            pending: Bytes::new(),
        }
    }
}

impl AsyncRead for QueueReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.pending.is_empty() {
            match self.rx.poll_recv(cx) {
                Poll::Ready(Some(Ok(bytes))) => self.pending = bytes,
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Err(e)),
                Poll::Ready(None) => return Poll::Ready(Ok(())),
                Poll::Pending => return Poll::Pending,
            }
        }

        let n = self.pending.len().min(buf.remaining());
        buf.put_slice(&self.pending.split_to(n));
        Poll::Ready(Ok(()))
    }
}
