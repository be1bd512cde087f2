//! Error types for the bridge crate.

use thiserror::Error;

/// Bridge error type covering all possible failure modes.
#[derive(Debug, Error)]
pub enum BridgeError {
    // Connection errors
    /// Failed to dial or authenticate against the remote host.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Remote host rejected the supplied credentials.
    #[error("authentication failed for user {user}")]
    AuthenticationFailed {
        /// The rejected user name.
        user: String,
    },

    // Session setup errors
    /// The PTY allocation request was rejected or failed.
    #[error("pty request failed: {0}")]
    PtyRequestFailed(String),

    /// The shell-start request was rejected or failed.
    #[error("shell request failed: {0}")]
    ShellRequestFailed(String),

    /// Failed to open an execution channel on the connection.
    #[error("channel open failed: {0}")]
    ChannelOpenFailed(String),

    // Streaming errors
    /// Failed to write to the PTY input stream.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// Failed to issue a window-change request.
    #[error("window change failed: {0}")]
    WindowChangeFailed(String),

    /// The remote output stream failed with a non-EOF error.
    #[error("read failed: {0}")]
    ReadFailed(String),

    // Lifecycle errors
    /// The handshake did not complete within the configured timeout.
    #[error("session setup timed out after {0:?}")]
    SetupTimeout(std::time::Duration),

    /// The session has already been closed.
    #[error("session closed: {token}")]
    SessionClosed {
        /// Token of the closed session.
        token: String,
    },

    // Control-plane errors
    /// An inbound control event could not be parsed.
    #[error("invalid event: {0}")]
    InvalidEvent(String),
}

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

impl From<russh::Error> for BridgeError {
    fn from(err: russh::Error) -> Self {
        BridgeError::Connection(err.to_string())
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::InvalidEvent(err.to_string())
    }
}
