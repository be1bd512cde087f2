//! Session state for one bridged shell.
//!
//! A session is created on `shell start`, owns its connection and shell
//! handles exclusively, and moves through a fixed set of states. The
//! controller in [`crate::bridge`] drives the transitions; this module only
//! enforces them.

use std::sync::Mutex;

use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use crate::events::TerminalSize;
use crate::remote::{Connection, InputHandle};

/// Lifecycle states of a session.
///
/// Advancement is strictly `Connecting → Ready → Streaming → Closing →
/// Closed`; any setup failure jumps straight to `Closed`. A fresh shell
/// start on the same token creates a new [`Session`] value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No shell yet; transient, only observable before the handshake task
    /// is spawned.
    Idle,
    /// Connection and handshake in flight.
    Connecting,
    /// PTY and shell acknowledged; streaming not yet begun.
    Ready,
    /// The outbound pump is running.
    Streaming,
    /// Teardown in progress.
    Closing,
    /// Fully torn down.
    Closed,
}

/// One bridged shell session.
pub struct Session {
    token: String,
    state: Mutex<SessionState>,
    size: Mutex<TerminalSize>,
    /// Writer handle for the running shell; present from Ready until close.
    input: Mutex<Option<InputHandle>>,
    /// The underlying connection, kept for deterministic teardown.
    connection: AsyncMutex<Option<Box<dyn Connection>>>,
    /// The outbound pump task, awaited on close.
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// Creates a session in `Connecting` state.
    pub fn new(token: String, size: TerminalSize) -> Self {
        Self {
            token,
            state: Mutex::new(SessionState::Connecting),
            size: Mutex::new(size),
            input: Mutex::new(None),
            connection: AsyncMutex::new(None),
            pump: Mutex::new(None),
        }
    }

    /// The client-supplied token naming this session.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    /// Last known terminal size.
    pub fn size(&self) -> TerminalSize {
        *self.size.lock().unwrap()
    }

    /// Records a new terminal size.
    pub fn set_size(&self, size: TerminalSize) {
        *self.size.lock().unwrap() = size;
    }

    /// Marks the handshake complete. No-op if teardown already started.
    pub fn mark_ready(&self) {
        let mut state = self.state.lock().unwrap();
        if *state == SessionState::Connecting {
            *state = SessionState::Ready;
        }
    }

    /// Marks streaming as begun. No-op unless the session is Ready.
    pub fn mark_streaming(&self) {
        let mut state = self.state.lock().unwrap();
        if *state == SessionState::Ready {
            *state = SessionState::Streaming;
        }
    }

    /// Claims the right to tear the session down.
    ///
    /// Exactly one caller gets `true`; concurrent and repeated callers see
    /// `false` and must not touch the handles.
    pub fn begin_close(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        match *state {
            SessionState::Closing | SessionState::Closed => false,
            _ => {
                *state = SessionState::Closing;
                true
            }
        }
    }

    /// Marks teardown complete.
    pub fn finish_close(&self) {
        *self.state.lock().unwrap() = SessionState::Closed;
    }

    /// Returns whether resize requests are currently accepted.
    pub fn accepts_resize(&self) -> bool {
        matches!(self.state(), SessionState::Ready | SessionState::Streaming)
    }

    /// Returns whether input bytes are currently forwarded.
    pub fn is_streaming(&self) -> bool {
        self.state() == SessionState::Streaming
    }

    /// Installs the writer handle once the handshake succeeded.
    pub fn set_input(&self, input: InputHandle) {
        *self.input.lock().unwrap() = Some(input);
    }

    /// Clones the writer handle, if the shell is still up.
    pub fn input(&self) -> Option<InputHandle> {
        self.input.lock().unwrap().clone()
    }

    /// Removes and returns the writer handle.
    pub fn take_input(&self) -> Option<InputHandle> {
        self.input.lock().unwrap().take()
    }

    /// Stores the connection for later teardown.
    pub async fn set_connection(&self, connection: Box<dyn Connection>) {
        *self.connection.lock().await = Some(connection);
    }

    /// Removes and returns the connection.
    pub async fn take_connection(&self) -> Option<Box<dyn Connection>> {
        self.connection.lock().await.take()
    }

    /// Stores the outbound pump task handle.
    pub fn set_pump(&self, handle: JoinHandle<()>) {
        *self.pump.lock().unwrap() = Some(handle);
    }

    /// Removes and returns the pump task handle.
    pub fn take_pump(&self) -> Option<JoinHandle<()>> {
        self.pump.lock().unwrap().take()
    }
}
