//! # ShellBridge session bridge
//!
//! Relays an interactive remote shell: a client-side bidirectional message
//! channel is bridged to a PTY session on a remote host reached over SSH.
//! One logical session is identified by an opaque token; the bridge turns
//! control events (start, resize) into SSH requests and streams raw
//! terminal bytes both ways with minimal added latency.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       ShellBridge                        │
//! ├──────────────────────────────────────────────────────────┤
//! │  ClientChannel ──► event dispatch ──► setup task         │
//! │       ▲                                   │              │
//! │       │                             SshConnector         │
//! │       │                                   │              │
//! │  outbound pump ◄── channel actor ◄── SSH channel         │
//! │                                                          │
//! │  SessionRegistry: token ──► Session (state machine)      │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use bridge::{
//!     BridgeConfig, ClientMessage, MpscClientChannel, SessionRegistry, ShellBridge,
//!     SshConnector,
//! };
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = BridgeConfig::load(std::path::Path::new("bridge.toml"))?;
//!     config.validate()?;
//!
//!     let (adapter, mut outbound) = MpscClientChannel::new(64);
//!     let (inbound_tx, inbound_rx) = mpsc::channel::<ClientMessage>(64);
//!     let connector = Arc::new(SshConnector::new(
//!         config.target.clone(),
//!         Duration::from_secs(config.timeouts.connect_secs),
//!     ));
//!
//!     let bridge = Arc::new(ShellBridge::new(
//!         "token-from-client".to_string(),
//!         Arc::new(adapter),
//!         connector,
//!         Arc::new(SessionRegistry::new()),
//!         config,
//!     ));
//!
//!     // The embedding transport feeds inbound_tx and drains `outbound`.
//!     bridge.run(inbound_rx).await;
//!     # let _ = (inbound_tx, outbound.recv());
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: TOML configuration for the SSH target and timing knobs
//! - [`channel`]: the client channel adapter (events, data, close)
//! - [`events`]: control-plane event literals and parsing
//! - [`remote`]: connection/channel seams and the `russh` implementation
//! - [`session`]: per-session state machine and owned handles
//! - [`registry`]: process-wide token → session map
//! - [`bridge`]: the controller tying it all together

pub mod bridge;
pub mod channel;
pub mod config;
pub mod error;
pub mod events;
pub mod registry;
pub mod remote;
pub mod session;

// Re-export the main types for convenience
pub use bridge::ShellBridge;
pub use channel::{ClientChannel, ClientMessage, MpscClientChannel, OutboundMessage};
pub use config::{BridgeConfig, ConfigError, PumpConfig, TargetConfig, TimeoutConfig};
pub use error::{BridgeError, Result};
pub use events::{ControlEvent, TerminalSize, EVENT_SESSION_CREATED, EVENT_SHELL_READY};
pub use registry::SessionRegistry;
pub use remote::ssh::SshConnector;
pub use remote::{
    Connection, Connector, ExecChannel, InputCommand, InputHandle, QueueReader, ShellIo,
};
pub use session::{Session, SessionState};
