//! Control-plane event parsing.
//!
//! Inbound events are UTF-8 text: a literal, case-sensitive prefix followed
//! directly by a JSON payload with no separator. Unknown events are reported
//! to the caller, which ignores them.

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

/// Prefix of the event that starts a shell.
pub const EVENT_SHELL_START: &str = "shell start";

/// Prefix of the event that resizes the terminal.
pub const EVENT_CHANGE_SIZE: &str = "change size";

/// Outbound event emitted when the bridge begins listening to the adapter.
pub const EVENT_SHELL_READY: &str = "shell ready";

/// Outbound event emitted after the PTY and shell requests both succeeded.
pub const EVENT_SESSION_CREATED: &str = "session created";

/// Terminal dimensions as supplied by the client.
///
/// A dimension pair is considered set only when both members are strictly
/// positive. `cols`/`rows` are character cells, `width`/`height` pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalSize {
    pub cols: u32,
    pub rows: u32,
    pub width: u32,
    pub height: u32,
}

impl TerminalSize {
    /// Returns true when the cols/rows pair is set.
    pub fn has_cells(&self) -> bool {
        self.cols > 0 && self.rows > 0
    }

    /// Returns true when the width/height pair is set.
    pub fn has_pixels(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// A parsed inbound control event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    /// Start a shell with the given (possibly unset) terminal size.
    ShellStart(TerminalSize),
    /// Resize the running terminal.
    ChangeSize(TerminalSize),
}

/// Parses an inbound control event.
///
/// Returns `Ok(None)` for events with an unrecognized prefix. The payload of
/// `"shell start"` may be empty, in which case the size is unset; the
/// payload of `"change size"` is required.
pub fn parse_event(text: &str) -> Result<Option<ControlEvent>, BridgeError> {
    if let Some(payload) = text.strip_prefix(EVENT_SHELL_START) {
        let size = if payload.is_empty() {
            TerminalSize::default()
        } else {
            serde_json::from_str(payload)?
        };
        return Ok(Some(ControlEvent::ShellStart(size)));
    }

    if let Some(payload) = text.strip_prefix(EVENT_CHANGE_SIZE) {
        let size: TerminalSize = serde_json::from_str(payload)?;
        return Ok(Some(ControlEvent::ChangeSize(size)));
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shell_start_with_size() {
        let event = parse_event(r#"shell start{"cols":80,"rows":24}"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            ControlEvent::ShellStart(TerminalSize {
                cols: 80,
                rows: 24,
                width: 0,
                height: 0,
            })
        );
    }

    #[test]
    fn test_parse_shell_start_empty_payload() {
        let event = parse_event("shell start").unwrap().unwrap();
        assert_eq!(event, ControlEvent::ShellStart(TerminalSize::default()));
    }

    #[test]
    fn test_parse_change_size_all_fields() {
        let event =
            parse_event(r#"change size{"cols":80,"rows":24,"width":640,"height":480}"#)
                .unwrap()
                .unwrap();
        assert_eq!(
            event,
            ControlEvent::ChangeSize(TerminalSize {
                cols: 80,
                rows: 24,
                width: 640,
                height: 480,
            })
        );
    }

    #[test]
    fn test_parse_change_size_missing_fields_default_to_zero() {
        let event = parse_event(r#"change size{"width":640,"height":480}"#)
            .unwrap()
            .unwrap();
        let ControlEvent::ChangeSize(size) = event else {
            panic!("expected ChangeSize");
        };
        assert!(!size.has_cells());
        assert!(size.has_pixels());
    }

    #[test]
    fn test_parse_unknown_event() {
        assert!(parse_event("file upload{}").unwrap().is_none());
        assert!(parse_event("").unwrap().is_none());
    }

    #[test]
    fn test_parse_prefix_is_case_sensitive() {
        assert!(parse_event("Shell Start{}").unwrap().is_none());
    }

    #[test]
    fn test_parse_change_size_malformed_payload() {
        let result = parse_event("change size{not json");
        assert!(matches!(result, Err(BridgeError::InvalidEvent(_))));
    }

    #[test]
    fn test_size_pair_set_requires_both_positive() {
        let size = TerminalSize {
            cols: 80,
            rows: 0,
            width: 0,
            height: 480,
        };
        assert!(!size.has_cells());
        assert!(!size.has_pixels());
    }
}
