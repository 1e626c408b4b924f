//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::board::{InputKey, DEFAULT_ITEMS};
use crate::events::DaemonEvent;

/// Largest accepted message body
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Requests from UI to daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Request current daemon status
    GetStatus,

    /// Ping to check connectivity
    Ping,

    /// Subscribe to dwell and board notifications
    Subscribe,

    /// Pointer entered a dwell target
    PointerEnter { key: String },

    /// Pointer left a dwell target
    PointerLeave { key: String },

    /// Abandon the current dwell
    ResetDwell,

    /// Speak `text`, or the board text when absent
    Speak {
        #[serde(default)]
        text: Option<String>,
    },

    /// Stop speaking
    Stop,

    /// Discrete Select/Back key
    Key { key: InputKey },

    /// Undo the last board edit
    Undo,
}

/// Responses from daemon to UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Current daemon status
    Status(DaemonStatus),

    /// Pong response to ping
    Pong,

    /// Request accepted
    Ack,

    /// Subscription confirmed
    Subscribed,

    /// Error response
    Error { code: String, message: String },
}

impl Response {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Response::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Push notification from daemon to UI (for subscribed clients)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// Dwell or board event occurred
    Event { event: DaemonEvent },
}

/// Full daemon status snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Uptime in seconds
    pub uptime_secs: u64,

    /// Key currently focused by dwell, if any
    pub focused_key: Option<String>,

    /// Board text
    pub text: String,

    /// Keys laid out on the board
    pub items: Vec<String>,

    /// Whether speech has moved to the serialized lane
    pub serialized_lane: bool,
}

impl Default for DaemonStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: 0,
            focused_key: None,
            text: String::new(),
            items: DEFAULT_ITEMS.iter().map(|item| item.to_string()).collect(),
            serialized_lane: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let req = Request::PointerEnter { key: "あ".into() };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("pointer_enter"));
        assert!(json.contains("あ"));
    }

    #[test]
    fn test_speak_text_is_optional() {
        let req: Request = serde_json::from_str(r#"{"type":"speak"}"#).unwrap();
        assert_eq!(req, Request::Speak { text: None });

        let req: Request = serde_json::from_str(r#"{"type":"key","key":"back"}"#).unwrap();
        assert_eq!(req, Request::Key { key: InputKey::Back });
    }

    #[test]
    fn test_response_serialization() {
        let resp = Response::Status(DaemonStatus::default());
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("status"));
        assert!(json.contains("読み上げ"));
    }

    #[test]
    fn test_notification_serialization() {
        let note = Notification::Event {
            event: DaemonEvent::Committed { key: "い".into() },
        };
        let json = serde_json::to_string(&note).unwrap();
        let back: Notification = serde_json::from_str(&json).unwrap();
        assert_eq!(back, note);
    }
}
