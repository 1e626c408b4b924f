//! Events module for dwell and board notifications
//!
//! Provides the structured events broadcast to the controller and to
//! subscribed IPC clients.

use serde::{Deserialize, Serialize};

/// Events emitted while the daemon runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DaemonEvent {
    /// A key became focused; an empty key clears focus
    Focused { key: String },

    /// A key was selected by dwelling on it
    Committed { key: String },

    /// The board text changed
    TextChanged { text: String },
}

impl std::fmt::Display for DaemonEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DaemonEvent::Focused { key } if key.is_empty() => write!(f, "FOCUS_CLEARED"),
            DaemonEvent::Focused { key } => write!(f, "FOCUSED ({})", key),
            DaemonEvent::Committed { key } => write!(f, "COMMITTED ({})", key),
            DaemonEvent::TextChanged { text } => {
                write!(f, "TEXT_CHANGED ({} chars)", text.chars().count())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = DaemonEvent::Committed { key: "あ".into() };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("committed"));
        assert!(json.contains("あ"));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"focused","key":""}"#;
        let event: DaemonEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event, DaemonEvent::Focused { key: String::new() });
    }

    #[test]
    fn test_display() {
        assert_eq!(
            DaemonEvent::Focused { key: String::new() }.to_string(),
            "FOCUS_CLEARED"
        );
        assert_eq!(
            DaemonEvent::TextChanged { text: "あい".into() }.to_string(),
            "TEXT_CHANGED (2 chars)"
        );
    }
}
