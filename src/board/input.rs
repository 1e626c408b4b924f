//! Debounced Select/Back keys
//!
//! Switch-access hardware tends to bounce, so presses that land inside
//! the cooldown window after an accepted press are dropped.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Default cooldown between accepted key presses
pub const DEFAULT_COOLDOWN_MS: u64 = 150;

/// Discrete keys besides dwell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKey {
    /// Speak the board text
    Select,
    /// Stop speaking
    Back,
}

/// Cooldown filter shared by all keys
#[derive(Debug, Clone)]
pub struct InputGate {
    cooldown: Duration,
    last_accepted: Option<Instant>,
}

impl InputGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_accepted: None,
        }
    }

    /// Returns true if a press at `now` should be handled
    pub fn accept(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_accepted {
            if now.saturating_duration_since(last) < self.cooldown {
                return false;
            }
        }

        self.last_accepted = Some(now);
        true
    }
}

impl Default for InputGate {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_COOLDOWN_MS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presses_inside_cooldown_dropped() {
        let mut gate = InputGate::default();
        let start = Instant::now();

        assert!(gate.accept(start));
        assert!(!gate.accept(start + Duration::from_millis(100)));
        assert!(gate.accept(start + Duration::from_millis(150)));
        assert!(!gate.accept(start + Duration::from_millis(200)));
        assert!(gate.accept(start + Duration::from_millis(400)));
    }

    #[test]
    fn test_key_serialization() {
        let json = serde_json::to_string(&InputKey::Select).unwrap();
        assert_eq!(json, "\"select\"");
        let key: InputKey = serde_json::from_str("\"back\"").unwrap();
        assert_eq!(key, InputKey::Back);
    }
}
