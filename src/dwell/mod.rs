//! Dwell module for hover-to-select input
//!
//! A pointer resting on a target first focuses it, then commits it:
//! - Idle: no key focused, focus countdown may be running
//! - Focused: key highlighted, commit countdown running

mod recognizer;
mod signal;
mod timer;

use std::time::Duration;

pub use recognizer::{DwellRecognizer, PointerEvent};

/// Default delay for both dwell thresholds
pub const DEFAULT_DWELL_MS: u64 = 600;

/// The two dwell thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DwellTiming {
    /// Hover time before a key is focused
    pub focus: Duration,
    /// Further hover time before a focused key is committed
    pub commit: Duration,
}

impl Default for DwellTiming {
    fn default() -> Self {
        Self {
            focus: Duration::from_millis(DEFAULT_DWELL_MS),
            commit: Duration::from_millis(DEFAULT_DWELL_MS),
        }
    }
}

/// Errors raised while delivering dwell signals
#[derive(Debug, thiserror::Error)]
pub enum DwellError {
    #[error("{signal} subscriber panicked while handling key {key:?}")]
    HandlerPanicked { signal: &'static str, key: String },
}
