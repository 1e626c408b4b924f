//! Dwell gesture recognizer
//!
//! Converts pointer enter/leave on named targets into `Focused` and
//! `Committed` signals. One timer drives both thresholds: the first fire
//! after entering a key focuses it, the second commits it.

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::signal::{Signal, SubscriptionId};
use super::timer::DwellTimer;
use super::{DwellError, DwellTiming};

/// Session state of the recognizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DwellState {
    /// No key focused yet; the focus countdown may be running
    #[default]
    Idle,
    /// The current key is focused; the commit countdown is running
    Focused,
}

impl std::fmt::Display for DwellState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DwellState::Idle => write!(f, "Idle"),
            DwellState::Focused => write!(f, "Focused"),
        }
    }
}

/// Pointer input forwarded from the UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointerEvent {
    /// Pointer entered the target with this key
    Enter(String),
    /// Pointer left the target with this key
    Leave(String),
    /// Drop whatever is being tracked
    Reset,
}

/// Dwell state machine for one host surface
pub struct DwellRecognizer {
    timing: DwellTiming,
    state: DwellState,
    current_key: Option<String>,
    timer: DwellTimer,
    focused: Signal,
    committed: Signal,
}

impl DwellRecognizer {
    pub fn new(timing: DwellTiming) -> Self {
        Self {
            timing,
            state: DwellState::Idle,
            current_key: None,
            timer: DwellTimer::new(timing.focus),
            focused: Signal::new("focused"),
            committed: Signal::new("committed"),
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> DwellState {
        self.state
    }

    #[cfg(test)]
    pub fn current_key(&self) -> Option<&str> {
        self.current_key.as_deref()
    }

    #[cfg(test)]
    pub fn is_timer_running(&self) -> bool {
        self.timer.is_running()
    }

    /// Subscribe to `Focused(key)`; an empty key means nothing is focused
    pub fn on_focused<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.focused.subscribe(handler)
    }

    /// Subscribe to `Committed(key)`
    pub fn on_committed<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.committed.subscribe(handler)
    }

    #[allow(dead_code)]
    pub fn unsubscribe_focused(&mut self, id: SubscriptionId) -> bool {
        self.focused.unsubscribe(id)
    }

    #[allow(dead_code)]
    pub fn unsubscribe_committed(&mut self, id: SubscriptionId) -> bool {
        self.committed.unsubscribe(id)
    }

    /// Pointer entered a target
    pub fn pointer_enter(&mut self, key: &str) {
        if key.trim().is_empty() {
            return;
        }

        if self.current_key.as_deref() != Some(key) {
            self.reset_internal();
            self.emit_focus_cleared();
            self.current_key = Some(key.to_string());
            self.timer.set_interval(self.timing.focus);
            self.timer.start();
            debug!(key, "dwell started");
            return;
        }

        // Same key: only revive a session left idle with no countdown
        if self.state == DwellState::Idle && !self.timer.is_running() {
            self.timer.set_interval(self.timing.focus);
            self.timer.start();
            debug!(key, "dwell restarted");
        }
    }

    /// Pointer left a target
    pub fn pointer_leave(&mut self, key: &str) {
        match self.current_key.as_deref() {
            Some(current) if current == key => self.reset(),
            _ => {}
        }
    }

    /// Drop the current key and clear focus
    pub fn reset(&mut self) {
        self.reset_internal();
        self.emit_focus_cleared();
    }

    /// Apply a pointer event
    pub fn handle_pointer(&mut self, event: PointerEvent) {
        match event {
            PointerEvent::Enter(key) => self.pointer_enter(&key),
            PointerEvent::Leave(key) => self.pointer_leave(&key),
            PointerEvent::Reset => self.reset(),
        }
    }

    /// Timer deadline passed
    pub fn handle_tick(&mut self) {
        self.timer.fired();

        if let Err(e) = self.advance() {
            warn!(error = %e, "dwell tick failed, resetting session");
            self.reset_internal();
        }
    }

    /// Drive the recognizer from a pointer event channel until it closes
    pub async fn run(mut self, mut pointer_rx: mpsc::Receiver<PointerEvent>) {
        info!(
            focus_ms = self.timing.focus.as_millis() as u64,
            commit_ms = self.timing.commit.as_millis() as u64,
            "dwell recognizer started"
        );

        loop {
            let deadline = self.timer.deadline();
            tokio::select! {
                event = pointer_rx.recv() => match event {
                    Some(event) => self.handle_pointer(event),
                    None => break,
                },
                _ = sleep_until_deadline(deadline) => self.handle_tick(),
            }
        }

        self.reset();
        info!("dwell recognizer stopped");
    }

    fn advance(&mut self) -> Result<(), DwellError> {
        let Some(key) = self.current_key.clone() else {
            self.reset_internal();
            return Ok(());
        };

        match self.state {
            DwellState::Idle => {
                self.state = DwellState::Focused;
                debug!(key = %key, "dwell focused");
                self.focused.emit(&key)?;
                self.timer.set_interval(self.timing.commit);
            }
            DwellState::Focused => {
                self.reset_internal();
                info!(key = %key, "dwell committed");
                self.committed.emit(&key)?;
            }
        }

        Ok(())
    }

    fn reset_internal(&mut self) {
        self.timer.stop();
        self.state = DwellState::Idle;
        self.current_key = None;
    }

    fn emit_focus_cleared(&mut self) {
        if let Err(e) = self.focused.emit("") {
            warn!(error = %e, "focus-cleared subscriber failed");
        }
    }
}

impl std::fmt::Debug for DwellRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DwellRecognizer")
            .field("state", &self.state)
            .field("current_key", &self.current_key)
            .field("timer", &self.timer)
            .finish()
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
