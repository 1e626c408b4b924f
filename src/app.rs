//! Board controller
//!
//! Consumes dwell commits and UI commands, keeps the board text, and
//! hands text to the speech dispatcher.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::board::{CommitOutcome, Composer, InputGate, InputKey};
use crate::dwell::DwellRecognizer;
use crate::events::DaemonEvent;
use crate::speech::SpeechDispatcher;

/// Commands from the UI that are not pointer events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    /// Speak the given text, or the board text when `None`
    Speak { text: Option<String> },
    /// Stop speaking
    Stop,
    /// A Select/Back key press
    Key(InputKey),
    /// Undo the last board edit
    Undo,
}

/// Republish recognizer signals as daemon events
pub fn connect_recognizer(
    recognizer: &mut DwellRecognizer,
    event_tx: &broadcast::Sender<DaemonEvent>,
) {
    let tx = event_tx.clone();
    recognizer.on_focused(move |key| {
        let _ = tx.send(DaemonEvent::Focused {
            key: key.to_string(),
        });
    });

    let tx = event_tx.clone();
    recognizer.on_committed(move |key| {
        let _ = tx.send(DaemonEvent::Committed {
            key: key.to_string(),
        });
    });
}

/// Owns the board text and routes it to speech
pub struct Controller {
    composer: Composer,
    gate: InputGate,
    speech: Arc<SpeechDispatcher>,
    event_tx: broadcast::Sender<DaemonEvent>,
    cancel: CancellationToken,
}

impl Controller {
    pub fn new(
        speech: Arc<SpeechDispatcher>,
        event_tx: broadcast::Sender<DaemonEvent>,
        input_cooldown: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            composer: Composer::new(),
            gate: InputGate::new(input_cooldown),
            speech,
            event_tx,
            cancel,
        }
    }

    /// Run until the command channel closes or the token is cancelled
    pub async fn run(
        mut self,
        mut command_rx: mpsc::Receiver<AppCommand>,
        mut event_rx: broadcast::Receiver<DaemonEvent>,
    ) {
        info!("controller started");
        let cancel = self.cancel.clone();

        loop {
            tokio::select! {
                command = command_rx.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                event = event_rx.recv() => match event {
                    Ok(DaemonEvent::Committed { key }) => self.handle_commit(&key),
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "controller event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = cancel.cancelled() => break,
            }
        }

        self.speech.stop();
        info!("controller stopped");
    }

    fn handle_commit(&mut self, key: &str) {
        match self.composer.commit(key) {
            CommitOutcome::Edited => self.publish_text(),
            CommitOutcome::Speak => self.speak_board(),
            CommitOutcome::Unchanged => {}
        }
    }

    fn handle_command(&mut self, command: AppCommand) {
        debug!(?command, "controller command");

        match command {
            AppCommand::Speak { text: Some(text) } => self.speak(text),
            AppCommand::Speak { text: None } => self.speak_board(),
            AppCommand::Stop => self.speech.stop(),
            AppCommand::Key(key) => {
                if !self.gate.accept(Instant::now()) {
                    debug!(?key, "key press inside cooldown ignored");
                    return;
                }
                match key {
                    InputKey::Select => self.speak_board(),
                    InputKey::Back => self.speech.stop(),
                }
            }
            AppCommand::Undo => {
                if self.composer.undo() {
                    self.publish_text();
                }
            }
        }
    }

    fn publish_text(&self) {
        let _ = self.event_tx.send(DaemonEvent::TextChanged {
            text: self.composer.text().to_string(),
        });
    }

    fn speak_board(&self) {
        self.speak(self.composer.text().to_string());
    }

    fn speak(&self, text: String) {
        let speech = Arc::clone(&self.speech);
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            if let Err(e) = speech.speak_latest(&text, &cancel).await {
                error!(error = %e, "speech request failed");
            }
        });
    }
}
