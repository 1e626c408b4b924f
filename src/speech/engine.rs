//! Speech engine boundary
//!
//! The dispatcher only needs to start and interrupt an utterance. Concrete
//! engines plug in behind [`SpeechEngine`] and are built lazily through an
//! [`EngineFactory`], since construction can fail on hosts without a voice.

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

/// Errors reported by a speech engine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("speech engine is not available: {0}")]
    Unavailable(String),

    #[error("speech engine cannot be driven from thread {thread:?}")]
    WrongThread { thread: String },

    #[error("speech engine call failed: {0}")]
    Call(String),

    #[error("speech process error: {0}")]
    Io(#[from] std::io::Error),
}

/// A voice that can start and interrupt utterances
pub trait SpeechEngine: Send + Sync {
    /// Start speaking `text`. Engines may return before playback ends.
    fn speak(&self, text: &str) -> Result<(), EngineError>;

    /// Interrupt whatever is being spoken. Must be idempotent.
    fn stop_speaking(&self) -> Result<(), EngineError>;
}

/// Builds the engine on first use
pub trait EngineFactory: Send + Sync {
    fn create(&self) -> Result<Arc<dyn SpeechEngine>, EngineError>;
}

impl<F> EngineFactory for F
where
    F: Fn() -> Result<Arc<dyn SpeechEngine>, EngineError> + Send + Sync,
{
    fn create(&self) -> Result<Arc<dyn SpeechEngine>, EngineError> {
        self()
    }
}

/// Engine that speaks by running an external text-to-speech program
/// (`espeak-ng`, `say`, ...) with the text as its last argument
pub struct CommandEngine {
    program: PathBuf,
    args: Vec<String>,
    child: Mutex<Option<Child>>,
}

impl CommandEngine {
    pub fn new(program: PathBuf, args: Vec<String>) -> Self {
        Self {
            program,
            args,
            child: Mutex::new(None),
        }
    }

    fn current(&self) -> MutexGuard<'_, Option<Child>> {
        self.child.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Kill the running utterance, if any, and reap it
fn interrupt(slot: &mut Option<Child>) -> Result<(), EngineError> {
    let Some(mut child) = slot.take() else {
        return Ok(());
    };

    if child.try_wait()?.is_none() {
        debug!(pid = child.id(), "interrupting speech process");
        child.kill()?;
        child.wait()?;
    }

    Ok(())
}

impl SpeechEngine for CommandEngine {
    fn speak(&self, text: &str) -> Result<(), EngineError> {
        let mut slot = self.current();
        interrupt(&mut slot)?;

        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        debug!(pid = child.id(), program = ?self.program, "speech process started");
        *slot = Some(child);
        Ok(())
    }

    fn stop_speaking(&self) -> Result<(), EngineError> {
        interrupt(&mut self.current())
    }
}

impl Drop for CommandEngine {
    fn drop(&mut self) {
        if let Err(e) = interrupt(&mut self.current()) {
            warn!(error = %e, "failed to stop speech process on drop");
        }
    }
}

/// Factory for [`CommandEngine`]; fails when the program is not on `PATH`
#[derive(Debug, Clone)]
pub struct CommandEngineFactory {
    program: String,
    args: Vec<String>,
}

impl CommandEngineFactory {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl EngineFactory for CommandEngineFactory {
    fn create(&self) -> Result<Arc<dyn SpeechEngine>, EngineError> {
        let program = which::which(&self.program)
            .map_err(|e| EngineError::Unavailable(format!("{}: {e}", self.program)))?;
        debug!(?program, "resolved speech program");
        Ok(Arc::new(CommandEngine::new(program, self.args.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_program_is_unavailable() {
        let factory = CommandEngineFactory::new("definitely-not-a-speech-program-1b7e", vec![]);
        let err = factory.create().err().unwrap();
        assert!(matches!(err, EngineError::Unavailable(_)));
    }

    #[test]
    fn test_closure_factory() {
        let factory = || -> Result<Arc<dyn SpeechEngine>, EngineError> {
            Err(EngineError::Unavailable("no voice".into()))
        };
        assert!(factory.create().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_command_engine_speak_and_stop() {
        let engine = CommandEngine::new(PathBuf::from("sleep"), vec![]);
        engine.speak("5").unwrap();
        assert!(engine.current().is_some());

        engine.stop_speaking().unwrap();
        assert!(engine.current().is_none());

        // Stopping twice is harmless
        engine.stop_speaking().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_command_engine_speak_replaces_previous() {
        let engine = CommandEngine::new(PathBuf::from("sleep"), vec![]);
        engine.speak("5").unwrap();
        let first = engine.current().as_ref().map(Child::id);

        engine.speak("5").unwrap();
        let second = engine.current().as_ref().map(Child::id);
        assert_ne!(first, second);

        engine.stop_speaking().unwrap();
    }
}
