//! Speech output module
//!
//! Single-flight text-to-speech: every new request interrupts the
//! previous one, and work moves to a dedicated lane thread for good once
//! the engine refuses to run on the shared worker pool.

mod dispatcher;
mod engine;
mod lane;

pub use dispatcher::SpeechDispatcher;
pub use engine::CommandEngineFactory;
#[cfg(test)]
pub use engine::{EngineError, SpeechEngine};
#[cfg(not(test))]
use engine::EngineError;

/// Errors surfaced by the speech dispatcher and its lane
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("speech engine unavailable: {0}")]
    EngineUnavailable(#[source] EngineError),

    #[error("speech engine rejected the calling thread: {0}")]
    ThreadAffinity(#[source] EngineError),

    #[error("speech worker panicked: {0}")]
    Panicked(String),

    #[error("failed to start speech lane: {0}")]
    LaneSpawn(String),

    #[error("speech lane is no longer running")]
    LaneClosed,
}
