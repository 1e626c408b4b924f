//! Single-flight speech dispatcher
//!
//! At most one request is live at a time. Each new request cancels the
//! previous request's token and stops the engine before speaking. Work
//! runs on tokio's blocking pool until that fails once; from then on
//! every speak and stop goes through the serialized lane.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::engine::{EngineError, EngineFactory, SpeechEngine};
use super::lane::{Completion, SerializedLane};
use super::SpeechError;

/// Lazily constructed engine shared by pool and lane work
struct Voice {
    factory: Box<dyn EngineFactory>,
    engine: Mutex<Option<Arc<dyn SpeechEngine>>>,
}

impl Voice {
    fn engine(&self) -> Result<Arc<dyn SpeechEngine>, SpeechError> {
        let mut slot = self.engine.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(engine) = slot.as_ref() {
            return Ok(Arc::clone(engine));
        }

        let engine = self
            .factory
            .create()
            .map_err(SpeechError::EngineUnavailable)?;
        info!("speech engine created");
        *slot = Some(Arc::clone(&engine));
        Ok(engine)
    }

    fn speak(&self, text: &str, cancel: &CancellationToken) -> Result<(), SpeechError> {
        if cancel.is_cancelled() {
            debug!("speech request superseded before start");
            return Ok(());
        }

        let engine = self.engine()?;
        if cancel.is_cancelled() {
            debug!("speech request superseded while acquiring engine");
            return Ok(());
        }

        match engine.speak(text) {
            Ok(()) => {
                debug!(chars = text.chars().count(), "speech started");
                Ok(())
            }
            Err(e @ EngineError::WrongThread { .. }) => Err(SpeechError::ThreadAffinity(e)),
            Err(e) => {
                warn!(error = %e, "speech engine failed to speak");
                Ok(())
            }
        }
    }

    fn stop(&self) -> Result<(), SpeechError> {
        let engine = self.engine()?;
        if let Err(e) = engine.stop_speaking() {
            warn!(error = %e, "speech engine failed to stop");
        }
        Ok(())
    }
}

/// Engine stop that was issued but may not have run yet
enum PendingStop {
    Pool(JoinHandle<()>),
    Lane(Completion),
    Skipped,
}

impl PendingStop {
    async fn settle(self) {
        match self {
            PendingStop::Pool(handle) => {
                if let Err(e) = handle.await {
                    warn!(error = %e, "engine stop task failed");
                }
            }
            PendingStop::Lane(completion) => {
                // Failures are already logged by the lane
                let _ = completion.wait().await;
            }
            PendingStop::Skipped => {}
        }
    }
}

/// Dispatcher guaranteeing that only the latest request is spoken
pub struct SpeechDispatcher {
    current: Mutex<Option<CancellationToken>>,
    use_lane: AtomicBool,
    lane: Mutex<Option<Arc<SerializedLane>>>,
    voice: Arc<Voice>,
}

impl SpeechDispatcher {
    /// Create a dispatcher; the engine is built on first use
    pub fn new<F>(factory: F) -> Self
    where
        F: EngineFactory + 'static,
    {
        Self {
            current: Mutex::new(None),
            use_lane: AtomicBool::new(false),
            lane: Mutex::new(None),
            voice: Arc::new(Voice {
                factory: Box::new(factory),
                engine: Mutex::new(None),
            }),
        }
    }

    /// Whether work has permanently moved to the serialized lane
    pub fn uses_serialized_lane(&self) -> bool {
        self.use_lane.load(Ordering::SeqCst)
    }

    /// Speak `text`, superseding any request still in flight.
    ///
    /// Blank text is ignored. The request is cancelled when `cancel` is, or
    /// as soon as a newer request or [`stop`](Self::stop) arrives. Engine
    /// call failures are logged; only a missing engine is returned as an
    /// error.
    pub async fn speak_latest(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<(), SpeechError> {
        if text.trim().is_empty() {
            return Ok(());
        }

        let token = self.supersede(cancel);
        self.issue_engine_stop().settle().await;

        let text = text.to_string();
        if self.uses_serialized_lane() {
            return self.speak_on_lane(text, token).await;
        }

        let voice = Arc::clone(&self.voice);
        let (pool_text, pool_token) = (text.clone(), token.clone());
        let pooled =
            tokio::task::spawn_blocking(move || voice.speak(&pool_text, &pool_token)).await;

        let failure = match pooled {
            Ok(Ok(())) => return Ok(()),
            // Not a pool problem; the lane would fail the same way
            Ok(Err(e @ SpeechError::EngineUnavailable(_))) => return Err(e),
            Ok(Err(e)) => e,
            Err(e) => SpeechError::Panicked(e.to_string()),
        };

        if !self.use_lane.swap(true, Ordering::SeqCst) {
            warn!(error = %failure, "speech failed on worker pool, moving to serialized lane");
        } else {
            debug!(error = %failure, "speech failed on worker pool during failover");
        }

        self.speak_on_lane(text, token).await
    }

    /// Cancel the current request and interrupt the engine.
    ///
    /// Returns immediately; failures are logged.
    pub fn stop(&self) {
        if let Some(token) = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            token.cancel();
        }

        // Not awaited: the stop runs in the background
        let _pending = self.issue_engine_stop();
    }

    /// Cancel the previous request and install a fresh token for a new one
    fn supersede(&self, cancel: &CancellationToken) -> CancellationToken {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = current.take() {
            previous.cancel();
        }

        let token = cancel.child_token();
        *current = Some(token.clone());
        token
    }

    fn issue_engine_stop(&self) -> PendingStop {
        let voice = Arc::clone(&self.voice);

        if self.uses_serialized_lane() {
            return match self.lane() {
                Ok(lane) => PendingStop::Lane(lane.enqueue(move || voice.stop())),
                Err(e) => {
                    warn!(error = %e, "engine stop skipped");
                    PendingStop::Skipped
                }
            };
        }

        match Handle::try_current() {
            Ok(handle) => PendingStop::Pool(handle.spawn_blocking(move || {
                if let Err(e) = voice.stop() {
                    warn!(error = %e, "engine stop failed");
                }
            })),
            Err(_) => {
                warn!("no async runtime available, engine stop skipped");
                PendingStop::Skipped
            }
        }
    }

    async fn speak_on_lane(
        &self,
        text: String,
        token: CancellationToken,
    ) -> Result<(), SpeechError> {
        let lane = self.lane()?;
        let voice = Arc::clone(&self.voice);
        lane.enqueue(move || voice.speak(&text, &token)).wait().await
    }

    /// The lane, spawned on first use and kept for the dispatcher's lifetime
    fn lane(&self) -> Result<Arc<SerializedLane>, SpeechError> {
        let mut slot = self.lane.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(lane) = slot.as_ref() {
            return Ok(Arc::clone(lane));
        }

        let lane = Arc::new(SerializedLane::start()?);
        info!("serialized speech lane started");
        *slot = Some(Arc::clone(&lane));
        Ok(lane)
    }
}
