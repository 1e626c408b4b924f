//! Serialized worker lane
//!
//! One dedicated thread that runs queued actions strictly in enqueue
//! order. Used for engines that must always be driven from the same
//! thread. The thread is detached and lives until the lane is dropped.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread;

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::SpeechError;

/// Name of the lane thread
pub const LANE_THREAD_NAME: &str = "speech-lane";

type Action = Box<dyn FnOnce() -> Result<(), SpeechError> + Send + 'static>;

/// Queued action paired with its completion handle
struct WorkItem {
    action: Action,
    done: oneshot::Sender<Result<(), SpeechError>>,
}

/// Handle to the lane thread
pub struct SerializedLane {
    queue: mpsc::Sender<WorkItem>,
}

impl SerializedLane {
    /// Spawn the lane thread
    pub fn start() -> Result<Self, SpeechError> {
        let (queue, items) = mpsc::channel::<WorkItem>();

        thread::Builder::new()
            .name(LANE_THREAD_NAME.to_string())
            .spawn(move || {
                info!("speech lane thread started");

                // recv blocks until an item arrives; items drain in FIFO order
                for item in items {
                    run_item(item);
                }

                info!("speech lane thread stopped");
            })
            .map_err(|e| SpeechError::LaneSpawn(e.to_string()))?;

        Ok(Self { queue })
    }

    /// Append an action to the queue
    pub fn enqueue<F>(&self, action: F) -> Completion
    where
        F: FnOnce() -> Result<(), SpeechError> + Send + 'static,
    {
        let (done, rx) = oneshot::channel();
        let item = WorkItem {
            action: Box::new(action),
            done,
        };

        if let Err(mpsc::SendError(item)) = self.queue.send(item) {
            let _ = item.done.send(Err(SpeechError::LaneClosed));
        }

        Completion { rx }
    }
}

/// Resolves once the lane has run the corresponding action
#[must_use = "dropping a completion does not cancel the queued action"]
pub struct Completion {
    rx: oneshot::Receiver<Result<(), SpeechError>>,
}

impl Completion {
    /// Wait for the action's result
    pub async fn wait(self) -> Result<(), SpeechError> {
        self.rx.await.unwrap_or(Err(SpeechError::LaneClosed))
    }
}

fn run_item(item: WorkItem) {
    let WorkItem { action, done } = item;

    let result = match panic::catch_unwind(AssertUnwindSafe(action)) {
        Ok(result) => result,
        Err(payload) => Err(SpeechError::Panicked(panic_message(payload.as_ref()))),
    };

    if let Err(e) = &result {
        warn!(error = %e, "speech lane action failed");
    }

    if done.send(result).is_err() {
        debug!("speech lane completion dropped by caller");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[tokio::test]
    async fn test_runs_in_fifo_order() {
        let lane = SerializedLane::start().unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));

        let completions: Vec<_> = (0..3)
            .map(|i| {
                let order = Arc::clone(&order);
                lane.enqueue(move || {
                    order.lock().unwrap().push(i);
                    Ok(())
                })
            })
            .collect();

        for completion in completions.into_iter().rev() {
            completion.wait().await.unwrap();
        }

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_completion_pending_until_action_runs() {
        let lane = SerializedLane::start().unwrap();
        let (release, gate) = mpsc::channel::<()>();

        let mut blocked = tokio_test::task::spawn(
            lane.enqueue(move || {
                let _ = gate.recv();
                Ok(())
            })
            .wait(),
        );
        tokio_test::assert_pending!(blocked.poll());

        release.send(()).unwrap();
        // Anything queued behind it finishes strictly afterwards
        lane.enqueue(|| Ok(())).wait().await.unwrap();

        assert!(blocked.is_woken());
        tokio_test::assert_ready!(blocked.poll()).unwrap();
    }

    #[tokio::test]
    async fn test_runs_on_named_thread() {
        let lane = SerializedLane::start().unwrap();
        let name = Arc::new(Mutex::new(None));

        let sink = Arc::clone(&name);
        lane.enqueue(move || {
            *sink.lock().unwrap() = thread::current().name().map(str::to_string);
            Ok(())
        })
        .wait()
        .await
        .unwrap();

        assert_eq!(name.lock().unwrap().as_deref(), Some(LANE_THREAD_NAME));
    }

    #[tokio::test]
    async fn test_error_is_reported_to_caller() {
        let lane = SerializedLane::start().unwrap();
        let result = lane.enqueue(|| Err(SpeechError::LaneClosed)).wait().await;
        assert!(matches!(result, Err(SpeechError::LaneClosed)));
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let lane = SerializedLane::start().unwrap();

        let result = lane
            .enqueue(|| panic!("engine exploded"))
            .wait()
            .await;
        match result {
            Err(SpeechError::Panicked(message)) => assert_eq!(message, "engine exploded"),
            other => panic!("unexpected result: {other:?}"),
        }

        // Lane keeps serving work afterwards
        lane.enqueue(|| Ok(())).wait().await.unwrap();
    }
}
