//! aac-daemon: Background daemon for dwell-driven communication boards
//!
//! This daemon runs behind a board UI and provides:
//! - Dwell recognition: hover turns into focus, then selection
//! - Single-flight speech output that never overlaps
//! - IPC server for the UI to forward pointer events and subscribe
//!
//! Scope:
//! - Pointer enter/leave on named targets, Select/Back keys
//! - Text board with undo, spoken through an external TTS program
//! - NO rendering, voice selection, or accessibility-tree integration

mod app;
mod board;
mod config;
mod dwell;
mod events;
mod ipc;
mod lifecycle;
mod speech;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app::Controller;
use crate::config::Config;
use crate::dwell::DwellRecognizer;
use crate::events::DaemonEvent;
use crate::ipc::{Routes, Server};
use crate::lifecycle::ShutdownSignal;
use crate::speech::{CommandEngineFactory, SpeechDispatcher};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "aac-daemon starting"
    );

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(
        ?config.socket_path,
        focus_ms = config.dwell.focus.as_millis() as u64,
        commit_ms = config.dwell.commit.as_millis() as u64,
        speech_program = %config.speech_program,
        "configuration loaded"
    );

    // Create shutdown signal handler
    let shutdown = ShutdownSignal::new();
    let cancel = CancellationToken::new();

    // Create channels for inter-component communication
    // IPC server -> dwell recognizer
    let (pointer_tx, pointer_rx) = mpsc::channel(64);
    // IPC server -> controller
    let (command_tx, command_rx) = mpsc::channel(32);
    // Recognizer/controller -> controller, IPC server and subscribed clients
    let (event_tx, _event_rx) = broadcast::channel::<DaemonEvent>(64);

    // Speech engine is only built when first needed
    let speech = Arc::new(SpeechDispatcher::new(CommandEngineFactory::new(
        config.speech_program.clone(),
        config.speech_args.clone(),
    )));

    let mut recognizer = DwellRecognizer::new(config.dwell);
    app::connect_recognizer(&mut recognizer, &event_tx);

    let controller = Controller::new(
        Arc::clone(&speech),
        event_tx.clone(),
        config.input_cooldown,
        cancel.clone(),
    );

    // Create IPC server
    let server = Server::new(
        &config.socket_path,
        Routes {
            pointer_tx,
            command_tx,
            event_tx: event_tx.clone(),
            speech: Arc::clone(&speech),
        },
    )?;

    // Subscribe to events for the status snapshot
    let mut ipc_event_rx = event_tx.subscribe();
    let server_for_events = &server;

    let dwell_task = tokio::spawn(recognizer.run(pointer_rx));
    let controller_task = tokio::spawn(controller.run(command_rx, event_tx.subscribe()));

    info!("daemon initialized, entering main loop");

    // Main event loop
    tokio::select! {
        // Run the IPC server (accepts client connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        // Keep the status snapshot current
        _ = async {
            loop {
                match ipc_event_rx.recv().await {
                    Ok(event) => {
                        debug!(%event, "daemon event");
                        server_for_events.record(&event).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "daemon event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        } => {
            info!("event handler exited");
        }

        // Wait for shutdown signal
        reason = shutdown.wait() => {
            info!(?reason, "shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    cancel.cancel();
    server.shutdown().await;
    // Closing the pointer channel ends the recognizer
    drop(server);

    if let Err(e) = controller_task.await {
        warn!(?e, "controller task failed");
    }
    match tokio::time::timeout(Duration::from_secs(1), dwell_task).await {
        Ok(Err(e)) => warn!(?e, "dwell task failed"),
        Err(_) => warn!("dwell recognizer still has open pointer senders"),
        Ok(Ok(())) => {}
    }

    info!("aac-daemon stopped");

    Ok(())
}
