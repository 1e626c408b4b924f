//! Unix domain socket server for IPC
//!
//! Provides request-response communication and push notifications of
//! dwell and board events to subscribed clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::app::AppCommand;
use crate::dwell::PointerEvent;
use crate::events::DaemonEvent;
use crate::speech::SpeechDispatcher;

use super::protocol::{DaemonStatus, Notification, Request, Response, MAX_FRAME_LEN};

/// Where requests are forwarded
#[derive(Clone)]
pub struct Routes {
    /// Pointer events for the dwell recognizer
    pub pointer_tx: mpsc::Sender<PointerEvent>,
    /// Commands for the board controller
    pub command_tx: mpsc::Sender<AppCommand>,
    /// Source of notifications for subscribed clients
    pub event_tx: broadcast::Sender<DaemonEvent>,
    /// Queried for status
    pub speech: Arc<SpeechDispatcher>,
}

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    state: Arc<RwLock<ServerState>>,
    shutdown_tx: broadcast::Sender<()>,
    routes: Routes,
}

/// Shared server state
struct ServerState {
    start_time: std::time::Instant,
    focused_key: Option<String>,
    text: String,
}

impl Server {
    /// Create a new IPC server
    pub fn new(socket_path: &Path, routes: Routes) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path)
                .context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path)
            .context("failed to bind Unix socket")?;

        // Set socket permissions to owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        let state = Arc::new(RwLock::new(ServerState {
            start_time: std::time::Instant::now(),
            focused_key: None,
            text: String::new(),
        }));

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener: Some(listener),
            state,
            shutdown_tx,
            routes,
        })
    }

    /// Fold an event into the status snapshot
    pub async fn record(&self, event: &DaemonEvent) {
        let mut state = self.state.write().await;
        match event {
            DaemonEvent::Focused { key } => {
                state.focused_key = (!key.is_empty()).then(|| key.clone());
            }
            DaemonEvent::Committed { .. } => {
                state.focused_key = None;
            }
            DaemonEvent::TextChanged { text } => {
                state.text = text.clone();
            }
        }
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref()
            .context("server not initialized")?;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let state = Arc::clone(&self.state);
                    let routes = self.routes.clone();
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, state, routes) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection
    async fn handle_client(
        stream: UnixStream,
        state: Arc<RwLock<ServerState>>,
        routes: Routes,
    ) -> Result<()> {
        let (mut reader, writer) = stream.into_split();
        let (out_tx, out_rx) = mpsc::channel::<Vec<u8>>(64);
        let writer_task = tokio::spawn(write_frames(writer, out_rx));
        let mut forwarder: Option<JoinHandle<()>> = None;

        let result: Result<()> = async {
            loop {
                let Some(body) = read_frame(&mut reader).await? else {
                    debug!("client disconnected");
                    return Ok(());
                };

                let response = match serde_json::from_slice::<Request>(&body) {
                    Ok(request) => {
                        debug!(?request, "received request");
                        let subscribe = request == Request::Subscribe;
                        let response = Self::process_request(request, &state, &routes).await;

                        if subscribe && forwarder.is_none() {
                            debug!("client subscribed to notifications");
                            let event_rx = routes.event_tx.subscribe();
                            // Queue the confirmation ahead of any notification
                            out_tx.send(serde_json::to_vec(&response)?).await
                                .context("client writer closed")?;
                            forwarder = Some(tokio::spawn(forward_events(event_rx, out_tx.clone())));
                            continue;
                        }
                        response
                    }
                    Err(e) => {
                        warn!(error = %e, "malformed request");
                        Response::error("invalid_request", e.to_string())
                    }
                };

                out_tx.send(serde_json::to_vec(&response)?).await
                    .context("client writer closed")?;
            }
        }
        .await;

        if let Some(forwarder) = forwarder {
            forwarder.abort();
        }
        drop(out_tx);
        if let Ok(Err(e)) = writer_task.await {
            debug!(?e, "client writer error");
        }

        result
    }

    /// Process a request and return a response
    async fn process_request(
        request: Request,
        state: &Arc<RwLock<ServerState>>,
        routes: &Routes,
    ) -> Response {
        match request {
            Request::Ping => Response::Pong,

            Request::GetStatus => {
                let state = state.read().await;
                Response::Status(DaemonStatus {
                    uptime_secs: state.start_time.elapsed().as_secs(),
                    focused_key: state.focused_key.clone(),
                    text: state.text.clone(),
                    serialized_lane: routes.speech.uses_serialized_lane(),
                    ..DaemonStatus::default()
                })
            }

            Request::Subscribe => Response::Subscribed,

            Request::PointerEnter { key } => {
                forward(&routes.pointer_tx, PointerEvent::Enter(key)).await
            }
            Request::PointerLeave { key } => {
                forward(&routes.pointer_tx, PointerEvent::Leave(key)).await
            }
            Request::ResetDwell => forward(&routes.pointer_tx, PointerEvent::Reset).await,

            Request::Speak { text } => {
                forward(&routes.command_tx, AppCommand::Speak { text }).await
            }
            Request::Stop => forward(&routes.command_tx, AppCommand::Stop).await,
            Request::Key { key } => forward(&routes.command_tx, AppCommand::Key(key)).await,
            Request::Undo => forward(&routes.command_tx, AppCommand::Undo).await,
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

async fn forward<T>(tx: &mpsc::Sender<T>, message: T) -> Response {
    match tx.send(message).await {
        Ok(()) => Response::Ack,
        Err(_) => Response::error("unavailable", "daemon component is not running"),
    }
}

/// Read one length-prefixed message; `None` on clean disconnect
async fn read_frame(reader: &mut OwnedReadHalf) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        anyhow::bail!("message too large ({len} bytes)");
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}

/// Write queued messages with their length prefix
async fn write_frames(mut writer: OwnedWriteHalf, mut out_rx: mpsc::Receiver<Vec<u8>>) -> Result<()> {
    while let Some(body) = out_rx.recv().await {
        let len = (body.len() as u32).to_le_bytes();
        writer.write_all(&len).await?;
        writer.write_all(&body).await?;
    }
    Ok(())
}

/// Push broadcast events to one subscribed client
async fn forward_events(mut event_rx: broadcast::Receiver<DaemonEvent>, out_tx: mpsc::Sender<Vec<u8>>) {
    loop {
        match event_rx.recv().await {
            Ok(event) => {
                let body = match serde_json::to_vec(&Notification::Event { event }) {
                    Ok(body) => body,
                    Err(e) => {
                        warn!(?e, "failed to encode notification");
                        continue;
                    }
                };
                if out_tx.send(body).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "client notification receiver lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
